//! Constant folding pass.
//!
//! Evaluates instructions whose operands are all constants at compile time
//! and turns them into constants in place, keeping their id and shape.

use irprobe_ir::{Computation, HloModule, InstrId, Instruction, Literal, Opcode};

use crate::Pass;

/// Folds instructions with constant operands.
#[derive(Debug)]
pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &str {
        "const-fold"
    }

    fn run(&self, module: &mut HloModule) -> bool {
        let mut changed = false;
        for comp in &mut module.computations {
            changed |= run_on_computation(comp);
        }
        changed
    }
}

fn run_on_computation(comp: &mut Computation) -> bool {
    let mut changed = false;

    // Insertion order is def-before-use, so folded results feed later folds
    // within the same sweep.
    let ids: Vec<InstrId> = comp.instructions.iter().map(|i| i.id).collect();
    for id in ids {
        let Some(instr) = comp.get(id) else { continue };
        let Some(folded) = fold(comp, instr) else {
            continue;
        };
        if let Some(instr) = comp.get_mut(id) {
            instr.opcode = Opcode::Constant;
            instr.operands.clear();
            instr.dimensions.clear();
            instr.dot_dimensions = None;
            instr.literal = Some(folded);
            changed = true;
        }
    }

    changed
}

fn fold(comp: &Computation, instr: &Instruction) -> Option<Literal> {
    if matches!(instr.opcode, Opcode::Constant | Opcode::Parameter) || instr.operands.is_empty() {
        return None;
    }
    let operands: Vec<&Literal> = instr
        .operands
        .iter()
        .map(|&op| comp.get(op).filter(|i| i.opcode == Opcode::Constant)?.literal.as_ref())
        .collect::<Option<_>>()?;
    let out = instr.shape.as_array()?;

    let values = match instr.opcode {
        op if op.is_elementwise_binary() => {
            let (l, r) = (operands[0], operands[1]);
            if l.dims != r.dims {
                return None;
            }
            l.values
                .iter()
                .zip(&r.values)
                .map(|(&a, &b)| fold_binary(op, a, b, out.element_type.is_floating()))
                .collect::<Option<Vec<_>>>()?
        }
        op if op.is_elementwise_unary() => operands[0]
            .values
            .iter()
            .map(|&v| fold_unary(op, v))
            .collect(),
        Opcode::Convert => operands[0].values.clone(),
        Opcode::Reshape => operands[0].reshape(&out.dims)?.values,
        Opcode::Broadcast => broadcast(operands[0], &out.dims, &instr.dimensions)?,
        Opcode::Transpose => transpose(operands[0], &instr.dimensions)?,
        _ => return None,
    };

    Literal::new(out.element_type, out.dims.clone(), values).ok()
}

fn fold_binary(op: Opcode, a: f64, b: f64, floating: bool) -> Option<f64> {
    Some(match op {
        Opcode::Add => a + b,
        Opcode::Subtract => a - b,
        Opcode::Multiply => a * b,
        Opcode::Divide => {
            // Integer division by zero is left for the device to report.
            if !floating && b == 0.0 {
                return None;
            }
            a / b
        }
        Opcode::Maximum => a.max(b),
        Opcode::Minimum => a.min(b),
        _ => return None,
    })
}

fn fold_unary(op: Opcode, v: f64) -> f64 {
    match op {
        Opcode::Negate => -v,
        Opcode::Exponential => v.exp(),
        Opcode::Log => v.ln(),
        Opcode::Tanh => v.tanh(),
        _ => v,
    }
}

/// Row-major multi-index of a linear offset.
fn unravel(mut linear: i64, dims: &[i64]) -> Vec<i64> {
    let mut idx = vec![0; dims.len()];
    for (slot, &d) in idx.iter_mut().zip(dims).rev() {
        if d > 0 {
            *slot = linear % d;
            linear /= d;
        }
    }
    idx
}

fn linear_index(idx: &[i64], dims: &[i64]) -> i64 {
    idx.iter().zip(dims).fold(0, |acc, (&i, &d)| acc * d + i)
}

/// Operand dimension `i` maps to output dimension `mapping[i]`.
fn broadcast(operand: &Literal, out_dims: &[i64], mapping: &[i64]) -> Option<Vec<f64>> {
    if mapping.len() != operand.dims.len() {
        return None;
    }
    let count: i64 = out_dims.iter().product();
    (0..count)
        .map(|linear| {
            let out_idx = unravel(linear, out_dims);
            let src: Vec<i64> = mapping
                .iter()
                .map(|&m| out_idx.get(usize::try_from(m).ok()?).copied())
                .collect::<Option<_>>()?;
            operand.values.get(linear_index(&src, &operand.dims) as usize).copied()
        })
        .collect()
}

/// Output dimension `i` is operand dimension `perm[i]`.
fn transpose(operand: &Literal, perm: &[i64]) -> Option<Vec<f64>> {
    if perm.len() != operand.dims.len() {
        return None;
    }
    let out_dims: Vec<i64> = perm
        .iter()
        .map(|&p| operand.dims.get(usize::try_from(p).ok()?).copied())
        .collect::<Option<_>>()?;
    let count: i64 = out_dims.iter().product();
    (0..count)
        .map(|linear| {
            let out_idx = unravel(linear, &out_dims);
            let mut src = vec![0; perm.len()];
            for (i, &p) in perm.iter().enumerate() {
                src[p as usize] = out_idx[i];
            }
            operand.values.get(linear_index(&src, &operand.dims) as usize).copied()
        })
        .collect()
}
