//! Algebraic simplification pass.
//!
//! Forwards uses of instructions that compute their operand unchanged:
//! no-op reshapes, converts and transposes, `x + 0`, `x * 1`, `-(-x)`,
//! and `get-tuple-element` of a `tuple`.

use irprobe_ir::{Computation, HloModule, InstrId, Instruction, Opcode};

use crate::Pass;

#[derive(Debug)]
pub struct AlgebraicSimplifier;

impl Pass for AlgebraicSimplifier {
    fn name(&self) -> &str {
        "algsimp"
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
    let ids: Vec<InstrId> = comp.instructions.iter().map(|i| i.id).collect();
    for id in ids {
        let Some(instr) = comp.get(id) else { continue };
        if let Some(replacement) = simplify(comp, instr) {
            changed |= comp.replace_all_uses(id, replacement);
        }
    }
    changed
}

/// Returns the instruction whose value `instr` always equals, if any.
fn simplify(comp: &Computation, instr: &Instruction) -> Option<InstrId> {
    let operand = |i: usize| comp.get(*instr.operands.get(i)?);
    let same_shape = |id: InstrId| {
        comp.get(id)
            .is_some_and(|o| o.shape.compatible(&instr.shape))
    };

    let candidate = match instr.opcode {
        Opcode::Reshape | Opcode::Convert | Opcode::Copy => instr.operands.first().copied(),
        Opcode::Transpose => {
            let identity = instr
                .dimensions
                .iter()
                .enumerate()
                .all(|(i, &d)| d == i as i64);
            identity.then(|| instr.operands.first().copied()).flatten()
        }
        Opcode::Add => {
            if is_constant_splat(operand(1)?, 0.0) {
                Some(instr.operands[0])
            } else if is_constant_splat(operand(0)?, 0.0) {
                Some(instr.operands[1])
            } else {
                None
            }
        }
        Opcode::Multiply => {
            if is_constant_splat(operand(1)?, 1.0) {
                Some(instr.operands[0])
            } else if is_constant_splat(operand(0)?, 1.0) {
                Some(instr.operands[1])
            } else {
                None
            }
        }
        Opcode::Negate => {
            let inner = operand(0)?;
            (inner.opcode == Opcode::Negate)
                .then(|| inner.operands.first().copied())
                .flatten()
        }
        Opcode::GetTupleElement => {
            let tuple = operand(0)?;
            let index = instr.tuple_index? as usize;
            (tuple.opcode == Opcode::Tuple)
                .then(|| tuple.operands.get(index).copied())
                .flatten()
        }
        _ => None,
    }?;

    same_shape(candidate).then_some(candidate)
}

fn is_constant_splat(instr: &Instruction, value: f64) -> bool {
    instr.opcode == Opcode::Constant && instr.literal.as_ref().is_some_and(|l| l.is_all(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use irprobe_ir::{ElementType, Literal, Shape};

    fn f32x2() -> Shape {
        Shape::array(ElementType::F32, [2])
    }

    #[test]
    fn add_zero_forwards_operand() {
        let mut comp = Computation::new("main");
        let p = comp.add(Instruction::parameter(0, "p", f32x2()));
        let zero = comp.add(Instruction::constant(
            "zero",
            Literal::splat(ElementType::F32, [2], 0.0),
        ));
        let add = comp.add(Instruction::new(Opcode::Add, "add", f32x2(), vec![zero, p]));
        comp.set_root(add);
        let mut module = HloModule::new("m", comp);

        assert!(AlgebraicSimplifier.run(&mut module));
        assert_eq!(module.entry_computation().unwrap().root, Some(p));
    }

    #[test]
    fn double_negation() {
        let mut comp = Computation::new("main");
        let p = comp.add(Instruction::parameter(0, "p", f32x2()));
        let n1 = comp.add(Instruction::new(Opcode::Negate, "n", f32x2(), vec![p]));
        let n2 = comp.add(Instruction::new(Opcode::Negate, "n", f32x2(), vec![n1]));
        let exp = comp.add(Instruction::new(Opcode::Exponential, "e", f32x2(), vec![n2]));
        comp.set_root(exp);
        let mut module = HloModule::new("m", comp);

        AlgebraicSimplifier.run(&mut module);
        let entry = module.entry_computation().unwrap();
        assert_eq!(entry.get(exp).unwrap().operands, vec![p]);
    }

    #[test]
    fn reshape_changing_dims_is_kept() {
        let mut comp = Computation::new("main");
        let p = comp.add(Instruction::parameter(0, "p", Shape::array(ElementType::F32, [2, 2])));
        let r = comp.add(Instruction::new(
            Opcode::Reshape,
            "r",
            Shape::array(ElementType::F32, [4]),
            vec![p],
        ));
        comp.set_root(r);
        let mut module = HloModule::new("m", comp);
        assert!(!AlgebraicSimplifier.run(&mut module));
    }

    #[test]
    fn tuple_element_forwarding() {
        let mut comp = Computation::new("main");
        let a = comp.add(Instruction::parameter(0, "a", f32x2()));
        let b = comp.add(Instruction::parameter(1, "b", f32x2()));
        let t = comp.add(Instruction::tuple("t", vec![(a, f32x2()), (b, f32x2())]));
        let gte = comp.add(Instruction {
            tuple_index: Some(1),
            ..Instruction::new(Opcode::GetTupleElement, "gte", f32x2(), vec![t])
        });
        comp.set_root(gte);
        let mut module = HloModule::new("m", comp);

        assert!(AlgebraicSimplifier.run(&mut module));
        assert_eq!(module.entry_computation().unwrap().root, Some(b));
    }
}
