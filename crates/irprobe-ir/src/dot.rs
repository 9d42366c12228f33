//! Graphviz rendering of computations.

use std::fmt::{self, Write as _};

use crate::computation::Computation;
use crate::error::IrError;
use crate::instruction::{Instruction, Opcode};

/// Renders `comp` as a Graphviz `digraph`, one node per instruction and one
/// edge per operand use, titled `"{title}: {computation name}"`.
///
/// Fails if the computation has a dangling operand or a cycle.
pub fn render_dot(comp: &Computation, title: &str) -> Result<String, IrError> {
    let order = comp.post_order()?;
    let mut out = String::new();
    write_dot(&mut out, comp, &order, title)?;
    Ok(out)
}

fn write_dot(
    out: &mut impl fmt::Write,
    comp: &Computation,
    order: &[&Instruction],
    title: &str,
) -> fmt::Result {
    writeln!(out, "digraph \"{}\" {{", escape(&comp.name))?;
    writeln!(out, "  label=\"{}: {}\";", escape(title), escape(&comp.name))?;
    writeln!(out, "  labelloc=t;")?;
    writeln!(out, "  rankdir=TB;")?;
    writeln!(out, "  node [shape=box, style=\"rounded,filled\", fontname=\"monospace\"];")?;

    for instr in order {
        let mut label = format!("{}\\n{}", escape(&instr.name), instr.opcode);
        match instr.opcode {
            Opcode::Parameter => {
                write!(label, "({})", instr.parameter_number.unwrap_or(0))?;
            }
            Opcode::Constant => {
                if let Some(lit) = &instr.literal {
                    if lit.values.len() <= 8 {
                        write!(label, " {}", escape(&lit.to_string()))?;
                    }
                }
            }
            _ => {}
        }
        write!(label, "\\n{}", instr.shape)?;
        let peripheries = if comp.root == Some(instr.id) { 2 } else { 1 };
        writeln!(
            out,
            "  n{} [label=\"{label}\", fillcolor=\"{}\", peripheries={peripheries}];",
            instr.id.0,
            fill_color(instr.opcode)
        )?;
    }

    for instr in order {
        for (i, op) in instr.operands.iter().enumerate() {
            if instr.operands.len() > 1 {
                writeln!(out, "  n{} -> n{} [label=\"{i}\"];", op.0, instr.id.0)?;
            } else {
                writeln!(out, "  n{} -> n{};", op.0, instr.id.0)?;
            }
        }
    }

    writeln!(out, "}}")
}

fn fill_color(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Parameter => "#fff3c4",
        Opcode::Constant => "#e0e0e0",
        Opcode::Dot => "#c8e6c9",
        Opcode::Tuple | Opcode::GetTupleElement => "#ffffff",
        Opcode::AllReduce => "#ffcdd2",
        Opcode::Reshape | Opcode::Transpose | Opcode::Broadcast | Opcode::Copy => "#d1c4e9",
        _ => "#bbdefb",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstrId;
    use crate::types::{ElementType, Shape};

    #[test]
    fn renders_nodes_and_edges() {
        let shape = Shape::array(ElementType::F32, [2]);
        let mut comp = Computation::new("main.3");
        let x = comp.add(Instruction::parameter(0, "x", shape.clone()));
        let y = comp.add(Instruction::parameter(1, "y", shape.clone()));
        let add = comp.add(Instruction::new(Opcode::Add, "add", shape, vec![x, y]));
        comp.set_root(add);

        let dot = render_dot(&comp, "Visualization").unwrap();
        assert!(dot.starts_with("digraph \"main.3\" {"));
        assert!(dot.contains("label=\"Visualization: main.3\""));
        assert!(dot.contains("n1 -> n3 [label=\"0\"];"));
        assert!(dot.contains("n2 -> n3 [label=\"1\"];"));
        assert!(dot.contains("peripheries=2"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn header_and_labels() {
        let mut comp = Computation::new("neg");
        let x = comp.add(Instruction::parameter(0, "x", Shape::array(ElementType::F32, [3])));
        let n = comp.add(Instruction::new(
            Opcode::Negate,
            "n",
            Shape::array(ElementType::F32, [3]),
            vec![x],
        ));
        comp.set_root(n);

        let dot = render_dot(&comp, "Visualization").unwrap();
        let lines: Vec<&str> = dot.lines().collect();
        assert_eq!(lines[0], "digraph \"neg\" {");
        assert_eq!(lines[2], "  labelloc=t;");
        assert!(lines[5].contains("parameter(0)\\nf32[3]"), "{}", lines[5]);
        assert!(dot.contains("  n1 -> n2;\n"));
        assert_eq!(lines.last(), Some(&"}"));
    }

    #[test]
    fn dangling_operand_fails() {
        let shape = Shape::scalar(ElementType::F32);
        let mut comp = Computation::new("bad");
        let n = comp.add(Instruction::new(Opcode::Negate, "n", shape, vec![InstrId(9)]));
        comp.set_root(n);
        assert!(render_dot(&comp, "Visualization").is_err());
    }
}
