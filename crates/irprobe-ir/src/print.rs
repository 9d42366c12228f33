//! Display implementations and the HLO text format.

use std::fmt::{self, Write as _};

use crate::computation::Computation;
use crate::instruction::{Instruction, OpMetadata, Opcode};
use crate::literal::Literal;
use crate::module::{AliasKind, HloModule};
use crate::types::{ElementType, Layout, Shape};

/// Controls what [`HloModule::to_text`] emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrintOptions {
    /// Emit `metadata={...}` annotations.
    pub print_metadata: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            print_metadata: true,
        }
    }
}

impl PrintOptions {
    /// Default options with metadata suppressed.
    pub fn no_metadata() -> Self {
        Self {
            print_metadata: false,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", join(&self.minor_to_major))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(a) => {
                write!(f, "{}[{}]", a.element_type, join(&a.dims))?;
                if let Some(layout) = &a.layout {
                    write!(f, "{layout}")?;
                }
                Ok(())
            }
            Self::Tuple(elements) => {
                f.write_str("(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dims.is_empty() {
            return match self.values.first() {
                Some(v) => write!(f, "{v}"),
                None => f.write_str("{}"),
            };
        }
        write_nested(f, &self.dims, &self.values)
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, dims: &[i64], values: &[f64]) -> fmt::Result {
    let Some((&outer, inner)) = dims.split_first() else {
        return match values.first() {
            Some(v) => write!(f, "{v}"),
            None => Ok(()),
        };
    };
    let stride = inner.iter().product::<i64>().max(0) as usize;
    f.write_str("{")?;
    for i in 0..outer.max(0) as usize {
        if i > 0 {
            f.write_str(", ")?;
        }
        let start = (i * stride).min(values.len());
        let end = (start + stride).min(values.len());
        write_nested(f, inner, &values[start..end])?;
    }
    f.write_str("}")
}

impl fmt::Display for OpMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if !self.op_type.is_empty() {
            fields.push(format!("op_type=\"{}\"", escape(&self.op_type)));
        }
        if !self.op_name.is_empty() {
            fields.push(format!("op_name=\"{}\"", escape(&self.op_name)));
        }
        if !self.source_file.is_empty() {
            fields.push(format!("source_file=\"{}\"", escape(&self.source_file)));
        }
        if self.source_line != 0 {
            fields.push(format!("source_line={}", self.source_line));
        }
        write!(f, "{{{}}}", fields.join(" "))
    }
}

impl fmt::Display for HloModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(&PrintOptions::default()))
    }
}

impl HloModule {
    /// Renders the module in HLO text form.
    pub fn to_text(&self, opts: &PrintOptions) -> String {
        let mut out = String::new();
        let _ = write!(out, "HloModule {}", self.name);
        if !self.input_output_alias.is_empty() {
            let entries: Vec<String> = self
                .input_output_alias
                .iter()
                .map(|a| {
                    let kind = match a.kind {
                        AliasKind::MayAlias => "may-alias",
                        AliasKind::MustAlias => "must-alias",
                    };
                    format!(
                        "{{{}}}: ({}, {{}}, {kind})",
                        join(&a.output_index),
                        a.parameter_number
                    )
                })
                .collect();
            let _ = write!(out, ", input_output_alias={{ {} }}", entries.join(", "));
        }
        if self.config.replica_count > 1 {
            let _ = write!(out, ", replica_count={}", self.config.replica_count);
        }
        out.push_str("\n\n");

        // Non-entry computations first, so callees precede callers.
        for comp in self.computations.iter().filter(|c| c.name != self.entry) {
            write_computation(&mut out, comp, false, opts);
            out.push('\n');
        }
        if let Ok(entry) = self.entry_computation() {
            write_computation(&mut out, entry, true, opts);
        }
        out
    }
}

fn write_computation(out: &mut String, comp: &Computation, is_entry: bool, opts: &PrintOptions) {
    let params: Vec<String> = comp
        .parameters()
        .iter()
        .map(|p| format!("{}: {}", p.name, p.shape))
        .collect();
    let _ = writeln!(
        out,
        "{}%{} ({}) -> {} {{",
        if is_entry { "ENTRY " } else { "" },
        comp.name,
        params.join(", "),
        comp.result_shape()
    );
    for instr in &comp.instructions {
        let root = if comp.root == Some(instr.id) {
            "ROOT "
        } else {
            ""
        };
        let _ = writeln!(out, "  {root}{}", format_instruction(comp, instr, opts));
    }
    out.push_str("}\n");
}

/// Formats one instruction line (without indentation or `ROOT`).
pub fn format_instruction(comp: &Computation, instr: &Instruction, opts: &PrintOptions) -> String {
    let mut line = format!("%{} = {} {}(", instr.name, instr.shape, instr.opcode);
    match instr.opcode {
        Opcode::Parameter => {
            let _ = write!(line, "{}", instr.parameter_number.unwrap_or(0));
        }
        Opcode::Constant => {
            if let Some(lit) = &instr.literal {
                let _ = write!(line, "{lit}");
            }
        }
        _ => {
            let operands: Vec<String> = instr
                .operands
                .iter()
                .map(|&id| match comp.get(id) {
                    Some(op) => format!("%{}", op.name),
                    None => format!("%<unknown {}>", id.0),
                })
                .collect();
            line.push_str(&operands.join(", "));
        }
    }
    line.push(')');

    match instr.opcode {
        Opcode::Transpose | Opcode::Broadcast => {
            let _ = write!(line, ", dimensions={{{}}}", join(&instr.dimensions));
        }
        Opcode::Dot => {
            if let Some(dims) = &instr.dot_dimensions {
                let _ = write!(
                    line,
                    ", lhs_contracting_dims={{{}}}, rhs_contracting_dims={{{}}}",
                    join(&dims.lhs_contracting),
                    join(&dims.rhs_contracting)
                );
            }
        }
        Opcode::GetTupleElement => {
            let _ = write!(line, ", index={}", instr.tuple_index.unwrap_or(0));
        }
        Opcode::AllReduce => {
            let n = instr.replica_group_size.unwrap_or(1) as i64;
            let group: Vec<i64> = (0..n).collect();
            let _ = write!(line, ", replica_groups={{{{{}}}}}, to_apply=sum", join(&group));
        }
        _ => {}
    }

    if opts.print_metadata {
        if let Some(md) = instr.metadata.as_ref().filter(|m| !m.is_empty()) {
            let _ = write!(line, ", metadata={md}");
        }
    }
    line
}

fn join(values: &[i64]) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstrId;
    use crate::module::AliasEntry;

    fn f32_2x2() -> Shape {
        Shape::array(ElementType::F32, [2, 2])
    }

    fn add_module() -> HloModule {
        let mut comp = Computation::new("main");
        let x = comp.add(Instruction::parameter(0, "x", f32_2x2()));
        let y = comp.add(Instruction::parameter(1, "y", f32_2x2()));
        let add = comp.add(
            Instruction::new(Opcode::Add, "add", f32_2x2(), vec![x, y])
                .with_metadata(OpMetadata::new("AddV2", "add")),
        );
        comp.set_root(add);
        HloModule::new("add_fn", comp)
    }

    #[test]
    fn shape_display() {
        assert_eq!(f32_2x2().to_string(), "f32[2,2]");
        let mut laid_out = f32_2x2();
        laid_out.set_default_layout();
        assert_eq!(laid_out.to_string(), "f32[2,2]{1,0}");
        assert_eq!(Shape::scalar(ElementType::S32).to_string(), "s32[]");
        let t = Shape::tuple(vec![f32_2x2(), Shape::scalar(ElementType::Pred)]);
        assert_eq!(t.to_string(), "(f32[2,2], pred[])");
    }

    #[test]
    fn literal_display() {
        assert_eq!(Literal::scalar(ElementType::F32, 1.5).to_string(), "1.5");
        let lit = Literal::new(ElementType::S32, [2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(lit.to_string(), "{{1, 2}, {3, 4}}");
    }

    #[test]
    fn module_text() {
        let text = add_module().to_text(&PrintOptions::default());
        assert!(text.starts_with("HloModule add_fn\n"));
        assert!(text.contains("ENTRY %main (x.1: f32[2,2], y.2: f32[2,2]) -> f32[2,2] {"));
        assert!(text.contains("  %x.1 = f32[2,2] parameter(0)"));
        assert!(text.contains(
            "  ROOT %add.3 = f32[2,2] add(%x.1, %y.2), metadata={op_type=\"AddV2\" op_name=\"add\"}"
        ));
    }

    #[test]
    fn metadata_can_be_suppressed() {
        let module = add_module();
        let with = module.to_text(&PrintOptions::default());
        let without = module.to_text(&PrintOptions::no_metadata());
        assert!(!without.contains("metadata="));
        assert_eq!(
            with.replace(", metadata={op_type=\"AddV2\" op_name=\"add\"}", ""),
            without
        );
    }

    #[test]
    fn header_lists_aliases_and_replicas() {
        let mut module = add_module();
        module.config.replica_count = 4;
        module.input_output_alias.push(AliasEntry {
            output_index: vec![],
            parameter_number: 1,
            kind: AliasKind::MayAlias,
        });
        let text = module.to_string();
        assert!(text.contains("input_output_alias={ {}: (1, {}, may-alias) }"));
        assert!(text.contains("replica_count=4"));
    }

    #[test]
    fn attribute_rendering() {
        let mut comp = Computation::new("main");
        let x = comp.add(Instruction::parameter(0, "x", Shape::array(ElementType::F32, [2, 3])));
        let t = comp.add(
            Instruction::new(
                Opcode::Transpose,
                "t",
                Shape::array(ElementType::F32, [3, 2]),
                vec![x],
            )
            .with_dimensions(vec![1, 0]),
        );
        comp.set_root(t);
        let line = format_instruction(&comp, comp.get(t).unwrap(), &PrintOptions::default());
        assert_eq!(line, "%t.2 = f32[3,2] transpose(%x.1), dimensions={1,0}");

        let dangling = Instruction::new(Opcode::Negate, "n", f32_2x2(), vec![InstrId(99)]);
        let line = format_instruction(&comp, &dangling, &PrintOptions::default());
        assert!(line.contains("%<unknown 99>"));
    }
}
