//! HLO modules.

use std::collections::HashSet;

use crate::computation::Computation;
use crate::error::IrError;
use crate::instruction::Opcode;
use crate::types::ProgramShape;

/// Whether an input/output alias is a hint or a requirement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AliasKind {
    /// The runtime may reuse the parameter buffer for the output.
    #[default]
    MayAlias,
    /// The output must live in the parameter buffer.
    MustAlias,
}

/// Declares that an output shares its buffer with an entry parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasEntry {
    /// Tuple index path of the output (empty for a non-tuple result).
    pub output_index: Vec<i64>,
    pub parameter_number: u32,
    pub kind: AliasKind,
}

/// Module-wide compilation settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleConfig {
    pub replica_count: u32,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self { replica_count: 1 }
    }
}

/// A compiled program: a set of computations, one of which is the entry.
#[derive(Clone, Debug, PartialEq)]
pub struct HloModule {
    pub name: String,
    pub entry: String,
    pub computations: Vec<Computation>,
    pub config: ModuleConfig,
    pub input_output_alias: Vec<AliasEntry>,
}

impl HloModule {
    /// Creates a module whose only computation is `entry`.
    pub fn new(name: impl Into<String>, entry: Computation) -> Self {
        Self {
            name: name.into(),
            entry: entry.name.clone(),
            computations: vec![entry],
            config: ModuleConfig::default(),
            input_output_alias: Vec::new(),
        }
    }

    pub fn computation(&self, name: &str) -> Option<&Computation> {
        self.computations.iter().find(|c| c.name == name)
    }

    pub fn entry_computation(&self) -> Result<&Computation, IrError> {
        self.computation(&self.entry)
            .ok_or_else(|| IrError::MissingEntry(self.entry.clone()))
    }

    pub fn entry_computation_mut(&mut self) -> Result<&mut Computation, IrError> {
        let entry = self.entry.clone();
        self.computations
            .iter_mut()
            .find(|c| c.name == entry)
            .ok_or(IrError::MissingEntry(entry))
    }

    /// Parameter and result shapes of the entry computation.
    pub fn program_shape(&self) -> Result<ProgramShape, IrError> {
        self.entry_computation()?.program_shape()
    }

    /// Checks structural invariants: the entry exists, every computation
    /// has a root and an acyclic operand graph, parameter numbers are
    /// dense, and aliases refer to real parameters and outputs.
    pub fn verify(&self) -> Result<(), IrError> {
        let mut names = HashSet::new();
        for comp in &self.computations {
            if !names.insert(comp.name.as_str()) {
                return Err(IrError::Invalid(format!(
                    "duplicate computation name '{}'",
                    comp.name
                )));
            }
            comp.root_instruction()?;
            comp.post_order()?;

            let params = comp.parameters();
            for (expected, p) in params.iter().enumerate() {
                if p.parameter_number != Some(expected as u32) {
                    return Err(IrError::Invalid(format!(
                        "computation '{}': parameter '{}' has number {:?}, expected {expected}",
                        comp.name, p.name, p.parameter_number
                    )));
                }
            }
            for instr in &comp.instructions {
                if instr.opcode == Opcode::Constant && instr.literal.is_none() {
                    return Err(IrError::Invalid(format!(
                        "constant '{}' has no literal",
                        instr.name
                    )));
                }
            }
        }

        let entry = self.entry_computation()?;
        let param_count = entry.parameters().len() as u32;
        let result = entry.result_shape();
        for alias in &self.input_output_alias {
            if alias.parameter_number >= param_count {
                return Err(IrError::Invalid(format!(
                    "alias refers to parameter {} but entry has {param_count}",
                    alias.parameter_number
                )));
            }
            if result.subshape(&alias.output_index).is_none() {
                return Err(IrError::Invalid(format!(
                    "alias refers to missing output {:?}",
                    alias.output_index
                )));
            }
        }
        Ok(())
    }

    /// Total number of instructions across all computations.
    pub fn instruction_count(&self) -> usize {
        self.computations.iter().map(|c| c.instructions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;
    use crate::types::{ElementType, Shape};

    fn negate_module() -> HloModule {
        let mut comp = Computation::new("main");
        let shape = Shape::array(ElementType::F32, [4]);
        let x = comp.add(Instruction::parameter(0, "x", shape.clone()));
        let neg = comp.add(Instruction::new(Opcode::Negate, "neg", shape, vec![x]));
        comp.set_root(neg);
        HloModule::new("negate", comp)
    }

    #[test]
    fn entry_lookup() {
        let module = negate_module();
        assert_eq!(module.entry_computation().unwrap().name, "main");
        assert_eq!(module.instruction_count(), 2);
        assert_eq!(module.config.replica_count, 1);
    }

    #[test]
    fn missing_entry() {
        let mut module = negate_module();
        module.entry = "nope".into();
        assert!(matches!(
            module.entry_computation(),
            Err(IrError::MissingEntry(_))
        ));
    }

    #[test]
    fn verify_accepts_well_formed() {
        negate_module().verify().unwrap();
    }

    #[test]
    fn verify_rejects_sparse_parameter_numbers() {
        let mut module = negate_module();
        let entry = module.entry_computation_mut().unwrap();
        entry.instructions[0].parameter_number = Some(3);
        let err = module.verify().unwrap_err();
        assert!(err.to_string().contains("expected 0"));
    }

    #[test]
    fn verify_rejects_bad_alias() {
        let mut module = negate_module();
        module.input_output_alias.push(AliasEntry {
            output_index: vec![],
            parameter_number: 5,
            kind: AliasKind::MayAlias,
        });
        assert!(module.verify().is_err());
    }
}
