//! Computations: ordered instruction lists with a designated root.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::IrError;
use crate::instruction::{InstrId, Instruction, Opcode};
use crate::types::{ProgramShape, Shape};

/// A computation: a DAG of instructions with a single root.
///
/// Instructions are stored in insertion order, which is always a valid
/// def-before-use order for computations built through [`add`](Self::add).
#[derive(Clone, Debug, PartialEq)]
pub struct Computation {
    pub name: String,
    pub instructions: Vec<Instruction>,
    pub root: Option<InstrId>,
    next_id: u32,
}

impl Computation {
    /// Creates an empty computation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            root: None,
            next_id: 1,
        }
    }

    /// Rebuilds a computation from already-numbered instructions
    /// (used when decoding the wire form).
    pub(crate) fn from_parts(
        name: String,
        instructions: Vec<Instruction>,
        root: Option<InstrId>,
    ) -> Self {
        let next_id = instructions.iter().map(|i| i.id.0).max().unwrap_or(0).saturating_add(1);
        Self {
            name,
            instructions,
            root,
            next_id,
        }
    }

    /// Appends an instruction, assigning its id and suffixing its name
    /// with the id (`add` becomes `add.3`).
    pub fn add(&mut self, mut instr: Instruction) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        instr.id = id;
        instr.name = format!("{}.{}", sanitize(&instr.name), id.0);
        self.instructions.push(instr);
        id
    }

    pub fn set_root(&mut self, id: InstrId) {
        self.root = Some(id);
    }

    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: InstrId) -> Option<&mut Instruction> {
        self.instructions.iter_mut().find(|i| i.id == id)
    }

    /// Like [`get`](Self::get) but reports a dangling id as an error.
    pub fn instruction(&self, id: InstrId) -> Result<&Instruction, IrError> {
        self.get(id).ok_or(IrError::UnknownInstruction {
            computation: self.name.clone(),
            id: id.0,
        })
    }

    pub fn root_instruction(&self) -> Result<&Instruction, IrError> {
        let root = self
            .root
            .ok_or_else(|| IrError::MissingRoot(self.name.clone()))?;
        self.instruction(root)
    }

    /// Parameter instructions ordered by parameter number.
    pub fn parameters(&self) -> Vec<&Instruction> {
        let mut params: Vec<&Instruction> = self
            .instructions
            .iter()
            .filter(|i| i.opcode == Opcode::Parameter)
            .collect();
        params.sort_by_key(|i| i.parameter_number);
        params
    }

    /// Instructions that use `id` as an operand.
    pub fn users(&self, id: InstrId) -> Vec<&Instruction> {
        self.instructions
            .iter()
            .filter(|i| i.operands.contains(&id))
            .collect()
    }

    /// Rewrites every operand reference to `from` into `to`, including the
    /// root. Returns `true` if anything changed.
    pub fn replace_all_uses(&mut self, from: InstrId, to: InstrId) -> bool {
        let mut changed = false;
        for instr in &mut self.instructions {
            changed |= instr.replace_operand(from, to);
        }
        if self.root == Some(from) {
            self.root = Some(to);
            changed = true;
        }
        changed
    }

    /// Parameter and result shapes.
    pub fn program_shape(&self) -> Result<ProgramShape, IrError> {
        let params = self.parameters();
        Ok(ProgramShape {
            parameters: params.iter().map(|p| p.shape.clone()).collect(),
            parameter_names: params.iter().map(|p| p.name.clone()).collect(),
            result: self.root_instruction()?.shape.clone(),
        })
    }

    /// The root shape, or an empty tuple if no root is set.
    pub fn result_shape(&self) -> Shape {
        self.root_instruction()
            .map(|r| r.shape.clone())
            .unwrap_or(Shape::Tuple(Vec::new()))
    }

    /// Returns instructions in topological (def-before-use) order.
    ///
    /// The ordering is deterministic: among ready instructions, the one
    /// with the smaller [`InstrId`] is emitted first.
    pub fn post_order(&self) -> Result<Vec<&Instruction>, IrError> {
        let index: HashMap<InstrId, usize> = self
            .instructions
            .iter()
            .enumerate()
            .map(|(i, instr)| (instr.id, i))
            .collect();

        let n = self.instructions.len();
        let mut in_degree = vec![0usize; n];
        let mut users: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (ui, instr) in self.instructions.iter().enumerate() {
            for op in &instr.operands {
                let &pi = index.get(op).ok_or(IrError::UnknownInstruction {
                    computation: self.name.clone(),
                    id: op.0,
                })?;
                in_degree[ui] += 1;
                users[pi].push(ui);
            }
        }

        let mut ready: BTreeSet<(InstrId, usize)> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| (self.instructions[i].id, i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some((_, idx)) = ready.pop_first() {
            order.push(&self.instructions[idx]);
            for &ui in &users[idx] {
                in_degree[ui] -= 1;
                if in_degree[ui] == 0 {
                    ready.insert((self.instructions[ui].id, ui));
                }
            }
        }

        if order.len() != n {
            return Err(IrError::Cycle(self.name.clone()));
        }
        Ok(order)
    }

    /// Ids of instructions reachable from the root through operands.
    pub fn reachable_from_root(&self) -> HashSet<InstrId> {
        let mut live = HashSet::new();
        let mut worklist: Vec<InstrId> = self.root.into_iter().collect();
        while let Some(id) = worklist.pop() {
            if live.insert(id) {
                if let Some(instr) = self.get(id) {
                    worklist.extend(instr.operands.iter().copied());
                }
            }
        }
        live
    }
}

/// Keeps instruction names to `[A-Za-z0-9_-]`.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "instr".into()
    } else {
        cleaned
    }
}
