//! Buffer assignment for the entry computation of an optimized module.
//!
//! Every instruction defines one logical buffer, except `get-tuple-element`,
//! which forwards a buffer of its operand. Parameters and constants get
//! dedicated allocations, buffers live out of the computation get one
//! allocation each, and all remaining temporaries share a single
//! allocation at aligned offsets.

use std::collections::HashMap;

use irprobe_ir::proto::{
    AssignedProto, BufferAllocationProto, BufferAssignmentProto, LogicalBufferProto,
};
use irprobe_ir::{Computation, HloModule, InstrId, IrError, Opcode};

/// Alignment of buffers inside the shared temporary allocation.
pub const TEMP_ALIGNMENT: i64 = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalBuffer {
    pub id: usize,
    pub instruction: InstrId,
    pub instruction_name: String,
    pub size: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assigned {
    pub buffer: usize,
    pub offset: i64,
    pub size: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferAllocation {
    pub index: usize,
    pub size: i64,
    pub parameter_number: Option<u32>,
    pub maybe_live_out: bool,
    pub is_constant: bool,
    pub assigned: Vec<Assigned>,
}

impl BufferAllocation {
    pub fn is_entry_computation_parameter(&self) -> bool {
        self.parameter_number.is_some()
    }

    pub fn is_temp(&self) -> bool {
        !self.is_entry_computation_parameter() && !self.is_constant && !self.maybe_live_out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferAssignment {
    buffers: Vec<LogicalBuffer>,
    allocations: Vec<BufferAllocation>,
}

impl BufferAssignment {
    /// Assigns buffers for the entry computation of `module`.
    pub fn run(module: &HloModule) -> Result<Self, IrError> {
        let entry = module.entry_computation()?;
        let order = entry.post_order()?;

        let mut assignment = Self::default();
        let mut defined: HashMap<InstrId, usize> = HashMap::new();
        for instr in &order {
            if instr.opcode == Opcode::GetTupleElement {
                continue;
            }
            let id = assignment.buffers.len();
            assignment.buffers.push(LogicalBuffer {
                id,
                instruction: instr.id,
                instruction_name: instr.name.clone(),
                size: instr.shape.byte_size(),
            });
            defined.insert(instr.id, id);
        }

        let live_out = live_out_buffers(entry, &defined);
        let mut temp = BufferAllocation::default();
        for instr in &order {
            let Some(&buffer) = defined.get(&instr.id) else {
                continue;
            };
            let size = assignment.buffers[buffer].size;
            let whole = Assigned {
                buffer,
                offset: 0,
                size,
            };
            let dedicated = match instr.opcode {
                Opcode::Parameter => Some(BufferAllocation {
                    parameter_number: instr.parameter_number,
                    maybe_live_out: live_out.contains(&buffer),
                    ..Default::default()
                }),
                Opcode::Constant => Some(BufferAllocation {
                    is_constant: true,
                    maybe_live_out: live_out.contains(&buffer),
                    ..Default::default()
                }),
                _ if live_out.contains(&buffer) => Some(BufferAllocation {
                    maybe_live_out: true,
                    ..Default::default()
                }),
                _ => None,
            };
            match dedicated {
                Some(mut allocation) => {
                    allocation.size = size;
                    allocation.assigned.push(whole);
                    assignment.push_allocation(allocation);
                }
                None => {
                    let offset = align(temp.size);
                    temp.assigned.push(Assigned { offset, ..whole });
                    temp.size = offset + size;
                }
            }
        }
        if !temp.assigned.is_empty() {
            assignment.push_allocation(temp);
        }

        log::debug!(
            "buffer assignment for '{}': {} buffers in {} allocations, {} bytes",
            module.name,
            assignment.buffers.len(),
            assignment.allocations.len(),
            assignment.total_bytes()
        );
        Ok(assignment)
    }

    fn push_allocation(&mut self, mut allocation: BufferAllocation) {
        allocation.index = self.allocations.len();
        self.allocations.push(allocation);
    }

    pub fn logical_buffers(&self) -> &[LogicalBuffer] {
        &self.buffers
    }

    pub fn allocations(&self) -> &[BufferAllocation] {
        &self.allocations
    }

    /// The allocation holding the buffer defined by `instr`.
    pub fn allocation_for(&self, instr: InstrId) -> Option<&BufferAllocation> {
        let buffer = self.buffers.iter().find(|b| b.instruction == instr)?.id;
        self.allocations
            .iter()
            .find(|a| a.assigned.iter().any(|x| x.buffer == buffer))
    }

    pub fn total_bytes(&self) -> i64 {
        self.allocations.iter().map(|a| a.size).sum()
    }

    pub fn to_proto(&self) -> BufferAssignmentProto {
        BufferAssignmentProto {
            logical_buffers: self
                .buffers
                .iter()
                .map(|b| LogicalBufferProto {
                    id: b.id as i64,
                    instruction_name: b.instruction_name.clone(),
                    shape_index: Vec::new(),
                    size: b.size,
                })
                .collect(),
            buffer_allocations: self
                .allocations
                .iter()
                .map(|a| BufferAllocationProto {
                    index: a.index as i64,
                    size: a.size,
                    is_entry_computation_parameter: a.is_entry_computation_parameter(),
                    parameter_number: a.parameter_number.map_or(-1, i64::from),
                    maybe_live_out: a.maybe_live_out,
                    is_constant: a.is_constant,
                    assigned: a
                        .assigned
                        .iter()
                        .map(|x| AssignedProto {
                            logical_buffer_id: x.buffer as i64,
                            offset: x.offset,
                            size: x.size,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

fn align(offset: i64) -> i64 {
    (offset + TEMP_ALIGNMENT - 1) / TEMP_ALIGNMENT * TEMP_ALIGNMENT
}

/// Buffers that may be visible to the caller after the computation runs:
/// the root's own buffer and, for a tuple root, each element's buffer.
fn live_out_buffers(comp: &Computation, defined: &HashMap<InstrId, usize>) -> Vec<usize> {
    let mut live = Vec::new();
    let Some(root) = comp.root.and_then(|r| comp.get(r)) else {
        return live;
    };
    live.extend(source_buffer(comp, root.id, defined));
    if root.opcode == Opcode::Tuple {
        for &op in &root.operands {
            live.extend(source_buffer(comp, op, defined));
        }
    }
    live
}

/// Follows `get-tuple-element` chains back to the defining buffer.
fn source_buffer(comp: &Computation, id: InstrId, defined: &HashMap<InstrId, usize>) -> Option<usize> {
    if let Some(&buffer) = defined.get(&id) {
        return Some(buffer);
    }
    let instr = comp.get(id)?;
    let tuple = comp.get(*instr.operands.first()?)?;
    let element = *tuple.operands.get(instr.tuple_index? as usize)?;
    source_buffer(comp, element, defined)
}
