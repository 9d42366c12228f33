//! Layout assignment pass.
//!
//! Gives every array shape in the module a layout. Entry parameters and the
//! root can be pinned to caller-chosen layouts; everything else gets the
//! default descending (row-major) layout.

use irprobe_ir::{HloModule, Opcode, Shape};

use crate::Pass;

#[derive(Debug, Default)]
pub struct LayoutAssignment {
    /// Layouts for the entry parameters, by parameter number.
    pub parameter_layouts: Vec<Shape>,
    /// Layout for the entry computation's result.
    pub result_layout: Option<Shape>,
}

impl LayoutAssignment {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pass for LayoutAssignment {
    fn name(&self) -> &str {
        "layout-assignment"
    }

    fn run(&self, module: &mut HloModule) -> bool {
        let entry_name = module.entry.clone();
        let mut changed = false;
        for comp in &mut module.computations {
            let is_entry = comp.name == entry_name;
            let root = comp.root;
            for instr in &mut comp.instructions {
                let pinned = if !is_entry {
                    None
                } else if instr.opcode == Opcode::Parameter {
                    instr
                        .parameter_number
                        .and_then(|n| self.parameter_layouts.get(n as usize))
                } else if Some(instr.id) == root {
                    self.result_layout.as_ref()
                } else {
                    None
                };
                changed |= assign(&mut instr.shape, pinned);
            }
        }
        changed
    }
}

fn assign(shape: &mut Shape, pinned: Option<&Shape>) -> bool {
    if let Some(pinned) = pinned.filter(|p| p.has_layout() && p.compatible(shape)) {
        if shape != pinned {
            *shape = pinned.clone();
            return true;
        }
        return false;
    }
    if shape.has_layout() {
        return false;
    }
    shape.set_default_layout()
}
