//! Dead code elimination pass.
//!
//! Removes instructions not reachable from the root. Parameters are kept
//! so the computation's signature does not change.

use irprobe_ir::{Computation, HloModule, Opcode};

use crate::Pass;

#[derive(Debug)]
pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dce"
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
    if comp.root.is_none() {
        return false;
    }
    let live = comp.reachable_from_root();
    let before = comp.instructions.len();
    comp.instructions
        .retain(|i| i.opcode == Opcode::Parameter || live.contains(&i.id));
    comp.instructions.len() != before
}
