//! HLO optimization passes for irprobe.
//!
//! Provides a [`Pass`] trait, a [`PassManager`] with fixed-point iteration,
//! and the built-in passes run when building an executable (constant
//! folding, algebraic simplification, dead code elimination, layout
//! assignment).

mod const_fold;
mod dce;
mod layout;
mod simplify;

pub use const_fold::ConstantFolding;
pub use dce::DeadCodeElimination;
pub use layout::LayoutAssignment;
pub use simplify::AlgebraicSimplifier;

use std::fmt::Debug;

use irprobe_ir::HloModule;

/// An optimization pass that transforms an HLO module.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Run the pass on a module. Returns `true` if anything was modified.
    fn run(&self, module: &mut HloModule) -> bool;
}

/// Optimization level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptLevel {
    /// No optimizations.
    O0,
    /// Folding, simplification and DCE.
    #[default]
    O1,
    /// Same as O1 for now.
    O2,
}

/// Maximum number of fixed-point iterations before giving up.
const MAX_ITERATIONS: usize = 10;

/// Runs passes in sequence with fixed-point iteration.
#[derive(Debug)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pass manager with no passes.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Creates a pass manager with passes appropriate for the given level.
    pub fn for_level(level: OptLevel) -> Self {
        let mut pm = Self::new();
        match level {
            OptLevel::O0 => {}
            OptLevel::O1 | OptLevel::O2 => {
                pm.add_pass(Box::new(ConstantFolding));
                pm.add_pass(Box::new(AlgebraicSimplifier));
                pm.add_pass(Box::new(DeadCodeElimination));
            }
        }
        pm
    }

    /// Adds a pass to the pipeline.
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs all passes until a fixed point is reached or the iteration
    /// limit. Returns the number of iterations that changed the module.
    pub fn run(&self, module: &mut HloModule) -> usize {
        let mut changed_iterations = 0;
        for _ in 0..MAX_ITERATIONS {
            let mut changed = false;
            for pass in &self.passes {
                if pass.run(module) {
                    log::debug!("pass '{}' changed module '{}'", pass.name(), module.name);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            changed_iterations += 1;
        }
        changed_iterations
    }
}

/// Convenience function: runs O1 optimization passes on a module.
pub fn optimize(module: &mut HloModule) {
    PassManager::for_level(OptLevel::O1).run(module);
}
