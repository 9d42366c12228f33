//! Function lowering and executable building for irprobe.
//!
//! [`FunctionCompiler`] lowers a [`FunctionDef`](irprobe_runtime::FunctionDef)
//! with concrete [`Argument`]s into an unoptimized [`HloModule`](irprobe_ir::HloModule).
//! A [`CompilerClient`] turns that module into [`LocalExecutable`]s: it runs
//! the optimization pipeline, assigns layouts and buffers, and optionally
//! embeds the optimized IR.

mod argument;
mod buffer;
mod client;
mod error;
mod executable;
mod lower;
mod options;

pub use argument::{Argument, ArgumentKind};
pub use buffer::{Assigned, BufferAllocation, BufferAssignment, LogicalBuffer, TEMP_ALIGNMENT};
pub use client::{CompilerClient, LocalClient};
pub use error::CompileError;
pub use executable::LocalExecutable;
pub use lower::{CollectiveInfo, CompilationResult, FunctionCompiler, ResourceUpdate};
pub use options::{
    CompileOptions, CompilerOptions, DebugOptions, ExecutableBuildOptions, Platform,
};
