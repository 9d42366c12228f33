//! irprobe intermediate representation.
//!
//! An HLO-style program representation: modules of computations, each a
//! DAG of typed instructions. Provides the text printer, a Graphviz
//! renderer and a protobuf wire form used by the IR export stages.

mod computation;
mod dot;
mod error;
mod instruction;
mod literal;
mod module;
mod print;
pub mod proto;
mod serialize;
mod types;

pub use computation::Computation;
pub use dot::render_dot;
pub use error::IrError;
pub use instruction::{DotDimensions, InstrId, Instruction, OpMetadata, Opcode};
pub use literal::Literal;
pub use module::{AliasEntry, AliasKind, HloModule, ModuleConfig};
pub use print::{PrintOptions, format_instruction};
pub use types::{ArrayShape, ElementType, Layout, ProgramShape, Shape};
