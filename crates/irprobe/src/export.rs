//! Rendering of a compiled function at one of the export stages.
//!
//! Each [`ExportStage`] maps to a single producer. Program producers read
//! the unoptimized module directly; executable producers build one
//! executable first and read its optimized module.

use std::fmt;
use std::str::FromStr;

use irprobe_compiler::{CompilationResult, CompilerClient, CompilerOptions, LocalExecutable};
use irprobe_ir::{PrintOptions, render_dot};

use crate::error::DriverError;
use crate::executable;

/// Title given to rendered graphs.
pub const DOT_TITLE: &str = "Visualization";

/// A point in the pipeline at which IR can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportStage {
    /// Unoptimized program text, with op metadata.
    Hlo,
    /// Unoptimized program text without op metadata.
    HloNoMetadata,
    /// Unoptimized program as serialized `HloModuleProto`.
    HloSerialized,
    /// Optimized program text.
    OptimizedHlo,
    /// Optimized program as serialized `HloModuleProto`.
    OptimizedHloSerialized,
    /// Serialized `HloProto`: optimized program plus buffer assignment.
    OptimizedHloProtoSerialized,
    /// Graphviz rendering of the optimized entry computation.
    OptimizedHloDot,
}

impl ExportStage {
    pub const ALL: [Self; 7] = [
        Self::Hlo,
        Self::HloNoMetadata,
        Self::HloSerialized,
        Self::OptimizedHlo,
        Self::OptimizedHloSerialized,
        Self::OptimizedHloProtoSerialized,
        Self::OptimizedHloDot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hlo => "HLO",
            Self::HloNoMetadata => "HLO_NO_METADATA",
            Self::HloSerialized => "HLO_SERIALIZED",
            Self::OptimizedHlo => "OPTIMIZED_HLO",
            Self::OptimizedHloSerialized => "OPTIMIZED_HLO_SERIALIZED",
            Self::OptimizedHloProtoSerialized => "OPTIMIZED_HLO_PROTO_SERIALIZED",
            Self::OptimizedHloDot => "OPTIMIZED_HLO_DOT",
        }
    }

    fn producer(self) -> Producer {
        match self {
            Self::Hlo => Producer::Program(program_text),
            Self::HloNoMetadata => Producer::Program(program_text_no_metadata),
            Self::HloSerialized => Producer::Program(program_serialized),
            Self::OptimizedHlo => Producer::Executable {
                embed_ir: false,
                render: optimized_text,
            },
            Self::OptimizedHloSerialized => Producer::Executable {
                embed_ir: false,
                render: optimized_serialized,
            },
            Self::OptimizedHloProtoSerialized => Producer::Executable {
                embed_ir: true,
                render: embedded_proto,
            },
            Self::OptimizedHloDot => Producer::Executable {
                embed_ir: false,
                render: optimized_dot,
            },
        }
    }

    /// `true` if the stage is rendered from a built executable.
    pub fn needs_executable(self) -> bool {
        matches!(self.producer(), Producer::Executable { .. })
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportStage {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| DriverError::invalid_argument(format!("unknown export stage '{s}'")))
    }
}

/// Exported IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrOutput {
    Text(String),
    Serialized(Vec<u8>),
}

impl IrOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Serialized(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Serialized(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Serialized(bytes) => bytes,
        }
    }
}

type ProgramFn = fn(&CompilationResult) -> Result<IrOutput, DriverError>;
type ExecutableFn = fn(&LocalExecutable) -> Result<IrOutput, DriverError>;

#[derive(Clone, Copy)]
enum Producer {
    Program(ProgramFn),
    Executable { embed_ir: bool, render: ExecutableFn },
}

/// Renders `result` at `stage`, building an executable with `client` when
/// the stage needs one.
pub fn export(
    stage: ExportStage,
    result: &CompilationResult,
    client: &dyn CompilerClient,
    options: &CompilerOptions,
) -> Result<IrOutput, DriverError> {
    match stage.producer() {
        Producer::Program(render) => render(result),
        Producer::Executable { embed_ir, render } => {
            log::debug!("building executable for stage {stage}");
            let executable = executable::build(client, result, options, embed_ir)?;
            render(&executable)
        }
    }
}

fn program_text(result: &CompilationResult) -> Result<IrOutput, DriverError> {
    Ok(IrOutput::Text(result.module.to_text(&PrintOptions::default())))
}

fn program_text_no_metadata(result: &CompilationResult) -> Result<IrOutput, DriverError> {
    Ok(IrOutput::Text(result.module.to_text(&PrintOptions::no_metadata())))
}

fn program_serialized(result: &CompilationResult) -> Result<IrOutput, DriverError> {
    Ok(IrOutput::Serialized(result.module.to_bytes()))
}

fn optimized_text(executable: &LocalExecutable) -> Result<IrOutput, DriverError> {
    Ok(IrOutput::Text(executable.module().to_text(&PrintOptions::default())))
}

fn optimized_serialized(executable: &LocalExecutable) -> Result<IrOutput, DriverError> {
    Ok(IrOutput::Serialized(executable.module().to_bytes()))
}

fn embedded_proto(executable: &LocalExecutable) -> Result<IrOutput, DriverError> {
    let proto = executable
        .hlo_proto()
        .ok_or_else(|| DriverError::internal("executable was built without embedded IR"))?;
    Ok(IrOutput::Serialized(proto.to_bytes()))
}

fn optimized_dot(executable: &LocalExecutable) -> Result<IrOutput, DriverError> {
    let entry = executable.module().entry_computation()?;
    Ok(IrOutput::Text(render_dot(entry, DOT_TITLE)?))
}
