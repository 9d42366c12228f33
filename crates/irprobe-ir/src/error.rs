//! Error types for the irprobe IR.

/// Errors that can occur when constructing, verifying or decoding IR.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// An operand or root refers to an instruction that does not exist.
    #[error("computation '{computation}': unknown instruction id {id}")]
    UnknownInstruction { computation: String, id: u32 },

    /// A computation has no root instruction.
    #[error("computation '{0}' has no root instruction")]
    MissingRoot(String),

    /// The module's entry computation is missing.
    #[error("entry computation '{0}' not found")]
    MissingEntry(String),

    /// The operand graph of a computation is cyclic.
    #[error("computation '{0}' contains a cycle")]
    Cycle(String),

    /// A literal's values do not match its dimensions.
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    /// A structural invariant does not hold.
    #[error("invalid module: {0}")]
    Invalid(String),

    /// The protobuf form is well-typed but semantically malformed.
    #[error("malformed proto: {0}")]
    MalformedProto(String),

    /// The bytes are not a valid protobuf message.
    #[error("failed to decode proto: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("failed to render: {0}")]
    Render(#[from] std::fmt::Error),
}
