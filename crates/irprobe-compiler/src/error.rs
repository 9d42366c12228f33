use irprobe_ir::IrError;

/// Errors reported by lowering and by the compiler client.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The number of arguments does not match the function's arity.
    #[error("function '{function}' takes {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// An argument does not match its declaration in the signature.
    #[error("argument {index} ('{name}'): {reason}")]
    InvalidArgument {
        index: usize,
        name: String,
        reason: String,
    },

    /// The op has no lowering.
    #[error("node '{node}': unsupported op '{op}'")]
    UnsupportedOp { node: String, op: String },

    /// An input names neither an argument nor an earlier node.
    #[error("node '{node}': unknown input '{input}'")]
    UnknownInput { node: String, input: String },

    /// Operand types, shapes or attributes are invalid for the op.
    #[error("node '{node}': {message}")]
    InvalidNode { node: String, message: String },

    /// A variable is read before any value was assigned to it.
    #[error("resource '{0}' is read before it is initialized")]
    UninitializedResource(String),

    /// A function output is missing or has the wrong type.
    #[error("output '{output}': {message}")]
    InvalidOutput { output: String, message: String },

    #[error("invalid device ordinal {ordinal}: client has {count} device(s)")]
    InvalidDeviceOrdinal { ordinal: i32, count: i32 },

    /// Argument or result layouts do not match the program.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    #[error(transparent)]
    Ir(#[from] IrError),
}

impl CompileError {
    pub(crate) fn node(node: &str, message: impl Into<String>) -> Self {
        Self::InvalidNode {
            node: node.to_string(),
            message: message.into(),
        }
    }
}
