//! Error types for the runtime collaborators.

/// Errors raised by tensors, the function library and resource storage.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A tensor's values do not match its shape or data type.
    #[error("invalid tensor: {0}")]
    InvalidTensor(String),

    /// A function with the same name is already registered.
    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),

    /// A resource variable does not exist.
    #[error("resource '{container}/{name}' not found on device {device}")]
    ResourceNotFound {
        device: String,
        container: String,
        name: String,
    },

    /// A resource handle points at a different device.
    #[error("resource '{name}' lives on {expected}, not {actual}")]
    WrongDevice {
        name: String,
        expected: String,
        actual: String,
    },

    /// A tensor expected to hold a resource handle holds values.
    #[error("input {index} is not a resource handle")]
    NotAResource { index: usize },

    /// A variable's lock was poisoned by a panicking holder.
    #[error("lock on variable '{0}' is poisoned")]
    PoisonedLock(String),
}
