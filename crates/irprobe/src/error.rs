//! Error type for the IR export driver.

use irprobe_compiler::CompileError;
use irprobe_ir::IrError;
use irprobe_runtime::RuntimeError;

/// Broad classification of a [`DriverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Internal,
    NotFound,
    /// Raised by a collaborator and passed through unchanged.
    Propagated,
}

/// Errors returned by [`get_compiler_ir`](crate::get_compiler_ir).
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The function is not registered in the context's library.
    #[error("function '{0}' not found")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Ir(#[from] IrError),
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Compile(_) | Self::Runtime(_) | Self::Ir(_) => ErrorKind::Propagated,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(DriverError::NotFound("f".into()).kind(), ErrorKind::NotFound);
        assert_eq!(DriverError::internal("x").kind(), ErrorKind::Internal);
        let wrapped = DriverError::from(RuntimeError::PoisonedLock("v".into()));
        assert_eq!(wrapped.kind(), ErrorKind::Propagated);
        assert_eq!(wrapped.to_string(), "lock on variable 'v' is poisoned");
    }
}
