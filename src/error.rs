use std::io;

/// The result type used throughout this crate's public API.
pub type Result<T> = std::result::Result<T, NetError>;

/// Unified error type for the reactor core and its async socket wrappers.
///
/// `Transient` (would-block / in-progress) and `Interrupted` conditions never
/// reach this type: they are handled internally at the point the OS result is
/// observed (see `crate::socket`). Everything a caller can actually see is
/// either a contract violation (`Logic`) or a failure the OS reported that
/// this crate cannot resolve on its own (`Runtime`).
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The caller violated an API contract: wrong-state object, off-loop-thread
    /// call to a loop-thread-only method, or an invalid argument.
    #[error("logic error: {message}")]
    Logic {
        /// Human-readable description of the violated contract.
        message: String,
    },

    /// The OS reported a failure this crate cannot resolve locally.
    #[error("runtime error: {message}")]
    Runtime {
        /// Human-readable description of the failure.
        message: String,
        /// The originating OS error, captured at the point it was observed.
        #[source]
        source: Option<io::Error>,
    },
}

impl NetError {
    /// Build a `Logic` error from a message.
    pub fn logic(message: impl Into<String>) -> NetError {
        NetError::Logic {
            message: message.into(),
        }
    }

    /// Build a `Runtime` error from a message and an `io::Error`.
    pub fn runtime(message: impl Into<String>, source: io::Error) -> NetError {
        NetError::Runtime {
            message: message.into(),
            source: Some(source),
        }
    }

    /// True if this is a `Logic` error.
    pub fn is_logic(&self) -> bool {
        matches!(self, NetError::Logic { .. })
    }

    /// True if this is a `Runtime` error.
    pub fn is_runtime(&self) -> bool {
        matches!(self, NetError::Runtime { .. })
    }
}

/// Classify an `io::Error` observed immediately after a failing syscall.
///
/// Would-block and interrupted conditions are never expected to reach this
/// conversion: callers of OS-facing helpers in `crate::socket` strip them
/// before an error value is constructed. If one slips through regardless it
/// is still reported as `Runtime` rather than panicking, since masking a bug
/// behind a crash is worse than a slightly mis-classified error.
impl From<io::Error> for NetError {
    fn from(err: io::Error) -> NetError {
        NetError::Runtime {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
