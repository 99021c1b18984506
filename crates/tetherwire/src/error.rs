//! Wire-level errors.

/// Errors produced while inspecting values and frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A value did not have the kind the caller asked for.
    TypeMismatch { expected: &'static str, found: &'static str },
    /// A frame arrived where the other shape was expected.
    ProtocolViolation(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
