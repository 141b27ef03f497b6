//! # Error Definitions
//!
//! Failures of the wire layer. None of these are fatal to a connection; each one
//! belongs to the single encode or decode operation that produced it.

/// Wire encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An extension payload did not match any accepted integer shape.
    MalformedExtension(Vec<u8>),
    /// The wire value was not the type the caller asked for.
    TypeMismatch { expected: String, found: String },
    /// The message envelope was structurally wrong (bad kind, arity, field type).
    ProtocolViolation(String),
    /// The underlying MessagePack decoder failed.
    Decode(String),
    /// The underlying MessagePack encoder failed.
    Encode(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedExtension(bytes) => {
                write!(f, "malformed extension payload: ")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {}", msg),
            Self::Decode(msg) => write!(f, "decode error: {}", msg),
            Self::Encode(msg) => write!(f, "encode error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch { expected: expected.into(), found: found.into() }
    }
}

/// A specialized Result type for wire operations.
pub type Result<T> = std::result::Result<T, Error>;
