//! # Error Definitions
//!
//! Every way a call into the host can fail. Errors are `Clone` because one
//! connection failure is delivered to every call pending at that moment.

use nvwire::Value;

use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The connection failed. Every pending call receives a copy.
    Transport(TransportError),
    /// A message or result could not be encoded or decoded.
    Wire(nvwire::Error),
    /// The host raised an exception while running the method.
    Exception { method: String, detail: String },
    /// The host rejected the arguments.
    Validation { method: String, detail: String },
    /// The host returned an error value of unrecognized shape.
    Remote { method: String, value: Value },
    /// More than one call of a pipeline failed.
    Batch(ErrorList),
    /// The peer has already shut down.
    Closed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Wire(e) => write!(f, "Wire error: {}", e),
            Self::Exception { method, detail } => write!(f, "nvim:{} exception: {}", method, detail),
            Self::Validation { method, detail } => write!(f, "nvim:{} validation: {}", method, detail),
            Self::Remote { method, value } => write!(f, "nvim:{} error: {}", method, value),
            Self::Batch(list) => write!(f, "{}", list),
            Self::Closed => write!(f, "Peer closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<nvwire::Error> for Error {
    fn from(e: nvwire::Error) -> Self {
        Self::Wire(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The failures of one pipeline cycle. Always holds at least two.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    /// Collapses the failures of a cycle: `None` if there were none, the error
    /// itself if there was one, a `Batch` otherwise.
    pub(crate) fn collapse(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Batch(Self(errors))),
        }
    }

    pub fn first(&self) -> &Error {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.0
    }
}

impl std::fmt::Display for ErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (and {} other errors)", self.first(), self.0.len() - 1)
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
