//! Errors returned by the buffer primitives.

use thiserror::Error;
use winnow::error::{ContextError, ErrMode, Needed};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer ended in the middle of a read
    ///
    /// `needed == 0` means the amount of missing bytes is unknown
    #[error("truncated input, {needed} more bytes required")]
    Truncated { needed: usize },

    /// Bytes are present but do not describe a valid structure
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The caller asked to stop the decode
    #[error("decoding was interrupted")]
    Interrupted,
}

impl BufferError {
    /// Returns `true` if the error was caused by running out of input
    #[inline]
    pub fn is_truncated(&self) -> bool {
        matches!(self, BufferError::Truncated { .. })
    }
}

impl From<ErrMode<ContextError>> for BufferError {
    fn from(err: ErrMode<ContextError>) -> Self {
        match err {
            ErrMode::Incomplete(Needed::Size(n)) => BufferError::Truncated { needed: n.get() },
            ErrMode::Incomplete(Needed::Unknown) => BufferError::Truncated { needed: 0 },
            ErrMode::Backtrack(e) | ErrMode::Cut(e) => BufferError::Malformed(e.to_string()),
        }
    }
}
