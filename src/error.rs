/// Errors produced while decoding a box tree.
///
/// Only [`ParseError::Io`] coming from the source itself is fatal for a whole
/// decode pass; the other variants are absorbed by the tree builder and turn
/// into a shortened child list or a damaged box.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated read at {offset:#x}: wanted {wanted} bytes, {available} available")]
    TruncatedRead {
        offset: u64,
        wanted: u64,
        available: u64,
    },

    #[error("malformed header at {offset:#x}: {reason}")]
    MalformedHeader { offset: u64, reason: String },

    #[error("invalid payload at {offset:#x}: {reason}")]
    InvalidData { offset: u64, reason: String },
}

impl ParseError {
    /// True for errors that describe the input rather than the source.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ParseError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
