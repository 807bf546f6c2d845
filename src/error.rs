use thiserror::Error;

/// Decoder failure kinds.
///
/// Every parse-level failure carries the byte offset, relative to the start
/// of the buffer handed to the decoder, at which it was detected. Decoding
/// is fatal per image: callers either get a complete pixel buffer or one of
/// these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("bad magic at byte {offset}: {reason}")]
    BadMagic { offset: usize, reason: &'static str },

    #[error("truncated input at byte {offset}")]
    Truncated { offset: usize },

    #[error("malformed data at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    #[error("unsupported feature at byte {offset}: {reason}")]
    Unsupported { offset: usize, reason: &'static str },

    #[error("arithmetic decoder ran off the end of its segment at byte {offset}")]
    Arithmetic { offset: usize },

    #[error("no Huffman code matches the input at byte {offset}")]
    Huffman { offset: usize },

    #[error("resource limit exceeded: {reason}")]
    ResourceExceeded { reason: &'static str },
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: &'static str) -> Self {
        Error::Malformed { offset, reason }
    }

    pub(crate) fn unsupported(offset: usize, reason: &'static str) -> Self {
        Error::Unsupported { offset, reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
