use thiserror::Error;

/// Errors raised while encoding or decoding UE2 wire data.
///
/// Every failure is local to one encode/decode attempt; nothing in the codec
/// panics on malformed input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before a field was complete.
    #[error("truncated input: needed {needed} bytes, only {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A color escape was not followed by three color bytes inside the text.
    #[error("invalid color escape at byte {offset}")]
    InvalidEscape { offset: usize },

    /// A length prefix exceeds what the codec is willing to allocate.
    #[error("length {length} out of range (limit {limit})")]
    LengthOutOfRange { length: i64, limit: usize },

    /// An index magnitude does not fit in 27 bits.
    #[error("index value {value} exceeds the 27-bit range")]
    IndexOutOfRange { value: i64 },

    /// The value has no representation on the wire.
    #[error("cannot encode {ch:?}: {reason}")]
    Unencodable { ch: char, reason: &'static str },
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
