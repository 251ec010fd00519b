/// Errors that can occur while decoding a MessagePack payload.
///
/// Every variant carries the byte offset into the input where decoding
/// stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input ended before a complete value was read.
    #[error("truncated input at byte {offset} ({needed} more bytes needed)")]
    Truncated { offset: usize, needed: usize },

    /// The reserved marker byte `0xc1` was found.
    #[error("reserved marker 0xc1 at byte {offset}")]
    ReservedMarker { offset: usize },

    /// A string value is not valid UTF-8.
    #[error("invalid UTF-8 in string at byte {offset}")]
    InvalidUtf8 { offset: usize },

    /// A map key is not a string.
    #[error("map key at byte {offset} is not a string")]
    NonStringKey { offset: usize },

    /// Extension types have no representation in the value model.
    #[error("unsupported extension type {type_id} at byte {offset}")]
    UnsupportedExtension { offset: usize, type_id: i8 },

    /// Containers are nested deeper than the decoder allows.
    #[error("nesting deeper than {max} levels at byte {offset}")]
    DepthLimit { offset: usize, max: usize },

    /// Bytes remain after one complete top-level value.
    #[error("{remaining} trailing bytes after value at byte {offset}")]
    TrailingBytes { offset: usize, remaining: usize },
}

impl DecodeError {
    /// Byte offset into the input where decoding failed.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::ReservedMarker { offset }
            | DecodeError::InvalidUtf8 { offset }
            | DecodeError::NonStringKey { offset }
            | DecodeError::UnsupportedExtension { offset, .. }
            | DecodeError::DepthLimit { offset, .. }
            | DecodeError::TrailingBytes { offset, .. } => *offset,
        }
    }
}

/// Errors that can occur while encoding a value.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The serializer rejected the value (e.g. an integer outside the
    /// 64-bit signed/unsigned range).
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
