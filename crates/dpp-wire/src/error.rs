//! Errors produced while decoding or encoding wire frames.

use thiserror::Error;

/// Result alias used throughout the codec.
pub type WireResult<T> = std::result::Result<T, WireError>;

/// Everything that can go wrong turning bytes into a [`crate::Message`] or back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer does not yet hold a full frame for the declared message type.
    #[error("incomplete frame: need {needed} bytes, have {have}")]
    Incomplete {
        /// Bytes required to finish decoding the current frame.
        needed: usize,
        /// Bytes actually available in the buffer.
        have: usize,
    },

    /// The leading type byte does not name a known message.
    #[error("unknown message type: {0:#04x}")]
    UnknownType(u8),

    /// A fixed-length field carried a length that does not match its declared type.
    #[error("bad message length for {type_name}: expected {expected}, got {actual}")]
    BadLength {
        /// Name of the message type being decoded.
        type_name: &'static str,
        /// Length the message type requires.
        expected: usize,
        /// Length actually present.
        actual: usize,
    },

    /// An enumerated field held a value outside its known discriminants.
    #[error("unknown {field} discriminant: {value}")]
    BadDiscriminant {
        /// Name of the field being decoded.
        field: &'static str,
        /// The raw value that did not match any known variant.
        value: u32,
    },
}
