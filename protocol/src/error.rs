//! Error types for payload generation and charge-link decoding.
//!
//! Three enums, one per concern:
//!
//! - [`TlvError`]: structural problems in a TLV string or field.
//! - [`QrisError`]: setup problems handed to the amount injector (bad
//!   template, bad amount, bad key). These are developer-facing.
//! - [`TokenError`]: reasons a charge link failed to decode. These are
//!   user-facing and always resolve to a "link not valid" screen.

use thiserror::Error;

/// Structural errors raised while parsing or building TLV fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    /// The two-character length prefix is not a decimal number.
    #[error("invalid length {digits:?} for tag {tag:?} at offset {offset}")]
    InvalidLength {
        /// Byte offset of the field header.
        offset: usize,
        /// Tag of the field whose length is malformed.
        tag: String,
        /// The offending length characters.
        digits: String,
    },

    /// A field declares more characters than the input has left.
    #[error("tag {tag:?} at offset {offset} declares {declared} characters, {available} available")]
    Truncated {
        /// Byte offset of the field header.
        offset: usize,
        /// Tag of the truncated field.
        tag: String,
        /// Declared value length.
        declared: usize,
        /// Characters actually remaining after the header.
        available: usize,
    },

    /// Between one and three characters remain, too few for a field header.
    #[error("trailing fragment {fragment:?} at offset {offset}")]
    TrailingData {
        /// Byte offset where the fragment starts.
        offset: usize,
        /// The leftover characters.
        fragment: String,
    },

    /// A tag is not exactly two decimal digits.
    #[error("invalid tag {0:?}: expected two decimal digits")]
    InvalidTag(String),

    /// A value does not fit a two-digit length prefix.
    #[error("value for tag {tag} is {length} characters, maximum is 99")]
    ValueTooLong {
        /// Tag of the oversized field.
        tag: String,
        /// Length of the rejected value.
        length: usize,
    },
}

/// Errors raised by the amount injector and codec construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QrisError {
    /// No static payload was supplied. Nothing can be generated without one.
    #[error("static QRIS template is missing or empty")]
    InvalidTemplate,

    /// The static payload is not a well-formed TLV string.
    #[error("static QRIS template is malformed: {0}")]
    MalformedTemplate(#[from] TlvError),

    /// The amount cannot be written into the amount field.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The token obfuscation key is empty.
    #[error("obfuscation key must not be empty")]
    InvalidObfuscationKey,
}

/// Reasons a charge token could not be decoded.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token is not valid base64url.
    #[error("token is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The de-obfuscated bytes are not UTF-8.
    #[error("token does not decode to UTF-8 text: {0}")]
    Text(#[from] std::string::FromUtf8Error),

    /// The text is not a JSON charge object.
    #[error("token does not contain a charge object: {0}")]
    Structure(#[from] serde_json::Error),

    /// The charge object carries no amount.
    #[error("charge has no amount")]
    MissingAmount,

    /// The amount is present but is not a JSON number.
    #[error("charge amount is not a number")]
    NonNumericAmount,

    /// The amount is zero or negative.
    #[error("charge amount must be positive, got {0}")]
    NonPositiveAmount(f64),

    /// The amount is positive but cannot be carried in a payload.
    #[error("charge amount rejected: {0}")]
    InvalidAmount(String),
}
