//! # Dynamic Payload Generation
//!
//! Turns a merchant's static QRIS payload into a dynamic one carrying a
//! fixed amount. There is exactly one way to do this and it is structural:
//!
//! 1. Parse the template into fields.
//! 2. Drop every CRC (`63`) field.
//! 3. Replace the amount (`54`) field in place, or append one.
//! 4. Serialize, append the CRC header `6304`.
//! 5. CRC the string from step 4 and append the four hex digits.
//!
//! The checksum covers its own header but not its own value. That is what
//! the standard says and what every payer app verifies, so step 4 must
//! happen before step 5, byte for byte.

use std::fmt;

use crate::config::{
    AMOUNT_FRACTION_DIGITS, CRC_HEADER, CRC_VALUE_LENGTH, MAX_VALUE_LENGTH, TAG_CRC,
    TAG_MERCHANT_CITY, TAG_MERCHANT_NAME, TAG_TRANSACTION_AMOUNT,
};
use crate::crc;
use crate::error::QrisError;
use crate::tlv::{self, Payload, TlvField};

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A transaction amount that can be written into field `54`.
///
/// Guaranteed finite, strictly positive, non-zero at two decimal places, and
/// short enough for a two-digit length prefix.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(f64);

impl Amount {
    /// Validates `value` as a payload amount.
    ///
    /// # Errors
    ///
    /// [`QrisError::InvalidAmount`] if the value is NaN or infinite, not
    /// strictly positive, rounds to `0.00`, or renders longer than 99
    /// characters.
    pub fn new(value: f64) -> Result<Self, QrisError> {
        if !value.is_finite() {
            return Err(QrisError::InvalidAmount(format!(
                "{value} is not a finite number"
            )));
        }
        if value <= 0.0 {
            return Err(QrisError::InvalidAmount(format!(
                "{value} is not strictly positive"
            )));
        }

        let rendered = Self(value).to_field_value();
        if rendered.len() > MAX_VALUE_LENGTH {
            return Err(QrisError::InvalidAmount(format!(
                "{} characters do not fit a TLV field",
                rendered.len()
            )));
        }
        if rendered.bytes().all(|b| b == b'0' || b == b'.') {
            return Err(QrisError::InvalidAmount(format!(
                "{value} rounds to {rendered}"
            )));
        }

        Ok(Self(value))
    }

    /// The raw value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// The value as it appears in the amount field: fixed point, two
    /// fractional digits (`75000` -> `"75000.00"`).
    ///
    /// An exact tie rounds up (`0.125` -> `"0.13"`), as `Number.toFixed`
    /// does. Everything else rounds to nearest on the exact binary value.
    pub fn to_field_value(&self) -> String {
        let value = if is_exact_cent_tie(self.0) {
            (self.0 * CENTS).ceil() / CENTS
        } else {
            self.0
        };
        format!("{:.*}", AMOUNT_FRACTION_DIGITS, value)
    }

    /// The complete amount field.
    pub fn to_field(&self) -> TlvField {
        TlvField::from_parts(TAG_TRANSACTION_AMOUNT, &self.to_field_value())
    }
}

const CENTS: f64 = 100.0;

/// Above this, `value * 100` may no longer be exact.
const EXACT_CENTS_LIMIT: f64 = (1u64 << 46) as f64;

/// True when `value` sits exactly halfway between two cents.
///
/// A double halfway between cents is a multiple of 1/8 (`x.125`, `x.375`,
/// ...). Scaling by 8 is exact, and for such multiples below the limit so is
/// scaling by 100.
fn is_exact_cent_tie(value: f64) -> bool {
    value.abs() < EXACT_CENTS_LIMIT
        && (value * 8.0).fract() == 0.0
        && (value * CENTS).fract().abs() == 0.5
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field_value())
    }
}

impl TryFrom<f64> for Amount {
    type Error = QrisError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// DynamicPayloadBuilder
// ---------------------------------------------------------------------------

/// A static template, parsed and validated once, that stamps out dynamic
/// payloads for any number of amounts.
///
/// Holds no mutable state: share it behind an `Arc` and call
/// [`build`](Self::build) from as many threads as you like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicPayloadBuilder {
    /// Template fields with every CRC field already removed.
    fields: Payload,
}

impl DynamicPayloadBuilder {
    /// Parses `template` strictly and strips its CRC.
    ///
    /// # Errors
    ///
    /// - [`QrisError::InvalidTemplate`] if the template is empty or blank.
    /// - [`QrisError::MalformedTemplate`] if it is not well-formed TLV.
    pub fn new(template: &str) -> Result<Self, QrisError> {
        let template = template.trim();
        if template.is_empty() {
            return Err(QrisError::InvalidTemplate);
        }

        let mut fields = tlv::parse(template)?;
        let removed = fields.remove(TAG_CRC);
        tracing::debug!(
            fields = fields.len(),
            crc_fields_removed = removed,
            has_amount = fields.get(TAG_TRANSACTION_AMOUNT).is_some(),
            "QRIS template loaded"
        );

        Ok(Self { fields })
    }

    /// The template fields, CRC excluded.
    pub fn template(&self) -> &Payload {
        &self.fields
    }

    /// Merchant name (field `59`), as the payer's app will show it.
    pub fn merchant_name(&self) -> Option<&str> {
        self.fields.get(TAG_MERCHANT_NAME).map(TlvField::value)
    }

    /// Merchant city (field `60`).
    pub fn merchant_city(&self) -> Option<&str> {
        self.fields.get(TAG_MERCHANT_CITY).map(TlvField::value)
    }

    /// Builds the dynamic payload for `amount`.
    pub fn build(&self, amount: Amount) -> String {
        let mut fields = self.fields.clone();
        fields.upsert(amount.to_field());
        let sealed = seal(&fields);
        tracing::debug!(amount = %amount, len = sealed.len(), "dynamic payload built");
        sealed
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Returns `template` with its amount set to `amount` and a fresh CRC.
///
/// Calling it again on its own output with the same amount returns the same
/// string: the old CRC is dropped, the amount field is replaced in place.
///
/// # Errors
///
/// - [`QrisError::InvalidTemplate`] if `template` is empty.
/// - [`QrisError::InvalidAmount`] if `amount` is not a valid payload amount.
/// - [`QrisError::MalformedTemplate`] if `template` is not well-formed TLV.
///
/// # Example
///
/// ```
/// use qris_protocol::payload::{set_amount, verify_checksum};
///
/// let dynamic = set_amount("0002015802ID6304ABCD", 75000.0).unwrap();
/// assert!(dynamic.starts_with("0002015802ID540875000.006304"));
/// assert!(verify_checksum(&dynamic));
/// ```
pub fn set_amount(template: &str, amount: f64) -> Result<String, QrisError> {
    if template.trim().is_empty() {
        return Err(QrisError::InvalidTemplate);
    }
    let amount = Amount::new(amount)?;
    Ok(DynamicPayloadBuilder::new(template)?.build(amount))
}

/// Serializes `fields` and appends the CRC header plus its checksum.
///
/// `fields` must not already contain a CRC field.
fn seal(fields: &Payload) -> String {
    let mut out = fields.serialize();
    out.reserve(CRC_HEADER.len() + CRC_VALUE_LENGTH);
    out.push_str(CRC_HEADER);
    let checksum = crc::compute(out.as_bytes());
    out.push_str(&checksum);
    out
}

/// Returns `true` if `payload` ends in a CRC field whose value matches the
/// checksum of everything before it (header included).
///
/// Hex digits are compared case-insensitively; some generators in the wild
/// emit lowercase.
pub fn verify_checksum(payload: &str) -> bool {
    let Some(split) = payload.len().checked_sub(CRC_VALUE_LENGTH) else {
        return false;
    };
    if !payload.is_char_boundary(split) {
        return false;
    }
    let (covered, stated) = payload.split_at(split);
    covered.ends_with(CRC_HEADER)
        && stated.eq_ignore_ascii_case(&crc::compute(covered.as_bytes()))
}
