//! # Charge-Link Tokens
//!
//! A charge link (`https://host/c/<token>`) carries everything needed to
//! rebuild a dynamic QRIS code on the payer's side: the amount, an optional
//! note, and optionally when the charge was created. The token is
//!
//! ```text
//!   base64url_nopad( json_bytes XOR cycle(key) )
//! ```
//!
//! where the JSON is a compact object with single-letter keys:
//! `{"a":75000,"n":"Kopi susu","t":1760400000000}` (`t` in epoch milliseconds).
//!
//! ## This is not cryptography
//!
//! XOR with a short fixed key keeps the amount from being readable at a
//! glance in a chat preview. Anyone holding one link and its amount can
//! recover the key. There is no integrity check either: a tampered token
//! decodes to whatever it decodes to. The key is passed to [`TokenCodec::new`]
//! explicitly so every call site shows what it is relying on.

use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::DEFAULT_OBFUSCATION_KEY;
use crate::error::{QrisError, TokenError};
use crate::payload::Amount;

/// URL-safe alphabet, no padding on encode. Decoding accepts padded and
/// unpadded input and tolerates non-zero trailing bits the way browser
/// `atob` does, so tokens minted by the web client always decode.
const LINK_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Largest integer an IEEE double represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ---------------------------------------------------------------------------
// ObfuscationKey
// ---------------------------------------------------------------------------

/// The XOR key tokens are obfuscated with. Any non-empty byte string.
///
/// ASCII keys produce the same tokens as the existing web client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationKey(Vec<u8>);

impl ObfuscationKey {
    /// Wraps `key`, rejecting the empty key.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, QrisError> {
        let key = key.into();
        if key.is_empty() {
            return Err(QrisError::InvalidObfuscationKey);
        }
        Ok(Self(key))
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// XORs `data` in place with the key, cycling by byte index.
    /// Applying it twice is the identity.
    fn apply(&self, data: &mut [u8]) {
        for (byte, k) in data.iter_mut().zip(self.0.iter().cycle()) {
            *byte ^= k;
        }
    }
}

impl Default for ObfuscationKey {
    fn default() -> Self {
        Self(DEFAULT_OBFUSCATION_KEY.as_bytes().to_vec())
    }
}

impl FromStr for ObfuscationKey {
    type Err = QrisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// ChargeRecord
// ---------------------------------------------------------------------------

/// The parameters a charge link carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRecord {
    /// Amount to charge, in rupiah.
    pub amount: Amount,
    /// Free-text note shown to the payer. Never `Some("")`.
    pub note: Option<String>,
    /// When the charge was created, at millisecond precision.
    pub created_at: Option<DateTime<Utc>>,
}

impl ChargeRecord {
    /// A record with only an amount.
    pub fn new(amount: Amount) -> Self {
        Self {
            amount,
            note: None,
            created_at: None,
        }
    }

    /// Sets the note. An empty or whitespace-only note clears it.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        self.note = if note.trim().is_empty() {
            None
        } else {
            Some(note)
        };
        self
    }

    /// Sets the creation time, truncated to whole milliseconds so that
    /// encoding and decoding give back an equal record.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        let millis = created_at.timestamp_millis();
        self.created_at = Some(DateTime::from_timestamp_millis(millis).unwrap_or(created_at));
        self
    }
}

// ---------------------------------------------------------------------------
// TokenCodec
// ---------------------------------------------------------------------------

/// Incoming wire shape. Every key is optional and untyped at this layer: a
/// bad amount rejects the token, a bad note or timestamp is only dropped.
#[derive(Deserialize)]
struct WireCharge {
    #[serde(default)]
    a: Option<Value>,
    #[serde(default)]
    n: Option<Value>,
    #[serde(default)]
    t: Option<Value>,
}

/// Encodes and decodes charge-link tokens under a fixed key.
#[derive(Debug, Clone, Default)]
pub struct TokenCodec {
    key: ObfuscationKey,
}

impl TokenCodec {
    /// A codec using `key`.
    pub fn new(key: ObfuscationKey) -> Self {
        Self { key }
    }

    /// The key this codec obfuscates with.
    pub fn key(&self) -> &ObfuscationKey {
        &self.key
    }

    /// Encodes `record` into a URL-safe token.
    ///
    /// # Example
    ///
    /// ```
    /// use qris_protocol::payload::Amount;
    /// use qris_protocol::token::{ChargeRecord, TokenCodec};
    ///
    /// let codec = TokenCodec::default();
    /// let record = ChargeRecord::new(Amount::new(75000.0).unwrap());
    /// assert_eq!(codec.encode(&record), "GlgHEAoFAFFKVk8");
    /// ```
    pub fn encode(&self, record: &ChargeRecord) -> String {
        let mut bytes = charge_json(record).into_bytes();
        self.key.apply(&mut bytes);
        LINK_ENGINE.encode(bytes)
    }

    /// Decodes a token back into a record.
    ///
    /// Never panics: every malformed input maps to a [`TokenError`], which
    /// callers render as "link not valid".
    pub fn decode(&self, token: &str) -> Result<ChargeRecord, TokenError> {
        let mut bytes = LINK_ENGINE.decode(token)?;
        self.key.apply(&mut bytes);
        let text = String::from_utf8(bytes)?;
        let value: Value = serde_json::from_str(&text)?;
        if !value.is_object() {
            return Err(TokenError::Structure(serde::de::Error::custom(
                "expected a JSON object",
            )));
        }
        let wire: WireCharge = serde_json::from_value(value)?;

        let amount = wire
            .a
            .ok_or(TokenError::MissingAmount)?
            .as_f64()
            .ok_or(TokenError::NonNumericAmount)?;
        if amount <= 0.0 {
            return Err(TokenError::NonPositiveAmount(amount));
        }
        let amount = Amount::new(amount).map_err(|e| TokenError::InvalidAmount(e.to_string()))?;

        let mut record = ChargeRecord::new(amount);
        if let Some(Value::String(note)) = wire.n {
            record = record.with_note(note);
        }
        record.created_at = wire.t.as_ref().and_then(created_at_from_wire);
        Ok(record)
    }
}

/// The creation time carried in `t`, if it is usable.
///
/// A fractional value is truncated to whole milliseconds. Zero, non-numbers
/// and values outside chrono's range yield `None`.
fn created_at_from_wire(t: &Value) -> Option<DateTime<Utc>> {
    let ms = match t.as_i64() {
        Some(ms) => ms,
        None => {
            let ms = t.as_f64()?.trunc();
            if ms.abs() > MAX_SAFE_INTEGER {
                return None;
            }
            ms as i64
        }
    };
    if ms == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
}

/// Compact JSON for `record`, keys in the web client's `a`, `n`, `t` order.
fn charge_json(record: &ChargeRecord) -> String {
    let mut json = format!("{{\"a\":{}", amount_json(record.amount.value()));
    if let Some(note) = &record.note {
        json.push_str(",\"n\":");
        json.push_str(&Value::from(note.as_str()).to_string());
    }
    if let Some(created_at) = record.created_at {
        json.push_str(&format!(",\"t\":{}", created_at.timestamp_millis()));
    }
    json.push('}');
    json
}

/// The amount as `JSON.stringify` writes a number.
///
/// Whole amounts are plain digits up to 10^21 (`75000`, not `75000.0`, and
/// `100000000000000000000`, not `1e20`), then `1e+21` style. Fractional
/// amounts use the shortest round-trip form, which both sides share.
fn amount_json(amount: f64) -> String {
    if amount.fract() != 0.0 {
        return Value::from(amount).to_string();
    }

    // Shortest round-trip digits, e.g. "1.152921504606847e18".
    let scientific = format!("{:e}", amount);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return Value::from(amount).to_string();
    };
    let Ok(exponent) = exponent.parse::<usize>() else {
        return Value::from(amount).to_string();
    };

    if exponent < 21 {
        let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
        let zeros = (exponent + 1).saturating_sub(digits.len());
        format!("{}{}", digits, "0".repeat(zeros))
    } else {
        format!("{}e+{}", mantissa, exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(v: f64) -> Amount {
        Amount::new(v).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_encode_matches_web_client_tokens() {
        let codec = TokenCodec::default();
        assert_eq!(codec.encode(&ChargeRecord::new(amount(75000.0))), "GlgHEAoFAFFKVk8");

        let full = ChargeRecord::new(amount(75000.0))
            .with_note("Kopi susu")
            .with_created_at(at(1_760_400_000_000));
        assert_eq!(
            codec.encode(&full),
            "GlgHEAoFAFFKVh4SXBdbWC1dQFsVEg8VRxIeFxVYXAMHBAVVSlYCAAIFUUob"
        );
    }

    #[test]
    fn test_fractional_amount_is_written_as_float() {
        let codec = TokenCodec::default();
        assert_eq!(codec.encode(&ChargeRecord::new(amount(12500.5))), "GlgHEAoDB1RKVhwFTw");
    }

    #[test]
    fn test_round_trip_every_optional_combination() {
        let codec = TokenCodec::default();
        let base = ChargeRecord::new(amount(150000.0));
        let records = [
            base.clone(),
            base.clone().with_note("Iuran arisan"),
            base.clone().with_created_at(at(1_700_000_000_123)),
            base.with_note("Patungan kado").with_created_at(at(1_760_400_000_000)),
        ];
        for record in records {
            let token = codec.encode(&record);
            assert_eq!(codec.decode(&token).unwrap(), record);
        }
    }

    #[test]
    fn test_round_trip_unicode_note() {
        let codec = TokenCodec::default();
        let record = ChargeRecord::new(amount(1500.0)).with_note("Nasi goreng 🍛");
        let token = codec.encode(&record);
        assert_eq!(token, "GlgHEAoDAFFKShBeEA9DNAdBWRJSDggDXFcSxf73_RBN");
        assert_eq!(codec.decode(&token).unwrap(), record);
    }

    #[test]
    fn test_created_at_is_truncated_to_millis() {
        let precise = at(1_700_000_000_123) + chrono::Duration::microseconds(456);
        let record = ChargeRecord::new(amount(1.0)).with_created_at(precise);
        assert_eq!(record.created_at, Some(at(1_700_000_000_123)));
    }

    #[test]
    fn test_empty_note_is_dropped() {
        let record = ChargeRecord::new(amount(5000.0)).with_note("  ");
        assert!(record.note.is_none());
        assert_eq!(TokenCodec::default().encode(&record), "GlgHEAoHBVFKGw");
    }

    #[test]
    fn test_decode_accepts_padding() {
        let codec = TokenCodec::default();
        assert_eq!(codec.decode("GlgHEAoFAFFKVk8=").unwrap().amount.value(), 75000.0);
    }

    #[test]
    fn test_decode_ignores_unknown_and_null_keys() {
        let codec = TokenCodec::default();
        // {"a":75000,"zz":1}
        let record = codec.decode("GlgHEAoFAFFKVh4SSE9DQFdP").unwrap();
        assert_eq!(record, ChargeRecord::new(amount(75000.0)));
        // {"a":75000,"n":null}
        let record = codec.decode("GlgHEAoFAFFKVh4SXBdbFBNeXE8").unwrap();
        assert!(record.note.is_none());
    }

    #[test]
    fn test_decode_truncates_fractional_timestamp() {
        // {"a":5000,"t":1760400000000.5}
        let record = TokenCodec::default()
            .decode("GlgHEAoHBVFKShBEEA9QTVACBAIFUUpWAgACG1QH")
            .unwrap();
        assert_eq!(record.amount.value(), 5000.0);
        assert_eq!(record.created_at, Some(at(1_760_400_000_000)));
    }

    #[test]
    fn test_decode_drops_unusable_timestamps() {
        let codec = TokenCodec::default();
        // {"a":5000,"t":0}, {"a":5000,"t":"kemarin"}
        for token in ["GlgHEAoHBVFKShBEEA9RBw", "GlgHEAoHBVFKShBEEA9DEQNfUUBcD1gb"] {
            let record = codec.decode(token).unwrap();
            assert_eq!(record, ChargeRecord::new(amount(5000.0)), "{token}");
        }
        assert_eq!(created_at_from_wire(&Value::from(1e300)), None);
        assert_eq!(created_at_from_wire(&Value::from(i64::MAX)), None);
    }

    #[test]
    fn test_decode_drops_non_string_note() {
        // {"a":5000,"n":42}
        let record = TokenCodec::default().decode("GlgHEAoHBVFKShBeEA9VSBs").unwrap();
        assert_eq!(record, ChargeRecord::new(amount(5000.0)));
    }

    #[test]
    fn test_note_is_json_escaped() {
        let record = ChargeRecord::new(amount(5000.0)).with_note("Kopi \"susu\"");
        let token = TokenCodec::default().encode(&record);
        assert_eq!(token, "GlgHEAoHBVFKShBeEA9DMQlCWRJpQwkTQUVuF0MH");
        assert_eq!(TokenCodec::default().decode(&token).unwrap(), record);
    }

    #[test]
    fn test_large_whole_amounts_are_written_like_json_stringify() {
        assert_eq!(amount_json(75000.0), "75000");
        assert_eq!(amount_json(1.0), "1");
        assert_eq!(amount_json(1e20), "100000000000000000000");
        assert_eq!(amount_json(2f64.powi(60)), "1152921504606847000");
        assert_eq!(amount_json(1e21), "1e+21");
        assert_eq!(amount_json(12500.5), "12500.5");

        let codec = TokenCodec::default();
        let record = ChargeRecord::new(amount(1e20));
        let token = codec.encode(&record);
        assert_eq!(token, "GlgHEAoDBVFKVgIAAgVRSlYCAAIFUUpWAgBP");
        assert_eq!(codec.decode(&token).unwrap(), record);
        assert_eq!(
            codec.encode(&ChargeRecord::new(amount(2f64.powi(60)))),
            "GlgHEAoDBFRIXwABBwVVTFYECAYCUUpWTw"
        );
        assert_eq!(codec.encode(&ChargeRecord::new(amount(1e21))), "GlgHEAoDUEpIV08");
    }

    #[test]
    fn test_decode_rejects_empty_token() {
        assert!(matches!(
            TokenCodec::default().decode(""),
            Err(TokenError::Structure(_))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let codec = TokenCodec::default();
        for bad in ["not base64!", "GlgH+AoF", "G", "Glg=HEAo"] {
            assert!(matches!(codec.decode(bad), Err(TokenError::Encoding(_))), "{bad}");
        }
    }

    #[test]
    fn test_decode_rejects_bad_amounts() {
        let codec = TokenCodec::default();
        // {"a":0}
        assert!(matches!(codec.decode("GlgHEAoCSA"), Err(TokenError::NonPositiveAmount(v)) if v == 0.0));
        // {"a":-5}
        assert!(matches!(codec.decode("GlgHEAofABw"), Err(TokenError::NonPositiveAmount(v)) if v == -5.0));
        // {"n":"x"}
        assert!(matches!(codec.decode("GlgIEAoQTUMH"), Err(TokenError::MissingAmount)));
        // {"a":"75000"}
        assert!(matches!(codec.decode("GlgHEAoQAlRKVgISTw"), Err(TokenError::NonNumericAmount)));
    }

    #[test]
    fn test_decode_rejects_non_object_json() {
        // [1,2]
        assert!(matches!(
            TokenCodec::default().decode("OktKAG0"),
            Err(TokenError::Structure(_))
        ));
    }

    #[test]
    fn test_decode_rejects_array_even_if_shaped_like_a_charge() {
        // [75000]
        assert!(matches!(
            TokenCodec::default().decode("Ok1TAgACaA"),
            Err(TokenError::Structure(_))
        ));
    }

    #[test]
    fn test_wrong_key_does_not_decode() {
        let other = TokenCodec::new(ObfuscationKey::new("other-key").unwrap());
        assert!(other.decode("GlgHEAoFAFFKVk8").is_err());
    }

    #[test]
    fn test_custom_key_round_trip() {
        let codec = TokenCodec::new("merchant-key".parse().unwrap());
        let record = ChargeRecord::new(amount(75000.0));
        let token = codec.encode(&record);
        assert_eq!(token, "FkcTQVJWW0QdWxg");
        assert_eq!(codec.decode(&token).unwrap(), record);
        assert!(TokenCodec::default().decode(&token).is_err());
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert_eq!(ObfuscationKey::new(""), Err(QrisError::InvalidObfuscationKey));
        assert_eq!(ObfuscationKey::default().as_bytes(), b"azf2025");
    }

    #[test]
    fn test_decode_never_panics_on_garbage() {
        let codec = TokenCodec::default();
        for token in ["-", "__", "AAAA", "____", "////", "GlgHEAoFAFFKVk8GlgHEAoFAFFKVk8"] {
            let _ = codec.decode(token);
        }
    }
}
