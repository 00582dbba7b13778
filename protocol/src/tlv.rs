//! # TLV Codec
//!
//! QRIS payloads are a flat run of `tag || length || value` fields where the
//! tag is two digits, the length is two zero-padded decimal digits, and the
//! value is exactly that many characters:
//!
//! ```text
//!   00 02 01   01 02 11   58 02 ID   59 17 WARUNG KOPI SENJA   63 04 1304
//!   └┬┘└┬┘└┬┘  ...
//!   tag len value
//! ```
//!
//! Nested templates (tag `26` merchant account info, for instance) are just
//! values that happen to be TLV strings themselves. This codec treats them as
//! opaque; nobody downstream needs to look inside.
//!
//! ## Strict and lenient parsing
//!
//! [`parse`] rejects anything it cannot account for: a length that is not
//! two digits, a value running off the end, a dangling 1–3 character tail.
//! [`parse_lenient`] reads input the way the first web generator did. Its
//! length prefix follows `parseInt` rules: leading whitespace and a sign are
//! skipped and a digit prefix counts (`"1X"` is 1, `"+2"` is 2). A length
//! with no digits at all yields the field with an empty value and ends the
//! parse. A short final value is kept as-is and a dangling tail is ignored.
//! A negative length ends the parse without a field; the web generator
//! never terminated on those. New code wants [`parse`].
//!
//! Lengths count characters, not bytes. For the ASCII the standard mandates
//! these are the same; for anything else, slicing never splits a character.

use std::fmt;
use std::str::FromStr;

use crate::config::{FIELD_HEADER_LENGTH, LENGTH_DIGITS, MAX_VALUE_LENGTH, TAG_LENGTH};
use crate::error::TlvError;

// ---------------------------------------------------------------------------
// TlvField
// ---------------------------------------------------------------------------

/// A single `tag || length || value` field.
///
/// The length prefix is never stored. It is derived from the value whenever
/// the field is serialized, so it cannot disagree with the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TlvField {
    tag: String,
    value: String,
}

impl TlvField {
    /// Creates a field, checking the tag is two decimal digits and the value
    /// fits a two-digit length prefix.
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Result<Self, TlvError> {
        let tag = tag.into();
        let value = value.into();

        if tag.len() != TAG_LENGTH || !tag.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TlvError::InvalidTag(tag));
        }
        let length = value.chars().count();
        if length > MAX_VALUE_LENGTH {
            return Err(TlvError::ValueTooLong { tag, length });
        }

        Ok(Self { tag, value })
    }

    /// Builds a field from parts the caller has already validated.
    pub(crate) fn from_parts(tag: &str, value: &str) -> Self {
        Self {
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }

    /// The two-digit tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The field value, without tag or length prefix.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Character length of the value, i.e. the number in the length prefix.
    pub fn value_len(&self) -> usize {
        self.value.chars().count()
    }

    /// Appends the serialized field to `out`.
    fn write_to(&self, out: &mut String) {
        out.push_str(&self.tag);
        out.push_str(&format!("{:0width$}", self.value_len(), width = LENGTH_DIGITS));
        out.push_str(&self.value);
    }
}

impl fmt::Display for TlvField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}{}",
            self.tag,
            self.value_len(),
            self.value,
            width = LENGTH_DIGITS
        )
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// An ordered list of TLV fields.
///
/// Order is significant: the CRC field must come last, and payer apps are
/// known to be picky about the payload format indicator coming first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    fields: Vec<TlvField>,
}

impl Payload {
    /// An empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing field list.
    pub fn from_fields(fields: Vec<TlvField>) -> Self {
        Self { fields }
    }

    /// The fields in payload order.
    pub fn fields(&self) -> &[TlvField] {
        &self.fields
    }

    /// Consumes the payload, returning its fields.
    pub fn into_fields(self) -> Vec<TlvField> {
        self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the payload has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the fields in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TlvField> {
        self.fields.iter()
    }

    /// The first field with `tag`, if any.
    pub fn get(&self, tag: &str) -> Option<&TlvField> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Number of fields carrying `tag`.
    pub fn count(&self, tag: &str) -> usize {
        self.fields.iter().filter(|f| f.tag == tag).count()
    }

    /// Appends a field at the end.
    pub fn push(&mut self, field: TlvField) {
        self.fields.push(field);
    }

    /// Replaces the first field with the same tag in place, or appends the
    /// field if no such tag exists.
    pub fn upsert(&mut self, field: TlvField) {
        match self.fields.iter_mut().find(|f| f.tag == field.tag) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Validating shorthand for `upsert(TlvField::new(tag, value)?)`.
    pub fn set(&mut self, tag: &str, value: &str) -> Result<(), TlvError> {
        self.upsert(TlvField::new(tag, value)?);
        Ok(())
    }

    /// Removes every field with `tag`, returning how many were removed.
    pub fn remove(&mut self, tag: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| f.tag != tag);
        before - self.fields.len()
    }

    /// Serializes the payload. See [`serialize`].
    pub fn serialize(&self) -> String {
        serialize(&self.fields)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl FromStr for Payload {
    type Err = TlvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = &'a TlvField;
    type IntoIter = std::slice::Iter<'a, TlvField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for Payload {
    type Item = TlvField;
    type IntoIter = std::vec::IntoIter<TlvField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<TlvField> for Payload {
    fn from_iter<I: IntoIterator<Item = TlvField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses a TLV string, failing on the first structural problem.
///
/// # Errors
///
/// - [`TlvError::InvalidTag`] if a tag is not two digits.
/// - [`TlvError::InvalidLength`] if a length prefix is not two digits.
/// - [`TlvError::Truncated`] if a value runs past the end of input.
/// - [`TlvError::TrailingData`] if 1–3 characters are left over.
///
/// # Example
///
/// ```
/// use qris_protocol::tlv::parse;
///
/// let payload = parse("000201010211").unwrap();
/// assert_eq!(payload.len(), 2);
/// assert_eq!(payload.get("01").unwrap().value(), "11");
/// ```
pub fn parse(payload: &str) -> Result<Payload, TlvError> {
    let scan = scan(payload, Mode::Strict);
    if let Some(tag) = scan.fields.iter().map(TlvField::tag).find(|t| !is_numeric_tag(t)) {
        return Err(TlvError::InvalidTag(tag.to_string()));
    }
    match scan.stopped {
        Some(err) => Err(err),
        None => Ok(Payload::from_fields(scan.fields)),
    }
}

/// Parses a TLV string the permissive way: whatever could be read before the
/// first problem is returned and the remainder is discarded.
///
/// A value that runs past the end of input is kept with the characters
/// available. See the module docs for how length prefixes are read. A
/// warning is logged whenever input is dropped.
pub fn parse_lenient(payload: &str) -> Payload {
    let scan = scan(payload, Mode::Lenient);
    if let Some(err) = &scan.stopped {
        tracing::warn!(
            error = %err,
            fields_read = scan.fields.len(),
            "lenient TLV parse discarded malformed input"
        );
    }
    Payload::from_fields(scan.fields)
}

/// Serializes fields in order as `tag || length || value` with no separators.
///
/// Purely structural: a CRC field in `fields` is written like any other and
/// nothing is computed.
pub fn serialize(fields: &[TlvField]) -> String {
    let capacity = fields
        .iter()
        .map(|f| f.value.len() + FIELD_HEADER_LENGTH)
        .sum();
    let mut out = String::with_capacity(capacity);
    for field in fields {
        field.write_to(&mut out);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Strict,
    Lenient,
}

/// How a length prefix read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    Valid(usize),
    NotANumber,
    Negative,
}

/// Fields read before scanning stopped, and why it stopped early (if it did).
struct Scan {
    fields: Vec<TlvField>,
    stopped: Option<TlvError>,
}

/// Walks the input once, left to right. Every iteration either consumes at
/// least one field header or returns, so termination is guaranteed.
fn scan(payload: &str, mode: Mode) -> Scan {
    let mut fields = Vec::new();
    let mut rest = payload;
    let mut offset = 0;

    while !rest.is_empty() {
        let header = split_chars(rest, TAG_LENGTH).and_then(|(tag, after)| {
            split_chars(after, LENGTH_DIGITS).map(|(digits, body)| (tag, digits, body))
        });
        let Some((tag, digits, body)) = header else {
            return Scan {
                fields,
                stopped: Some(TlvError::TrailingData {
                    offset,
                    fragment: rest.to_string(),
                }),
            };
        };

        let declared = match declared_length(digits, mode) {
            Length::Valid(n) => n,
            invalid => {
                if mode == Mode::Lenient && invalid == Length::NotANumber {
                    fields.push(TlvField::from_parts(tag, ""));
                }
                return Scan {
                    fields,
                    stopped: Some(TlvError::InvalidLength {
                        offset,
                        tag: tag.to_string(),
                        digits: digits.to_string(),
                    }),
                };
            }
        };

        match split_chars(body, declared) {
            Some((value, next)) => {
                fields.push(TlvField::from_parts(tag, value));
                offset += tag.len() + digits.len() + value.len();
                rest = next;
            }
            None => {
                fields.push(TlvField::from_parts(tag, body));
                return Scan {
                    fields,
                    stopped: Some(TlvError::Truncated {
                        offset,
                        tag: tag.to_string(),
                        declared,
                        available: body.chars().count(),
                    }),
                };
            }
        }
    }

    Scan {
        fields,
        stopped: None,
    }
}

/// Splits `s` after its first `n` characters, or `None` if it is shorter.
fn split_chars(s: &str, n: usize) -> Option<(&str, &str)> {
    let index = s
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(n)?;
    Some(s.split_at(index))
}

/// Parses a length prefix. Only plain decimal digits are accepted: no sign,
/// no whitespace.
fn parse_length(digits: &str) -> Option<usize> {
    if digits.len() == LENGTH_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

fn declared_length(digits: &str, mode: Mode) -> Length {
    match mode {
        Mode::Strict => parse_length(digits).map_or(Length::NotANumber, Length::Valid),
        Mode::Lenient => match parse_int_prefix(digits) {
            None => Length::NotANumber,
            Some(n) if n < 0 => Length::Negative,
            Some(n) => Length::Valid(n.unsigned_abs() as usize),
        },
    }
}

/// `Number.parseInt(s, 10)`: optional leading whitespace, optional sign, then
/// as many decimal digits as there are. `None` when there are none.
fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let n: i64 = unsigned[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}

fn is_numeric_tag(tag: &str) -> bool {
    tag.len() == TAG_LENGTH && tag.bytes().all(|b| b.is_ascii_digit())
}
