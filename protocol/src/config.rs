//! # Payload Configuration & Constants
//!
//! Every magic string of the QRIS merchant-presented format lives here. The
//! tag numbers come from the EMVCo QR specification that QRIS profiles; the
//! checksum parameters are the CRC-16/CCITT-FALSE variant the standard
//! mandates for tag `63`.
//!
//! Changing any of these after merchants have printed stickers is not an
//! option, so they are plain `const`s rather than runtime configuration.

// ---------------------------------------------------------------------------
// TLV Layout
// ---------------------------------------------------------------------------

/// Characters in a field tag. Tags are two decimal digits, `"00"` to `"99"`.
pub const TAG_LENGTH: usize = 2;

/// Characters in the declared-length prefix of every field.
pub const LENGTH_DIGITS: usize = 2;

/// Tag plus length prefix. A field can never be shorter than this.
pub const FIELD_HEADER_LENGTH: usize = TAG_LENGTH + LENGTH_DIGITS;

/// Largest value a two-digit length prefix can declare.
pub const MAX_VALUE_LENGTH: usize = 99;

// ---------------------------------------------------------------------------
// Well-known Tags
// ---------------------------------------------------------------------------

/// Transaction amount. Absent on static codes; the payer types it in.
pub const TAG_TRANSACTION_AMOUNT: &str = "54";

/// Merchant name as shown in the payer's app.
pub const TAG_MERCHANT_NAME: &str = "59";

/// Merchant city.
pub const TAG_MERCHANT_CITY: &str = "60";

/// CRC field. Must be the last field of the payload.
pub const TAG_CRC: &str = "63";

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// CRC-16/CCITT-FALSE initial register value.
pub const CRC_INIT: u16 = 0xFFFF;

/// CRC-16/CCITT-FALSE generator polynomial (x^16 + x^12 + x^5 + 1).
pub const CRC_POLYNOMIAL: u16 = 0x1021;

/// Hex characters in the CRC field value.
pub const CRC_VALUE_LENGTH: usize = 4;

/// Tag and declared length of the CRC field. The checksum covers the
/// payload up to and including this header, but not its own value.
pub const CRC_HEADER: &str = "6304";

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Fractional digits rendered in the amount field (`75000` -> `75000.00`).
pub const AMOUNT_FRACTION_DIGITS: usize = 2;

// ---------------------------------------------------------------------------
// Charge Links
// ---------------------------------------------------------------------------

/// Obfuscation key used by charge links minted before keys became
/// configurable. Links in the wild were produced with this value.
///
/// This is NOT a secret. XOR against a seven byte key hides the amount from
/// a casual glance at the URL and nothing more.
pub const DEFAULT_OBFUSCATION_KEY: &str = "azf2025";

/// Path prefix under which charge tokens are embedded in shareable links.
pub const CHARGE_LINK_PREFIX: &str = "/c/";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_header_matches_tag_and_length() {
        assert_eq!(
            CRC_HEADER,
            format!("{}{:02}", TAG_CRC, CRC_VALUE_LENGTH).as_str()
        );
    }

    #[test]
    fn test_header_length_fits_two_digit_lengths() {
        assert_eq!(FIELD_HEADER_LENGTH, 4);
        assert_eq!(MAX_VALUE_LENGTH, 10usize.pow(LENGTH_DIGITS as u32) - 1);
    }

    #[test]
    fn test_tags_are_two_digits() {
        for tag in [
            TAG_TRANSACTION_AMOUNT,
            TAG_MERCHANT_NAME,
            TAG_MERCHANT_CITY,
            TAG_CRC,
        ] {
            assert_eq!(tag.len(), TAG_LENGTH);
            assert!(tag.bytes().all(|b| b.is_ascii_digit()), "bad tag {tag}");
        }
    }

    #[test]
    fn test_default_key_is_non_empty_ascii() {
        assert!(!DEFAULT_OBFUSCATION_KEY.is_empty());
        assert!(DEFAULT_OBFUSCATION_KEY.is_ascii());
    }
}
