//! # CRC-16/CCITT-FALSE
//!
//! The integrity code every QRIS payload ends with. Polynomial `0x1021`,
//! register seeded with `0xFFFF`, processed MSB-first, no input or output
//! reflection and no final XOR.
//!
//! The payer's app recomputes this over the scanned text and refuses the
//! code on mismatch, so one wrong bit here means "QR tidak valid" on every
//! phone in the country.

use crate::config::{CRC_INIT, CRC_POLYNOMIAL};

/// Compute the raw 16-bit checksum of `data`.
///
/// # Example
///
/// ```
/// use qris_protocol::crc::checksum;
///
/// assert_eq!(checksum(b"123456789"), 0x29B1);
/// ```
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(CRC_INIT, |register, &byte| {
        let mut register = register ^ (u16::from(byte) << 8);
        for _ in 0..8 {
            register = if register & 0x8000 != 0 {
                (register << 1) ^ CRC_POLYNOMIAL
            } else {
                register << 1
            };
        }
        register
    })
}

/// Compute the checksum of `data` rendered as the 4-character uppercase,
/// zero-padded hex string that goes into the CRC field.
///
/// # Example
///
/// ```
/// use qris_protocol::crc::compute;
///
/// assert_eq!(compute(b"123456789"), "29B1");
/// ```
pub fn compute(data: &[u8]) -> String {
    format!("{:04X}", checksum(data))
}
