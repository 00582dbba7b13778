// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # QRIS Protocol: Core Library
//!
//! Everything needed to turn a merchant's static QRIS sticker into a dynamic
//! charge, and to carry that charge around in a link.
//!
//! A static QRIS payload has no amount; the payer types one in. A dynamic
//! payload has field `54` filled in and a fresh CRC, so the payer's app shows
//! the amount pre-filled and read-only. Generating one is pure string
//! surgery on the merchant's existing payload, no acquirer involved.
//!
//! ## Architecture
//!
//! - **crc**: CRC-16/CCITT-FALSE, the mandatory checksum of tag `63`.
//! - **tlv**: Tag–length–value parsing and serialization.
//! - **payload**: Amount injection and checksum verification.
//! - **token**: The obfuscated charge-link token codec.
//! - **display**: Rupiah formatting for humans.
//! - **config**: Tags, lengths, and the other constants of the format.
//!
//! ```text
//!   static payload ─► tlv::parse ─► set 54, drop 63 ─► tlv::serialize
//!                                                    ─► + "6304" ─► crc ─► dynamic payload
//!
//!   ChargeRecord ─► token::encode ─► /c/<token> ─► token::decode ─► ChargeRecord
//! ```
//!
//! ## Design Philosophy
//!
//! 1. One code path per job. There is no regex "quick patch" next to the
//!    structural rebuild; there is only the structural rebuild.
//! 2. Pure functions. No globals, no caches, no clocks. Everything here is
//!    safe to call from any thread at any time.
//! 3. The token codec is obfuscation, and says so in its types.

pub mod config;
pub mod crc;
pub mod display;
pub mod error;
pub mod payload;
pub mod tlv;
pub mod token;

pub use display::format_idr;
pub use error::{QrisError, TlvError, TokenError};
pub use payload::{set_amount, verify_checksum, Amount, DynamicPayloadBuilder};
pub use tlv::{Payload, TlvField};
pub use token::{ChargeRecord, ObfuscationKey, TokenCodec};
