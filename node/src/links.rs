//! Charge link URLs.
//!
//! A link is `{origin}/c/{token}`. The payer's side only ever needs the token,
//! so parsing is forgiving about what surrounds it.

use qris_protocol::config::CHARGE_LINK_PREFIX;

/// Builds the shareable link for `token` on `origin`.
pub fn charge_link(origin: &str, token: &str) -> String {
    format!(
        "{}{}{}",
        origin.trim_end_matches('/'),
        CHARGE_LINK_PREFIX,
        token
    )
}

/// Extracts the token from a full link, or returns the input unchanged when
/// it is already a bare token.
///
/// Anything after the token (`?query`, `#fragment`, a trailing slash) is
/// dropped.
pub fn token_from_link(input: &str) -> &str {
    let input = input.trim();
    let token = match input.rfind(CHARGE_LINK_PREFIX) {
        Some(i) => &input[i + CHARGE_LINK_PREFIX.len()..],
        None => input,
    };
    token
        .split(|c| c == '?' || c == '#' || c == '/')
        .next()
        .unwrap_or(token)
}
