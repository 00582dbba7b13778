//! Rupiah display formatting.
//!
//! Renders amounts the way Indonesian locale formatting does for IDR with no
//! fraction digits: `Rp` followed by a no-break space, then the amount rounded
//! half away from zero and grouped in thousands with `.`.
//! `75000` renders as `Rp 75.000` (the space being U+00A0).

use crate::payload::Amount;

const NO_BREAK_SPACE: char = '\u{a0}';

/// Formats `amount` for display to a payer, e.g. `Rp 1.250.000`.
pub fn format_idr(amount: Amount) -> String {
    let digits = format!("{:.0}", amount.value().round());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 3);
    out.push_str("Rp");
    out.push(NO_BREAK_SPACE);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}
