//! Protocol message name normalization.
//!
//! Registration and injection accept message names in the camelCase form
//! older module code uses (`cChatMessage`) as well as the canonical
//! UPPER_SNAKE_CASE wire names (`C_CHAT_MESSAGE`). Everything is folded to
//! the canonical form before the codec lookup.

/// The wildcard message name matching every dispatched packet.
pub const WILDCARD: &str = "*";

/// Normalize a message name to its canonical UPPER_SNAKE_CASE form.
///
/// The wildcard and any name already containing an underscore pass through
/// unchanged. One legacy message breaks the camelCase convention and is
/// special-cased by literal name.
pub fn normalize_name(name: &str) -> String {
    if name == "sF2pPremiumUserPeriodic" {
        return "S_F2P_PremiumUser_Periodic".to_string();
    }
    if name == WILDCARD || name.contains('_') {
        return name.to_string();
    }

    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
        }
        for upper in ch.to_uppercase() {
            out.push(upper);
        }
    }
    out
}
