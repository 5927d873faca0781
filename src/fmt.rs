//! Debug formatting helpers for [`custom_debug_derive`].

use std::fmt;

/// Characters of a secret kept visible in [`redacted`] output.
const VISIBLE_PREFIX: usize = 4;

/// Shows only the first few characters of a secret, e.g. `"22R1***"`.
///
/// Use with `#[debug(with = crate::fmt::redacted)]` on credential fields.
pub fn redacted<T: AsRef<str>>(value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "\"{}\"", mask(value.as_ref()))
}

/// Masked rendition of `secret` for logs.
pub fn mask(secret: &str) -> String {
    let prefix: String = secret.chars().take(VISIBLE_PREFIX).collect();
    format!("{prefix}***")
}
