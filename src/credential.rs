use crate::fmt::mask;

/// A roll number, used by the portal as both username and password.
#[derive(custom_debug_derive::Debug, Clone, PartialEq, Eq)]
pub struct Credential(#[debug(with = crate::fmt::redacted)] String);

impl Credential {
    /// Trims surrounding whitespace; `None` when nothing is left.
    pub fn new(roll_number: impl AsRef<str>) -> Option<Self> {
        let trimmed = roll_number.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Form suitable for log fields.
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}
