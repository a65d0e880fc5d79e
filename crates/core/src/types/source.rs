//! Acquisition source tag attached to each registration.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Free-form tag identifying which form a registration came from
/// (e.g. `founders_register`).
///
/// Tags are trimmed and capped at [`RegistrationSource::MAX_LENGTH`]
/// characters. A missing or blank tag becomes [`RegistrationSource::UNSPECIFIED`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub struct RegistrationSource(String);

impl RegistrationSource {
    /// Maximum number of characters kept from a submitted tag.
    pub const MAX_LENGTH: usize = 64;

    /// Tag used when the client did not send one.
    pub const UNSPECIFIED: &'static str = "unspecified";

    /// Build a source tag from optional client input.
    #[must_use]
    pub fn from_input(raw: Option<&str>) -> Self {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return Self::unspecified();
        }
        Self(trimmed.chars().take(Self::MAX_LENGTH).collect())
    }

    /// The tag used when none was given.
    #[must_use]
    pub fn unspecified() -> Self {
        Self(Self::UNSPECIFIED.to_owned())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegistrationSource {
    fn default() -> Self {
        Self::unspecified()
    }
}

impl fmt::Display for RegistrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RegistrationSource {
    fn from(value: String) -> Self {
        Self::from_input(Some(&value))
    }
}

impl From<RegistrationSource> for String {
    fn from(source: RegistrationSource) -> Self {
        source.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input_trims() {
        let source = RegistrationSource::from_input(Some("  founders_register "));
        assert_eq!(source.as_str(), "founders_register");
    }

    #[test]
    fn test_missing_or_blank_is_unspecified() {
        assert_eq!(RegistrationSource::from_input(None).as_str(), "unspecified");
        assert_eq!(
            RegistrationSource::from_input(Some("   ")).as_str(),
            "unspecified"
        );
    }

    #[test]
    fn test_long_tags_are_truncated_on_char_boundary() {
        let raw = "é".repeat(100);
        let source = RegistrationSource::from_input(Some(&raw));
        assert_eq!(source.as_str().chars().count(), RegistrationSource::MAX_LENGTH);
    }
}
