//! Store-assigned row identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a row in `pre_reservations_list`.
///
/// Assigned by the store, never chosen by callers outside tests. Tables may
/// key rows with a `bigint` identity or with a `uuid`/`text` column, so both
/// shapes are accepted and written back as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistrationId {
    Serial(i64),
    Key(String),
}

impl RegistrationId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self::Serial(id)
    }

    /// The numeric value, for serial keys.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Serial(id) => Some(*id),
            Self::Key(_) => None,
        }
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(id) => write!(f, "{id}"),
            Self::Key(key) => f.write_str(key),
        }
    }
}

impl From<i64> for RegistrationId {
    fn from(id: i64) -> Self {
        Self::Serial(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_round_trips_as_number() {
        let id = RegistrationId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<RegistrationId>("42").unwrap(), id);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_i64(), Some(42));
    }

    #[test]
    fn test_uuid_key_is_accepted() {
        let raw = "\"3f2b8c1e-6d4a-4c1b-9a7e-2f0d5b8c9e11\"";
        let id: RegistrationId = serde_json::from_str(raw).unwrap();
        assert_eq!(id.to_string(), "3f2b8c1e-6d4a-4c1b-9a7e-2f0d5b8c9e11");
        assert_eq!(id.as_i64(), None);
        assert_eq!(serde_json::to_string(&id).unwrap(), raw);
    }
}
