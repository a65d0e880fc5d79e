//! Pre-registration records.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{Email, RegistrationId, RegistrationSource};

/// A registration about to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPreRegistration {
    pub email: Email,
    pub source: RegistrationSource,
}

impl NewPreRegistration {
    #[must_use]
    pub const fn new(email: Email, source: RegistrationSource) -> Self {
        Self { email, source }
    }
}

/// A registration row as stored in `pre_reservations_list`.
///
/// Rows are created once and never updated; the store owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreRegistration {
    pub id: RegistrationId,
    pub email: Email,
    #[serde(default, deserialize_with = "nullable_source")]
    pub source: RegistrationSource,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Rows written without a tag carry `null` in the `source` column.
fn nullable_source<'de, D>(deserializer: D) -> Result<RegistrationSource, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(RegistrationSource::from_input(raw.as_deref()))
}

/// `timestamptz` columns carry an offset, `timestamp` columns do not; the
/// latter are read as UTC. Anything else is dropped rather than failing the row.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(stamp) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(stamp.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}
