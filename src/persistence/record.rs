//! Persisted breaker state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a breaker:
/// - `Open`: calls are skipped until the record expires
/// - `Closed`: calls pass through (no record, or an expired one)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Open,
    Closed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "OPEN",
            Status::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is neither `OPEN` nor `CLOSED`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown breaker status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Status::Open),
            "CLOSED" => Ok(Status::Closed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The persisted unit of breaker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Breaker id (logical key of the guarded operation).
    pub id: String,
    pub status: Status,
    /// Epoch second after which the record no longer holds the breaker open.
    ///
    /// `0` means the record never expires. Normal operation never writes it;
    /// backends may also use this field for native TTL housekeeping, but
    /// expiry is always evaluated at read time.
    pub expiry: i64,
    /// Best-effort diagnostic text of the failure that opened the breaker.
    pub cause: Option<String>,
}

impl StatusRecord {
    /// Build an OPEN record.
    pub fn open(id: impl Into<String>, expiry: i64, cause: Option<String>) -> Self {
        Self {
            id: id.into(),
            status: Status::Open,
            expiry,
            cause,
        }
    }

    /// Check if the record is expired as of `now` (epoch seconds).
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry != 0 && now > self.expiry
    }

    /// The status a reader observes at `now`: expired records read as closed.
    pub fn effective_status(&self, now: i64) -> Status {
        if self.is_expired(now) {
            Status::Closed
        } else {
            self.status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_is_lazy_and_strict() {
        let record = StatusRecord::open("svc", 1_000, None);

        assert!(!record.is_expired(999));
        // still open in the expiry second itself
        assert!(!record.is_expired(1_000));
        assert!(record.is_expired(1_001));
        assert_eq!(record.effective_status(1_000), Status::Open);
        assert_eq!(record.effective_status(1_001), Status::Closed);
    }

    #[test]
    fn test_zero_expiry_never_expires() {
        let record = StatusRecord::open("svc", 0, Some("boom".into()));
        assert!(!record.is_expired(i64::MAX));
        assert_eq!(record.effective_status(i64::MAX), Status::Open);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(Status::Open.to_string(), "OPEN");
        assert_eq!("CLOSED".parse::<Status>().unwrap(), Status::Closed);
        assert_eq!(
            "HALF_OPEN".parse::<Status>().unwrap_err(),
            UnknownStatus("HALF_OPEN".into())
        );
    }
}
