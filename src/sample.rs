//! Sample guarded handler used by the worker binary.
//!
//! Fails with [`SampleError::Badaboom`] when asked to (`value == "fail"`),
//! unless the event carries a `startTime` more than 30 seconds in the past.
//! Replaying an old failing event therefore succeeds, which makes it easy to
//! watch a breaker trip, fail fast, and recover once it expires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::GuardError;

/// Breaker id guarding the sample handler.
pub const SAMPLE_BREAKER_ID: &str = "sample";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub value: String,
    /// When the event was first produced, as an ISO-8601 timestamp.
    #[serde(rename = "startTime", default)]
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub value: String,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Badaboom")]
    Badaboom,
}

/// Process one event.
pub async fn handle_event(input: InputEvent, now: i64) -> Result<OutputEvent, SampleError> {
    let recent = input
        .start_time
        .map_or(true, |start| now < start.timestamp().saturating_add(30));
    if recent && input.value == "fail" {
        return Err(SampleError::Badaboom);
    }
    Ok(OutputEvent { value: input.value })
}

/// One line of worker output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Ok { value: String },
    Open { breaker_id: String },
    Tripped { breaker_id: String, cause: String },
    Failed { error: String },
    StoreError { breaker_id: String, error: String },
}

impl Outcome {
    pub fn from_result(result: Result<OutputEvent, GuardError<SampleError>>) -> Self {
        match result {
            Ok(output) => Outcome::Ok {
                value: output.value,
            },
            Err(GuardError::Open { id }) => Outcome::Open { breaker_id: id },
            Err(GuardError::Tripped { id, cause }) => Outcome::Tripped {
                breaker_id: id,
                cause: cause.to_string(),
            },
            Err(GuardError::Operation(e)) => Outcome::Failed {
                error: e.to_string(),
            },
            Err(GuardError::Store { id, source }) => Outcome::StoreError {
                breaker_id: id,
                error: source.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(value: &str, start_time: Option<i64>) -> InputEvent {
        InputEvent {
            value: value.into(),
            start_time: start_time.map(|secs| DateTime::from_timestamp(secs, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_handle_event() {
        assert_eq!(
            handle_event(event("hello", None), 100).await.unwrap(),
            OutputEvent { value: "hello".into() }
        );
        assert!(handle_event(event("fail", None), 100).await.is_err());
        assert!(handle_event(event("fail", Some(90)), 100).await.is_err());
        // old events are replayed successfully
        assert!(handle_event(event("fail", Some(60)), 100).await.is_ok());
    }

    #[tokio::test]
    async fn test_handle_event_far_future_start() {
        let far = InputEvent {
            value: "fail".into(),
            start_time: Some(DateTime::<Utc>::MAX_UTC),
        };
        assert!(handle_event(far.clone(), 100).await.is_err());
        assert!(handle_event(far, i64::MAX).await.is_ok());
    }

    #[test]
    fn test_parse_event() {
        let parsed: InputEvent =
            serde_json::from_str(r#"{"value":"fail","startTime":"1970-01-01T00:00:42Z"}"#).unwrap();
        assert_eq!(parsed, event("fail", Some(42)));

        let parsed: InputEvent =
            serde_json::from_str(r#"{"value":"x","startTime":"2024-03-01T12:00:00.250+01:00"}"#)
                .unwrap();
        assert_eq!(parsed.start_time.unwrap().timestamp(), 1_709_290_800);

        let parsed: InputEvent = serde_json::from_str(r#"{"value":"x"}"#).unwrap();
        assert_eq!(parsed.start_time, None);

        assert!(serde_json::from_str::<InputEvent>(r#"{"value":"x","startTime":"yesterday"}"#).is_err());
    }

    #[test]
    fn test_outcome_json() {
        let outcome = Outcome::from_result(Err(GuardError::Tripped {
            id: SAMPLE_BREAKER_ID.into(),
            cause: SampleError::Badaboom,
        }));
        assert_eq!(
            serde_json::to_string(&outcome).unwrap(),
            r#"{"outcome":"tripped","breaker_id":"sample","cause":"Badaboom"}"#
        );
    }
}
