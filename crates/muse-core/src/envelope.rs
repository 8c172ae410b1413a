// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire envelope for the Variation Protocol's SSE event stream.
//!
//! Every event pushed to a subscriber is wrapped in an [`EventEnvelope`],
//! regardless of its payload kind. Consumers dispatch on `event` (the SSE
//! event name) and decode `data` against the matching payload type.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::variation::Phrase;

/// The `meta` payload, sent once as the first event of a variation stream.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetaPayload {
    /// Echoed variation ID.
    pub variation_id: String,
    /// Project this variation belongs to.
    pub project_id: String,
    /// State ID the variation was proposed against.
    pub base_state_id: String,
    /// The natural-language intent that was submitted.
    pub intent: String,
}

/// The `done` payload, sent once a variation reaches `ready`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    /// Total number of phrases generated.
    pub phrase_count: usize,
    /// Tracks touched across all phrases.
    pub affected_tracks: Vec<String>,
    /// Regions touched across all phrases.
    pub affected_regions: Vec<String>,
}

/// The `error` payload, sent once if generation fails.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// The payload carried by an [`EventEnvelope`]. The serialized `event` name
/// on the wire is the lowercase variant name (`meta`, `phrase`, `done`,
/// `error`, `heartbeat`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    /// Stream-opening metadata.
    Meta(MetaPayload),
    /// A generated phrase.
    Phrase(Box<Phrase>),
    /// Terminal success summary.
    Done(DonePayload),
    /// Terminal failure.
    Error(ErrorPayload),
    /// Idle keep-alive; carries no data.
    Heartbeat,
}

impl EventPayload {
    /// The SSE event name this payload should be sent under.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            EventPayload::Meta(_) => "meta",
            EventPayload::Phrase(_) => "phrase",
            EventPayload::Done(_) => "done",
            EventPayload::Error(_) => "error",
            EventPayload::Heartbeat => "heartbeat",
        }
    }
}

/// One event in a variation's SSE stream.
///
/// Envelopes are totally ordered by `sequence` within a single
/// `variation_id`; a subscriber resuming with `Last-Event-ID` asks for
/// everything strictly greater than the given sequence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Monotonically increasing sequence number, unique per variation.
    pub sequence: u64,
    /// The variation this event belongs to.
    pub variation_id: String,
    /// The project this event belongs to.
    pub project_id: String,
    /// The state ID the parent variation was proposed against.
    pub base_state_id: String,
    /// Wall-clock time the event was produced, in epoch milliseconds.
    pub timestamp_ms: i64,
    /// The event payload.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventEnvelope {
    /// Build a new envelope, stamping the current time.
    #[must_use]
    pub fn new(
        sequence: u64,
        variation_id: impl Into<String>,
        project_id: impl Into<String>,
        base_state_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            sequence,
            variation_id: variation_id.into(),
            project_id: project_id.into(),
            base_state_id: base_state_id.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
            payload,
        }
    }

    /// The SSE event name this envelope should be sent under.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        self.payload.event_name()
    }

    /// Render the envelope's payload as the `data:` field of an SSE frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be serialized to JSON.
    pub fn to_sse_data(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Timestamp as a `DateTime<Utc>`, for callers that want the richer type.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_ms).unwrap_or_else(Utc::now)
    }
}

/// Issues strictly increasing sequence numbers for a single variation's
/// event stream. Sequence `1` is reserved for the `meta` envelope.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    current: u64,
}

impl SequenceCounter {
    /// A fresh counter, positioned so the next call to [`Self::next`]
    /// returns `1`.
    #[must_use]
    pub fn new() -> Self {
        Self { current: 0 }
    }

    /// The last sequence number handed out, or `0` if none yet.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Advance and return the next sequence number.
    pub fn next(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    /// Reset the counter back to its initial state.
    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_counter_starts_at_one() {
        let mut c = SequenceCounter::new();
        assert_eq!(c.current(), 0);
        assert_eq!(c.next(), 1);
        assert_eq!(c.next(), 2);
        assert_eq!(c.current(), 2);
    }

    #[test]
    fn sequence_counter_resets() {
        let mut c = SequenceCounter::new();
        c.next();
        c.next();
        c.reset();
        assert_eq!(c.current(), 0);
        assert_eq!(c.next(), 1);
    }

    #[test]
    fn envelope_event_name_matches_payload() {
        let env = EventEnvelope::new(
            1,
            "v1",
            "p1",
            "s1",
            EventPayload::Meta(MetaPayload {
                variation_id: "v1".into(),
                project_id: "p1".into(),
                base_state_id: "s1".into(),
                intent: "add hats".into(),
            }),
        );
        assert_eq!(env.event_name(), "meta");
        let data = env.to_sse_data().unwrap();
        assert!(data.contains("\"sequence\":1"));
    }

    #[test]
    fn heartbeat_serializes_without_payload_field_error() {
        let env = EventEnvelope::new(5, "v1", "p1", "s1", EventPayload::Heartbeat);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event"], "heartbeat");
    }
}
