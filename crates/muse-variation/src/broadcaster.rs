// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fans a variation's event stream out to every subscribed SSE client.

use muse_core::EventEnvelope;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};

/// Per-subscriber queue depth. A slow client drops events rather than
/// backpressuring the generation pipeline.
const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

#[derive(Default)]
struct VariationStreams {
    subscribers: Vec<mpsc::Sender<EventEnvelope>>,
    history: Vec<EventEnvelope>,
}

/// Publishes [`EventEnvelope`]s for in-flight variations to any number of
/// concurrent SSE subscribers, replaying history for late joiners.
#[derive(Default)]
pub struct SSEBroadcaster {
    streams: Mutex<HashMap<String, VariationStreams>>,
}

impl SSEBroadcaster {
    /// An empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an envelope to every current subscriber of its variation,
    /// recording it in that variation's history. Returns how many
    /// subscribers actually received it; a subscriber with a full queue is
    /// skipped and logged rather than blocking the publisher.
    pub async fn publish(&self, envelope: EventEnvelope) -> usize {
        let mut streams = self.streams.lock().await;
        let entry = streams.entry(envelope.variation_id.clone()).or_default();
        entry.history.push(envelope.clone());

        let mut delivered = 0;
        for subscriber in &entry.subscribers {
            match subscriber.try_send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        variation_id = %envelope.variation_id,
                        "subscriber queue full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Subscribe to a variation's stream, replaying any buffered events
    /// with `sequence` strictly greater than `from_sequence`.
    pub async fn subscribe(
        &self,
        variation_id: &str,
        from_sequence: u64,
    ) -> mpsc::Receiver<EventEnvelope> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let mut streams = self.streams.lock().await;
        let entry = streams.entry(variation_id.to_string()).or_default();

        for envelope in entry.history.iter().filter(|e| e.sequence > from_sequence) {
            if tx.try_send(envelope.clone()).is_err() {
                break;
            }
        }
        entry.subscribers.push(tx);
        rx
    }

    /// Every buffered event for a variation, optionally filtered to
    /// sequences strictly greater than `from_sequence`.
    pub async fn get_history(&self, variation_id: &str, from_sequence: u64) -> Vec<EventEnvelope> {
        let streams = self.streams.lock().await;
        streams
            .get(variation_id)
            .map(|entry| {
                entry
                    .history
                    .iter()
                    .filter(|e| e.sequence > from_sequence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every subscriber of a variation's stream, ending their
    /// `Receiver`s, without discarding its history.
    pub async fn close_stream(&self, variation_id: &str) {
        let mut streams = self.streams.lock().await;
        if let Some(entry) = streams.get_mut(variation_id) {
            entry.subscribers.clear();
        }
    }

    /// Remove all data (subscribers and history) for a variation.
    pub async fn cleanup(&self, variation_id: &str) {
        self.streams.lock().await.remove(variation_id);
    }

    /// Remove every variation's data.
    pub async fn clear(&self) {
        self.streams.lock().await.clear();
    }

    /// Number of variations with at least one live subscriber.
    pub async fn active_streams(&self) -> usize {
        self.streams
            .lock()
            .await
            .values()
            .filter(|entry| !entry.subscribers.is_empty())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muse_core::EventPayload;

    fn envelope(variation_id: &str, sequence: u64) -> EventEnvelope {
        EventEnvelope::new(sequence, variation_id, "proj", "0", EventPayload::Heartbeat)
    }

    #[tokio::test]
    async fn publish_before_any_subscriber_is_buffered_in_history() {
        let broadcaster = SSEBroadcaster::new();
        broadcaster.publish(envelope("v1", 1)).await;
        let history = broadcaster.get_history("v1", 0).await;
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn subscribe_replays_history_after_from_sequence() {
        let broadcaster = SSEBroadcaster::new();
        broadcaster.publish(envelope("v1", 1)).await;
        broadcaster.publish(envelope("v1", 2)).await;
        broadcaster.publish(envelope("v1", 3)).await;

        let mut rx = broadcaster.subscribe("v1", 1).await;
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 2);
        assert_eq!(second.sequence, 3);
    }

    #[tokio::test]
    async fn publish_after_subscribe_is_delivered_live() {
        let broadcaster = SSEBroadcaster::new();
        let mut rx = broadcaster.subscribe("v1", 0).await;
        let delivered = broadcaster.publish(envelope("v1", 1)).await;
        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn close_stream_ends_subscriber_receivers() {
        let broadcaster = SSEBroadcaster::new();
        let mut rx = broadcaster.subscribe("v1", 0).await;
        broadcaster.close_stream("v1").await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cleanup_drops_history_and_subscribers() {
        let broadcaster = SSEBroadcaster::new();
        broadcaster.publish(envelope("v1", 1)).await;
        broadcaster.cleanup("v1").await;
        assert!(broadcaster.get_history("v1", 0).await.is_empty());
    }

    #[tokio::test]
    async fn active_streams_counts_variations_with_subscribers() {
        let broadcaster = SSEBroadcaster::new();
        assert_eq!(broadcaster.active_streams().await, 0);
        let _rx = broadcaster.subscribe("v1", 0).await;
        assert_eq!(broadcaster.active_streams().await, 1);
    }
}
