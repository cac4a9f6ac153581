//! View-update bus between the orchestration core and whichever renderer is attached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

pub mod topics;

/// One view update. `seq` increases by one per publish on a bus, so a renderer can
/// order updates and notice the ones it lagged past.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Envelope {
    pub seq: u64,
    /// RFC3339, millisecond precision.
    pub time: String,
    pub topic: String,
    pub payload: Value,
}

#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Envelope>,
    seq: Arc<AtomicU64>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish `payload` under `topic`. Unserializable payloads are replaced by an
    /// error marker; with no renderer attached the update is dropped.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = serde_json::to_value(payload)
            .unwrap_or_else(|err| serde_json::json!({ "unserializable": err.to_string() }));
        let _ = self.tx.send(Envelope {
            seq,
            time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            topic: topic.to_string(),
            payload,
        });
        seq
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_envelopes() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(topics::TOPIC_STATUS, &json!({"message": "hello"}));
        let env = rx.recv().await.expect("envelope");
        assert_eq!(env.seq, 1);
        assert_eq!(env.topic, topics::TOPIC_STATUS);
        assert_eq!(env.payload["message"], "hello");
        assert!(env.time.ends_with('Z'));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = Bus::new(1);
        assert_eq!(bus.receiver_count(), 0);
        assert_eq!(bus.publish(topics::TOPIC_PLAN_CHANGED, &json!({})), 1);
        let clone = bus.clone();
        assert_eq!(clone.publish(topics::TOPIC_PLAN_CHANGED, &json!({})), 2);
    }
}
