//! Active App Publisher
//!
//! Collects the ids of applications that served traffic and periodically
//! publishes them, as a zlib-compressed JSON array, on the control channel.
//!
//! Producers write into the accumulating set. A flush swaps that set out for
//! an empty one and hands the old contents to a background task, so `add`
//! never waits on serialization, compression or the network.

use crate::domain::ports::{ControlChannel, ACTIVE_APPS_SUBJECT};
use crate::infrastructure::periodic::spawn_periodic;
use crate::infrastructure::shutdown::ShutdownController;
use bytes::Bytes;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Double-buffered set of recently active application ids.
pub struct ActiveAppPublisher {
    accumulating: Mutex<HashSet<String>>,
    flushing: AtomicBool,
    channel: Arc<dyn ControlChannel>,
}

impl ActiveAppPublisher {
    pub fn new(channel: Arc<dyn ControlChannel>) -> Self {
        Self {
            accumulating: Mutex::new(HashSet::new()),
            flushing: AtomicBool::new(false),
            channel,
        }
    }

    /// Mark an application as active since the last flush.
    pub fn add(&self, app_id: &str) {
        let mut apps = self.accumulating.lock();
        if !apps.contains(app_id) {
            apps.insert(app_id.to_string());
        }
    }

    /// Number of ids waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.accumulating.lock().len()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Swap out the accumulated ids and publish them in the background.
    ///
    /// Returns `None` without touching anything when a previous flush is still
    /// in flight; those ids simply go out with a later flush.
    pub fn flush(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.flushing.swap(true, Ordering::AcqRel) {
            tracing::debug!("active apps flush already in progress, skipping");
            return None;
        }

        let batch = std::mem::take(&mut *self.accumulating.lock());
        let publisher = self.clone();

        Some(tokio::spawn(async move {
            let _guard = FlushGuard(&publisher.flushing);
            publisher.publish(batch).await;
        }))
    }

    /// Flush on a fixed interval until shutdown.
    pub fn start(self: Arc<Self>, interval: Duration, shutdown: &ShutdownController) -> JoinHandle<()> {
        spawn_periodic("active-apps", interval, shutdown, move || {
            self.flush();
        })
    }

    async fn publish(&self, batch: HashSet<String>) {
        let size = batch.len();
        let payload = match tokio::task::spawn_blocking(move || encode_batch(&batch)).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                tracing::warn!("failed to encode active apps: {}", e);
                return;
            }
            Err(e) => {
                tracing::warn!("active apps encoder task failed: {}", e);
                return;
            }
        };

        tracing::info!(
            "flushing active apps, app size: {}, msg size: {}",
            size,
            payload.len()
        );

        if let Err(e) = self.channel.publish(ACTIVE_APPS_SUBJECT, payload).await {
            tracing::warn!("failed to publish active apps: {}", e);
        }
    }
}

/// Clears the in-flight flag however the flush task ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serialize app ids as a JSON array and zlib-deflate it.
pub fn encode_batch(apps: &HashSet<String>) -> std::io::Result<Bytes> {
    let mut ids: Vec<&str> = apps.iter().map(String::as_str).collect();
    ids.sort_unstable();
    let json = serde_json::to_vec(&ids)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(Bytes::from(encoder.finish()?))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::ports::ChannelError;
    use async_trait::async_trait;
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    use tokio::sync::Notify;

    /// Records publishes; holds each one until released when gated.
    #[derive(Default)]
    struct RecordingChannel {
        published: Mutex<Vec<(String, Bytes)>>,
        gate: Option<Notify>,
    }

    impl RecordingChannel {
        fn gated() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                gate: Some(Notify::new()),
            }
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn batches(&self) -> Vec<HashSet<String>> {
            self.published
                .lock()
                .iter()
                .map(|(_, payload)| decode(payload))
                .collect()
        }
    }

    #[async_trait]
    impl ControlChannel for RecordingChannel {
        fn is_reconnecting(&self) -> bool {
            false
        }

        async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), ChannelError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.published.lock().push((subject.to_string(), payload));
            Ok(())
        }
    }

    fn decode(payload: &[u8]) -> HashSet<String> {
        let mut json = String::new();
        ZlibDecoder::new(payload).read_to_string(&mut json).unwrap();
        serde_json::from_str::<Vec<String>>(&json).unwrap().into_iter().collect()
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_encode_batch_round_trips_through_zlib() {
        let payload = encode_batch(&set(&["b", "a"])).unwrap();
        assert_eq!(decode(&payload), set(&["a", "b"]));
    }

    #[test]
    fn test_add_deduplicates() {
        let publisher = ActiveAppPublisher::new(Arc::new(RecordingChannel::default()));
        publisher.add("1");
        publisher.add("1");
        publisher.add("2");
        assert_eq!(publisher.pending(), 2);
    }

    #[tokio::test]
    async fn test_flush_publishes_accumulated_apps() {
        let channel = Arc::new(RecordingChannel::default());
        let publisher = Arc::new(ActiveAppPublisher::new(channel.clone()));

        publisher.add("A");
        publisher.add("B");
        publisher.flush().unwrap().await.unwrap();

        let published = channel.published.lock().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, ACTIVE_APPS_SUBJECT);
        assert_eq!(channel.batches(), vec![set(&["A", "B"])]);
        assert_eq!(publisher.pending(), 0);
        assert!(!publisher.is_flushing());
    }

    #[tokio::test]
    async fn test_add_during_flush_goes_to_next_batch() {
        let channel = Arc::new(RecordingChannel::gated());
        let publisher = Arc::new(ActiveAppPublisher::new(channel.clone()));

        publisher.add("A");
        publisher.add("B");
        let in_flight = publisher.flush().unwrap();

        publisher.add("C");
        assert!(publisher.is_flushing());
        assert!(publisher.flush().is_none());

        channel.release();
        in_flight.await.unwrap();
        assert_eq!(channel.batches(), vec![set(&["A", "B"])]);

        let next = publisher.flush().unwrap();
        channel.release();
        next.await.unwrap();
        assert_eq!(channel.batches(), vec![set(&["A", "B"]), set(&["C"])]);
    }

    #[tokio::test]
    async fn test_flush_empty_set_publishes_empty_array() {
        let channel = Arc::new(RecordingChannel::default());
        let publisher = Arc::new(ActiveAppPublisher::new(channel.clone()));

        publisher.flush().unwrap().await.unwrap();
        assert_eq!(channel.batches(), vec![HashSet::new()]);
    }

    #[tokio::test]
    async fn test_publish_failure_clears_flag() {
        struct FailingChannel;

        #[async_trait]
        impl ControlChannel for FailingChannel {
            fn is_reconnecting(&self) -> bool {
                false
            }

            async fn publish(&self, _subject: &str, _payload: Bytes) -> Result<(), ChannelError> {
                Err(ChannelError::Closed)
            }
        }

        let publisher = Arc::new(ActiveAppPublisher::new(Arc::new(FailingChannel)));
        publisher.add("A");
        publisher.flush().unwrap().await.unwrap();

        assert!(!publisher.is_flushing());
        assert!(publisher.flush().is_some());
    }
}
