//! Background data loading
//!
//! Resolves a [`DataSource`] on a worker thread so the event loop never blocks
//! on file or warehouse reads. Every request gets a sequence number and only
//! the newest request's result is ever handed back; responses to superseded
//! requests are dropped. An optional timeout abandons a request that takes
//! too long.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{GridError, Result};
use crate::services::source::{DataSource, LoadedRows};

struct LoadMessage {
    sequence: u64,
    outcome: Result<LoadedRows>,
}

struct PendingLoad {
    sequence: u64,
    started: Instant,
}

pub struct SourceLoader {
    sender: Sender<LoadMessage>,
    receiver: Receiver<LoadMessage>,
    next_sequence: u64,
    pending: Option<PendingLoad>,
    timeout: Option<Duration>,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SourceLoader {
    pub fn new(timeout: Option<Duration>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            next_sequence: 0,
            pending: None,
            timeout,
        }
    }

    /// Whether a request is in flight
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Start resolving `source`, superseding any request still in flight
    pub fn request(&mut self, source: DataSource) -> u64 {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        let tx = self.sender.clone();

        tracing::debug!(sequence, ?source, "requesting data source");
        thread::spawn(move || {
            let outcome = source.resolve();
            // The loader may have been dropped in the meantime
            let _ = tx.send(LoadMessage { sequence, outcome });
        });

        self.pending = Some(PendingLoad {
            sequence,
            started: Instant::now(),
        });
        sequence
    }

    /// Result of the newest request, once it is available
    ///
    /// Returns `None` while it is still running. Stale results are drained
    /// and discarded. Once the timeout has elapsed the request is abandoned
    /// and reported as [`GridError::Timeout`]; its late result will be
    /// dropped like any other stale one.
    pub fn poll(&mut self) -> Option<Result<LoadedRows>> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => {
                    let current = self.pending.as_ref().map(|p| p.sequence);
                    if current == Some(message.sequence) {
                        self.pending = None;
                        return Some(message.outcome);
                    }
                    tracing::debug!(sequence = message.sequence, "dropping stale data source response");
                }
                Err(TryRecvError::Empty) => break,
                // Unreachable while `self.sender` is alive
                Err(TryRecvError::Disconnected) => break,
            }
        }

        let timeout = self.timeout?;
        let pending = self.pending.as_ref()?;
        if pending.started.elapsed() >= timeout {
            tracing::warn!(sequence = pending.sequence, ?timeout, "data source timed out");
            self.pending = None;
            return Some(Err(GridError::Timeout(timeout)));
        }
        None
    }

    /// Block until the newest request finishes or times out
    pub fn wait(&mut self) -> Option<Result<LoadedRows>> {
        while self.is_pending() {
            if let Some(outcome) = self.poll() {
                return Some(outcome);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::FieldDescriptor;
    use crate::model::value::{row_from_value, Row};
    use crate::services::source::Warehouse;
    use serde_json::json;

    struct SlowWarehouse {
        delay: Duration,
        marker: &'static str,
    }

    impl Warehouse for SlowWarehouse {
        fn fields(&self) -> Vec<FieldDescriptor> {
            Vec::new()
        }

        fn load(&mut self, deliver: &mut dyn FnMut(Vec<Row>)) -> Result<()> {
            thread::sleep(self.delay);
            deliver(vec![row_from_value(json!({"from": self.marker})).unwrap()]);
            Ok(())
        }
    }

    fn slow(delay_ms: u64, marker: &'static str) -> DataSource {
        DataSource::Warehouse(Box::new(SlowWarehouse {
            delay: Duration::from_millis(delay_ms),
            marker,
        }))
    }

    #[test]
    fn test_request_completes() {
        let mut loader = SourceLoader::default();
        loader.request(DataSource::response(r#"{"data": [{"n": 1}]}"#));
        let loaded = loader.wait().unwrap().unwrap();
        assert_eq!(loaded.rows.len(), 1);
        assert!(!loader.is_pending());
        assert!(loader.poll().is_none());
    }

    #[test]
    fn test_newer_request_wins() {
        let mut loader = SourceLoader::default();
        loader.request(slow(150, "old"));
        loader.request(slow(10, "new"));

        let loaded = loader.wait().unwrap().unwrap();
        assert_eq!(loaded.rows[0]["from"], json!("new"));

        // The old response arrives later and is discarded
        thread::sleep(Duration::from_millis(250));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn test_timeout() {
        let mut loader = SourceLoader::new(Some(Duration::from_millis(20)));
        loader.request(slow(300, "hung"));
        assert!(matches!(loader.wait(), Some(Err(GridError::Timeout(_)))));
        assert!(!loader.is_pending());
    }

    #[test]
    fn test_failure_is_reported() {
        let mut loader = SourceLoader::default();
        loader.request(DataSource::response("<html>"));
        assert!(matches!(loader.wait(), Some(Err(GridError::MalformedResponse(_)))));
    }
}
