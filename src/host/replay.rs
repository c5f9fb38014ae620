//! JSON-lines host adapter.
//!
//! Replays a recorded stream of [`HostEvent`]s into subscribed handlers, one
//! event per line. Consecutive result events are dispatched concurrently
//! (bounded by the configured parallelism), the way a host executing tests in
//! parallel would deliver them. Discovery and run-complete events are
//! barriers: all pending results are delivered before them.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

use super::{HostEvent, HostEvents, TestResultEvent, TestRunHandler};

/// Counts of events delivered by a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub discovered: usize,
    pub results: usize,
    pub run_completes: usize,
    /// Lines that were not valid events and were skipped.
    pub malformed: usize,
}

/// A [`HostEvents`] source backed by a JSON-lines reader.
pub struct ReplayHost {
    handlers: Vec<Arc<dyn TestRunHandler>>,
    parallelism: usize,
}

impl ReplayHost {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            parallelism: 1,
        }
    }

    /// Sets how many result events may be in flight at once.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Reads events from `reader` until EOF and delivers them.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading from `reader` fails. Malformed lines
    /// are logged and counted.
    pub async fn run<R>(&self, reader: R) -> std::io::Result<ReplayStats>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = ReplayStats::default();
        let mut pending: Vec<TestResultEvent> = Vec::new();
        let mut lines = LinesStream::new(reader.lines());

        let mut line_no = 0usize;
        while let Some(line) = lines.next().await {
            let line = line?;
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let event = match serde_json::from_str::<HostEvent>(trimmed) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping malformed event on line {}: {}", line_no, e);
                    stats.malformed += 1;
                    continue;
                }
            };

            match event {
                HostEvent::Result(result) => pending.push(result),
                HostEvent::Discovered { tests } => {
                    self.flush(&mut pending, &mut stats).await;
                    stats.discovered += tests.len();
                    for handler in &self.handlers {
                        handler.on_discovered(&tests).await;
                    }
                }
                HostEvent::RunComplete {
                    is_aborted,
                    is_canceled,
                } => {
                    self.flush(&mut pending, &mut stats).await;
                    stats.run_completes += 1;
                    for handler in &self.handlers {
                        handler.on_run_complete(is_aborted, is_canceled).await;
                    }
                }
            }
        }

        self.flush(&mut pending, &mut stats).await;
        debug!("Replay finished: {:?}", stats);
        Ok(stats)
    }

    async fn flush(&self, pending: &mut Vec<TestResultEvent>, stats: &mut ReplayStats) {
        if pending.is_empty() {
            return;
        }
        stats.results += pending.len();

        let handlers = &self.handlers;
        stream::iter(pending.drain(..))
            .for_each_concurrent(self.parallelism, |result| async move {
                for handler in handlers {
                    handler.on_test_result(&result).await;
                }
            })
            .await;
    }
}

impl Default for ReplayHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEvents for ReplayHost {
    fn subscribe(&mut self, handler: Arc<dyn TestRunHandler>) {
        self.handlers.push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TestCase;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TestRunHandler for RecordingHandler {
        async fn on_discovered(&self, tests: &[TestCase]) {
            self.log.lock().unwrap().push(format!("discovered:{}", tests.len()));
        }

        async fn on_test_result(&self, result: &TestResultEvent) {
            self.log
                .lock()
                .unwrap()
                .push(format!("result:{}", result.test_case.fully_qualified_name));
        }

        async fn on_run_complete(&self, is_aborted: bool, _is_canceled: bool) {
            self.log.lock().unwrap().push(format!("complete:{is_aborted}"));
        }
    }

    const EVENTS: &str = r#"
{"event": "discovered", "tests": [{"fully_qualified_name": "A"}, {"fully_qualified_name": "B"}]}
{"event": "result", "test_case": {"fully_qualified_name": "A"}, "outcome": "Passed"}
not an event
{"event": "result", "test_case": {"fully_qualified_name": "B"}, "outcome": "Failed"}
{"event": "run_complete", "is_aborted": false, "is_canceled": false}
"#;

    #[tokio::test]
    async fn test_replay_dispatches_in_order() {
        let handler = Arc::new(RecordingHandler::default());
        let mut host = ReplayHost::new();
        host.subscribe(handler.clone());

        let stats = host.run(EVENTS.as_bytes()).await.unwrap();

        assert_eq!(
            stats,
            ReplayStats {
                discovered: 2,
                results: 2,
                run_completes: 1,
                malformed: 1,
            }
        );
        let log = handler.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec!["discovered:2", "result:A", "result:B", "complete:false"]
        );
    }

    #[tokio::test]
    async fn test_parallel_replay_delivers_results_before_completion() {
        let handler = Arc::new(RecordingHandler::default());
        let mut host = ReplayHost::new().with_parallelism(8);
        host.subscribe(handler.clone());

        let mut input = String::new();
        for i in 0..50 {
            input.push_str(&format!(
                "{{\"event\": \"result\", \"test_case\": {{\"fully_qualified_name\": \"T{i}\"}}, \"outcome\": \"Passed\"}}\n"
            ));
        }
        input.push_str("{\"event\": \"run_complete\"}\n");

        let stats = host.run(input.as_bytes()).await.unwrap();
        assert_eq!(stats.results, 50);

        let log = handler.log.lock().unwrap().clone();
        assert_eq!(log.len(), 51);
        assert_eq!(log.last().unwrap(), "complete:false");
    }

    #[tokio::test]
    async fn test_no_handlers() {
        let host = ReplayHost::default();
        let stats = host.run(EVENTS.as_bytes()).await.unwrap();
        assert_eq!(stats.results, 2);
    }
}
