//! Host event model.
//!
//! The logger runs inside a test-execution host that owns discovery and
//! execution. The host raises three lifecycle events, modelled here as plain
//! data types, and delivers them to subscribed [`TestRunHandler`]s through
//! an implementation of [`HostEvents`].
//!
//! ```text
//!   Host ──subscribe()──► HostEvents
//!                             │
//!        discovered ──────────┤
//!        test result ─────────┼──► TestRunHandler (RunOrchestrator)
//!        run complete ────────┘
//! ```
//!
//! Keeping the seam typed lets the orchestrator be driven directly in tests
//! or by [`replay::ReplayHost`], which reads events from a JSON-lines stream.

pub mod replay;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A test as reported by the host during discovery and execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Fully qualified name, including the argument list for data-driven tests.
    pub fully_qualified_name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Assembly, binary or file the test was loaded from.
    #[serde(default)]
    pub source: Option<String>,
}

impl TestCase {
    pub fn new(fully_qualified_name: impl Into<String>) -> Self {
        Self {
            fully_qualified_name: fully_qualified_name.into(),
            display_name: None,
            source: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Outcome of a single test as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
    NotFound,
    None,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "Passed",
            TestOutcome::Failed => "Failed",
            TestOutcome::Skipped => "Skipped",
            TestOutcome::NotFound => "NotFound",
            TestOutcome::None => "None",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown test outcome: {0}")]
pub struct ParseOutcomeError(String);

impl FromStr for TestOutcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passed" => Ok(TestOutcome::Passed),
            "failed" => Ok(TestOutcome::Failed),
            "skipped" => Ok(TestOutcome::Skipped),
            "notfound" | "not_found" => Ok(TestOutcome::NotFound),
            "none" => Ok(TestOutcome::None),
            _ => Err(ParseOutcomeError(s.to_string())),
        }
    }
}

/// A message attached to a test result (standard error, diagnostics, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMessage {
    #[serde(default)]
    pub category: String,
    pub text: String,
}

impl TestMessage {
    pub fn new(category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            text: text.into(),
        }
    }
}

/// The result of one executed test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResultEvent {
    pub test_case: TestCase,

    pub outcome: TestOutcome,

    /// Wall-clock duration, carried as whole milliseconds on the wire.
    #[serde(rename = "duration_ms", with = "duration_millis", default)]
    pub duration: Duration,

    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default)]
    pub error_stack_trace: Option<String>,

    #[serde(default)]
    pub messages: Vec<TestMessage>,
}

impl TestResultEvent {
    pub fn new(test_case: TestCase, outcome: TestOutcome) -> Self {
        Self {
            test_case,
            outcome,
            duration: Duration::ZERO,
            error_message: None,
            error_stack_trace: None,
            messages: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.error_stack_trace = Some(trace.into());
        self
    }

    pub fn with_message(mut self, message: TestMessage) -> Self {
        self.messages.push(message);
        self
    }
}

/// One lifecycle event, as carried in a JSON-lines event stream.
///
/// ```json
/// {"event": "discovered", "tests": [{"fully_qualified_name": "Ns.C.M"}]}
/// {"event": "result", "test_case": {"fully_qualified_name": "Ns.C.M"}, "outcome": "Passed", "duration_ms": 12}
/// {"event": "run_complete", "is_aborted": false, "is_canceled": false}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    Discovered {
        tests: Vec<TestCase>,
    },
    Result(TestResultEvent),
    RunComplete {
        #[serde(default)]
        is_aborted: bool,
        #[serde(default)]
        is_canceled: bool,
    },
}

/// Receiver of the host's lifecycle events.
///
/// The returned futures complete only once every side effect of the event
/// (local files, remote calls) has happened. Implementations must tolerate
/// concurrent invocation from several tasks.
#[async_trait]
pub trait TestRunHandler: Send + Sync {
    /// Called with a batch of newly discovered tests.
    async fn on_discovered(&self, tests: &[TestCase]);

    /// Called once per executed test.
    async fn on_test_result(&self, result: &TestResultEvent);

    /// Called once when the run has finished.
    async fn on_run_complete(&self, is_aborted: bool, is_canceled: bool);
}

/// A source of host lifecycle events that handlers subscribe to.
pub trait HostEvents {
    fn subscribe(&mut self, handler: Arc<dyn TestRunHandler>);
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
