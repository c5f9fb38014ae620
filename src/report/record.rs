//! Serialized shapes of the local result files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::TestResultEvent;

/// Result of one executed test.
///
/// ```json
/// {
///   "TestName": "Ns.C.M.CBF43926",
///   "OverallStatus": "Failed",
///   "OverallMessage": "expected 3, got 4",
///   "OverallStackTrace": "at Ns.C.M() in C.cs:line 12",
///   "Assertions": [{"Status": "Failed", "Message": "expected 3, got 4", "StackTrace": "..."}],
///   "Duration": "00:00:01.2500000",
///   "DurationMs": 1250
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalResultRecord {
    pub test_name: String,

    pub overall_status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_stack_trace: Option<String>,

    #[serde(default)]
    pub assertions: Vec<AssertionRecord>,

    /// Human-readable duration, `HH:MM:SS.fffffff`.
    pub duration: String,

    pub duration_ms: u64,
}

impl LocalResultRecord {
    /// Builds the record for `result`, filed under `test_name`.
    pub fn from_result(test_name: impl Into<String>, result: &TestResultEvent) -> Self {
        Self {
            test_name: test_name.into(),
            overall_status: result.outcome.to_string(),
            overall_message: result.error_message.clone(),
            overall_stack_trace: result.error_stack_trace.clone(),
            assertions: extract_assertions(result),
            duration: format_duration(result.duration),
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// One assertion-level entry of a test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssertionRecord {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// One entry per attached message, then one for the error, if any.
fn extract_assertions(result: &TestResultEvent) -> Vec<AssertionRecord> {
    let status = result.outcome.to_string();

    let mut assertions: Vec<AssertionRecord> = result
        .messages
        .iter()
        .map(|m| AssertionRecord {
            status: status.clone(),
            message: Some(m.text.clone()),
            stack_trace: None,
        })
        .collect();

    if let Some(message) = &result.error_message {
        assertions.push(AssertionRecord {
            status,
            message: Some(message.clone()),
            stack_trace: result.error_stack_trace.clone(),
        });
    }

    assertions
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Passed,
    Failed,
}

/// Run-level summary written when the run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunSummary {
    pub overall_status: RunStatus,
    pub has_failures: bool,
    pub is_aborted: bool,
    pub is_canceled: bool,
}

impl RunSummary {
    /// A run passes only if nothing failed and it was neither aborted nor
    /// canceled.
    pub fn new(has_failures: bool, is_aborted: bool, is_canceled: bool) -> Self {
        let overall_status = if has_failures || is_aborted || is_canceled {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };
        Self {
            overall_status,
            has_failures,
            is_aborted,
            is_canceled,
        }
    }

    pub fn passed(&self) -> bool {
        self.overall_status == RunStatus::Passed
    }
}

/// Formats a duration as `HH:MM:SS.fffffff` (100ns ticks).
///
/// ```
/// use std::time::Duration;
/// use testfarm_logger::report::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1250)), "00:00:01.2500000");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:07}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        duration.subsec_nanos() / 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{TestCase, TestMessage, TestOutcome};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "00:00:00.0000000");
        assert_eq!(format_duration(Duration::from_millis(1)), "00:00:00.0010000");
        assert_eq!(
            format_duration(Duration::from_secs(3 * 3600 + 25 * 60 + 7)),
            "03:25:07.0000000"
        );
        assert_eq!(format_duration(Duration::from_nanos(150)), "00:00:00.0000001");
    }

    #[test]
    fn test_record_for_passing_test() {
        let result = TestResultEvent::new(TestCase::new("Ns.C.M"), TestOutcome::Passed)
            .with_duration(Duration::from_millis(42));
        let record = LocalResultRecord::from_result("Ns.C.M", &result);

        assert_eq!(record.overall_status, "Passed");
        assert!(record.assertions.is_empty());
        assert_eq!(record.duration_ms, 42);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["TestName"], "Ns.C.M");
        assert_eq!(json["Duration"], "00:00:00.0420000");
        assert!(json.get("OverallMessage").is_none());
    }

    #[test]
    fn test_assertions_from_messages_and_error() {
        let result = TestResultEvent::new(TestCase::new("Ns.C.M"), TestOutcome::Failed)
            .with_message(TestMessage::new("StdErr", "first"))
            .with_message(TestMessage::new("Diagnostic", "second"))
            .with_error("expected 3, got 4")
            .with_stack_trace("at Ns.C.M()");
        let record = LocalResultRecord::from_result("Ns.C.M", &result);

        assert_eq!(record.assertions.len(), 3);
        assert_eq!(record.assertions[0].message.as_deref(), Some("first"));
        assert_eq!(record.assertions[0].stack_trace, None);
        assert_eq!(record.assertions[1].status, "Failed");
        assert_eq!(
            record.assertions[2],
            AssertionRecord {
                status: "Failed".to_string(),
                message: Some("expected 3, got 4".to_string()),
                stack_trace: Some("at Ns.C.M()".to_string()),
            }
        );
        assert_eq!(record.overall_message.as_deref(), Some("expected 3, got 4"));
    }

    #[test]
    fn test_summary_status() {
        assert!(RunSummary::new(false, false, false).passed());
        assert!(!RunSummary::new(true, false, false).passed());
        assert!(!RunSummary::new(false, true, false).passed());
        assert!(!RunSummary::new(false, false, true).passed());

        let json = serde_json::to_value(RunSummary::new(true, false, false)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "OverallStatus": "Failed",
                "HasFailures": true,
                "IsAborted": false,
                "IsCanceled": false
            })
        );
    }
}
