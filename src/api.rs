//! Remote tracking API.
//!
//! The tracking service stores one child test result per test under a parent
//! record supplied by the run configuration. Three operations are used:
//!
//! | Operation | Method | Path | Success |
//! |-----------|--------|------|---------|
//! | Register child test | POST | `/add-child-test-to-run` | 2xx, 409 |
//! | Complete child test | POST | `/complete-child-test` | 2xx |
//! | Upload output | POST (multipart) | `/upload-output` | 2xx |
//!
//! A 409 on registration means another caller registered the same name
//! first; the service answers with the existing record, so it is parsed and
//! returned like a success. This keeps concurrent registration of one name
//! correct without any locking on the client side.
//!
//! Every call is attempted once. Failures surface as `None` / `false` and are
//! logged; they never cross the [`TrackingApi`] boundary as errors.

pub mod http;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::host::TestOutcome;
use crate::tracker::TrackingId;

pub use http::HttpTrackingClient;

pub const ADD_CHILD_TEST_PATH: &str = "add-child-test-to-run";
pub const COMPLETE_CHILD_TEST_PATH: &str = "complete-child-test";
pub const UPLOAD_OUTPUT_PATH: &str = "upload-output";

/// Errors from a single call to the tracking service.
///
/// Only used inside implementations; the trait methods flatten them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Status reported when a child test is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Passed,
    Failed,
    Canceled,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Passed => "passed",
            RemoteStatus::Failed => "failed",
            RemoteStatus::Canceled => "canceled",
        }
    }
}

impl From<TestOutcome> for RemoteStatus {
    /// Outcomes other than passed and failed have no remote counterpart and
    /// are reported as canceled.
    fn from(outcome: TestOutcome) -> Self {
        match outcome {
            TestOutcome::Passed => RemoteStatus::Passed,
            TestOutcome::Failed => RemoteStatus::Failed,
            TestOutcome::Skipped | TestOutcome::NotFound | TestOutcome::None => {
                RemoteStatus::Canceled
            }
        }
    }
}

/// Body of a registration request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddChildTestRequest<'a> {
    pub parent_test_result_id: TrackingId,
    pub name: &'a str,
}

/// Body of a completion request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompleteChildTestRequest {
    pub test_result_id: TrackingId,
    pub status: RemoteStatus,
}

/// Registration response: the test definition and its result record.
///
/// Every field is optional so that an unexpected shape degrades to "no
/// tracking id" rather than a decode failure. Both PascalCase and camelCase
/// keys are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredTest {
    #[serde(rename = "Test", alias = "test", default)]
    pub test: Option<RemoteTest>,

    #[serde(rename = "TestResult", alias = "testResult", default)]
    pub test_result: Option<RemoteTestResult>,
}

impl RegisteredTest {
    /// The id used for completion and upload, if the service returned one.
    pub fn tracking_id(&self) -> Option<TrackingId> {
        self.test_result.as_ref().and_then(|r| r.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTest {
    #[serde(rename = "Id", alias = "id", default)]
    pub id: Option<i64>,

    #[serde(rename = "Name", alias = "name", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTestResult {
    #[serde(rename = "Id", alias = "id", default)]
    pub id: Option<TrackingId>,

    #[serde(rename = "Status", alias = "status", default)]
    pub status: Option<String>,
}

/// Client for the tracking service.
///
/// Implementations are shared across concurrently running handlers.
#[async_trait]
pub trait TrackingApi: Send + Sync {
    /// Registers `name` as a child of `parent_id`.
    ///
    /// Returns the (new or pre-existing) record, or `None` on any failure.
    async fn register_child_test(&self, parent_id: TrackingId, name: &str)
    -> Option<RegisteredTest>;

    /// Marks a child test result as finished. `true` only on a 2xx answer.
    async fn complete_child_test(&self, test_result_id: TrackingId, status: RemoteStatus) -> bool;

    /// Uploads `file_path` as the output artifact of a child test result.
    ///
    /// A missing file is not an error: the request is sent without the file
    /// part. `true` only on a 2xx answer.
    async fn upload_output(&self, test_result_id: TrackingId, file_path: &Path) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(RemoteStatus::from(TestOutcome::Passed), RemoteStatus::Passed);
        assert_eq!(RemoteStatus::from(TestOutcome::Failed), RemoteStatus::Failed);
        assert_eq!(RemoteStatus::from(TestOutcome::Skipped), RemoteStatus::Canceled);
        assert_eq!(RemoteStatus::from(TestOutcome::NotFound), RemoteStatus::Canceled);
        assert_eq!(RemoteStatus::from(TestOutcome::None), RemoteStatus::Canceled);
    }

    #[test]
    fn test_request_bodies() {
        let add = serde_json::to_value(AddChildTestRequest {
            parent_test_result_id: 5,
            name: "Ns.C.M",
        })
        .unwrap();
        assert_eq!(add, serde_json::json!({"ParentTestResultId": 5, "Name": "Ns.C.M"}));

        let complete = serde_json::to_value(CompleteChildTestRequest {
            test_result_id: 9,
            status: RemoteStatus::Canceled,
        })
        .unwrap();
        assert_eq!(complete, serde_json::json!({"TestResultId": 9, "Status": "canceled"}));
    }

    #[test]
    fn test_registration_response_shapes() {
        let pascal: RegisteredTest = serde_json::from_str(
            r#"{"Test": {"Id": 1, "Name": "Ns.C.M"}, "TestResult": {"Id": 77, "Status": "running"}}"#,
        )
        .unwrap();
        assert_eq!(pascal.tracking_id(), Some(77));
        assert_eq!(pascal.test.unwrap().name.as_deref(), Some("Ns.C.M"));

        let camel: RegisteredTest =
            serde_json::from_str(r#"{"test": {"id": 1}, "testResult": {"id": 78}}"#).unwrap();
        assert_eq!(camel.tracking_id(), Some(78));

        let missing: RegisteredTest = serde_json::from_str(r#"{"Test": {"Id": 1}}"#).unwrap();
        assert_eq!(missing.tracking_id(), None);
    }
}
