//! Run configuration schema.
//!
//! The run configuration is a small JSON document handed to the logger
//! through the `TestsRunConfig` parameter:
//!
//! ```json
//! {
//!   "TestFarmApiBaseUrl": "https://testfarm.example.com/api",
//!   "ParentTestResultId": 1234,
//!   "RequestTimeoutSecs": 30
//! }
//! ```
//!
//! Its absence is valid: the run is then reported to local files only.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the working directory for result files.
pub const WORKING_DIR_ENV: &str = "TESTFARM_WORKING_DIR";

/// Host parameter carrying the path of the run configuration file.
pub const TESTS_RUN_CONFIG_PARAM: &str = "TestsRunConfig";

/// Settings binding a run to its remote tracking record.
///
/// Immutable for the lifetime of a run.
///
/// # Example
///
/// ```
/// use testfarm_logger::config::RunConfig;
///
/// let config: RunConfig = serde_json::from_str(r#"{
///     "TestFarmApiBaseUrl": "http://localhost:5000/api/",
///     "ParentTestResultId": 7
/// }"#).unwrap();
///
/// assert_eq!(config.parent_test_result_id, 7);
/// assert_eq!(config.request_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunConfig {
    /// Base URL of the tracking API. A trailing slash is tolerated.
    #[serde(rename = "TestFarmApiBaseUrl")]
    pub api_base_url: String,

    /// Remote test result under which every test of this run is nested.
    pub parent_test_result_id: i64,

    /// Per-request timeout for calls to the tracking API.
    ///
    /// Default: 30
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl RunConfig {
    pub fn new(api_base_url: impl Into<String>, parent_test_result_id: i64) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            parent_test_result_id,
            request_timeout_secs: default_request_timeout(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
