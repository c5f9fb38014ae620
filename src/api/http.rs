//! HTTP implementation of [`TrackingApi`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use super::{
    ADD_CHILD_TEST_PATH, AddChildTestRequest, ApiError, COMPLETE_CHILD_TEST_PATH,
    CompleteChildTestRequest, RegisteredTest, RemoteStatus, TrackingApi, UPLOAD_OUTPUT_PATH,
};
use crate::config::RunConfig;
use crate::tracker::TrackingId;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracking API client over HTTP.
///
/// The underlying connection pool is shared by all handlers for the run and
/// released when the client is dropped.
#[derive(Debug, Clone)]
pub struct HttpTrackingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTrackingClient {
    /// Creates a client for `base_url`. One trailing `/` is trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (for
    /// example, no TLS backend is available).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let mut base_url = base_url.into();
        if base_url.ends_with('/') {
            base_url.pop();
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, ApiError> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn try_register(
        &self,
        parent_id: TrackingId,
        name: &str,
    ) -> Result<RegisteredTest, ApiError> {
        let response = self
            .client
            .post(self.endpoint(ADD_CHILD_TEST_PATH))
            .json(&AddChildTestRequest {
                parent_test_result_id: parent_id,
                name,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            debug!("{} already registered, using existing record", name);
        } else if !status.is_success() {
            return Err(status_error(response).await);
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn try_complete(
        &self,
        test_result_id: TrackingId,
        status: RemoteStatus,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.endpoint(COMPLETE_CHILD_TEST_PATH))
            .json(&CompleteChildTestRequest {
                test_result_id,
                status,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn try_upload(&self, test_result_id: TrackingId, file_path: &Path) -> Result<(), ApiError> {
        let mut form = Form::new().text("TestResultId", test_result_id.to_string());

        match tokio::fs::read(file_path).await {
            Ok(bytes) => {
                let file_name = file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "output".to_string());
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("application/octet-stream")?;
                form = form.part("output", part);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "Output file {} does not exist, uploading without it",
                    file_path.display()
                );
            }
            Err(source) => {
                return Err(ApiError::Io {
                    path: file_path.to_path_buf(),
                    source,
                });
            }
        }

        let response = self
            .client
            .post(self.endpoint(UPLOAD_OUTPUT_PATH))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}

async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::Status { status, body }
}

#[async_trait]
impl TrackingApi for HttpTrackingClient {
    async fn register_child_test(
        &self,
        parent_id: TrackingId,
        name: &str,
    ) -> Option<RegisteredTest> {
        match self.try_register(parent_id, name).await {
            Ok(registered) => Some(registered),
            Err(e) => {
                warn!("Failed to register test {}: {}", name, e);
                None
            }
        }
    }

    async fn complete_child_test(&self, test_result_id: TrackingId, status: RemoteStatus) -> bool {
        match self.try_complete(test_result_id, status).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to complete test result {} as {}: {}",
                    test_result_id,
                    status.as_str(),
                    e
                );
                false
            }
        }
    }

    async fn upload_output(&self, test_result_id: TrackingId, file_path: &Path) -> bool {
        match self.try_upload(test_result_id, file_path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to upload {} for test result {}: {}",
                    file_path.display(),
                    test_result_id,
                    e
                );
                false
            }
        }
    }
}
