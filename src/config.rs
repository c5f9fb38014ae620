//! Run configuration loading.
//!
//! The run configuration is read once at initialization. Every failure here
//! is fatal to the run, so errors carry the offending path.

pub mod schema;

pub use schema::*;

use std::path::{Path, PathBuf};

/// Errors raised while loading the run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured file does not exist.
    #[error("Run configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read run configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse run configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but is unusable.
    #[error("Invalid run configuration: {0}")]
    Invalid(String),
}

/// Loads the run configuration from a JSON file.
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist or cannot be read
/// - The file is not valid JSON or does not match [`RunConfig`]
/// - The API base URL is empty
pub fn load_run_config(path: &Path) -> Result<RunConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse(&content).map_err(|e| match e {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Loads the run configuration from a JSON string.
///
/// # Example
///
/// ```
/// use testfarm_logger::config::load_run_config_str;
///
/// let config = load_run_config_str(r#"{
///     "TestFarmApiBaseUrl": "http://localhost:5000",
///     "ParentTestResultId": 12
/// }"#)?;
///
/// assert_eq!(config.api_base_url, "http://localhost:5000");
/// # Ok::<(), testfarm_logger::config::ConfigError>(())
/// ```
pub fn load_run_config_str(content: &str) -> Result<RunConfig, ConfigError> {
    parse(content)
}

fn parse(content: &str) -> Result<RunConfig, ConfigError> {
    let config: RunConfig =
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;

    if config.api_base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "TestFarmApiBaseUrl must not be empty".to_string(),
        ));
    }

    Ok(config)
}

/// Expands a leading `~` in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{"TestFarmApiBaseUrl": "http://farm/api/", "ParentTestResultId": 99}"#,
        )
        .unwrap();

        let config = load_run_config(&path).unwrap();
        assert_eq!(config.api_base_url, "http://farm/api/");
        assert_eq!(config.parent_test_result_id, 99);
        assert_eq!(config.request_timeout().as_secs(), 30);
    }

    #[test]
    fn test_missing_file() {
        let result = load_run_config(Path::new("/nonexistent/run.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");
        std::fs::write(&path, "{ not json").unwrap();

        match load_run_config(&path) {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_null_document_rejected() {
        assert!(matches!(
            load_run_config_str("null"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_parent_id_rejected() {
        assert!(load_run_config_str(r#"{"TestFarmApiBaseUrl": "http://farm"}"#).is_err());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result =
            load_run_config_str(r#"{"TestFarmApiBaseUrl": " ", "ParentTestResultId": 1}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_custom_timeout() {
        let config = load_run_config_str(
            r#"{"TestFarmApiBaseUrl": "http://farm", "ParentTestResultId": 1, "RequestTimeoutSecs": 5}"#,
        )
        .unwrap();
        assert_eq!(config.request_timeout().as_secs(), 5);
    }

    #[test]
    fn test_expand_path_plain() {
        assert_eq!(expand_path("/tmp/run.json"), PathBuf::from("/tmp/run.json"));
    }
}
