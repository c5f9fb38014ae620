//! Atomic writer for local result files.
//!
//! A reader polling the working directory must never see a half-written
//! result. Each document is serialized in full, written to a sibling
//! `<name>.off` file, the previous target (if any) is removed, and the
//! temporary file is renamed onto the target. The target therefore either
//! does not exist yet or holds a complete document.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::{LocalResultRecord, RESULT_FILE_NAME, RunSummary, TEMP_SUFFIX, TEST_DIR_PREFIX};

/// Errors writing a result file.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes result documents under a working directory.
///
/// Owns its serialization settings; nothing here depends on process-wide
/// state, so several writers may coexist (e.g. in tests).
#[derive(Debug, Clone)]
pub struct ResultWriter {
    root: PathBuf,
    pretty: bool,
}

impl ResultWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pretty: true,
        }
    }

    /// Toggles indented JSON output (on by default).
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the result of the test named `canonical_name`.
    ///
    /// The name is used verbatim; a `/` in it yields nested directories.
    pub fn test_dir(&self, canonical_name: &str) -> PathBuf {
        self.root.join(format!("{TEST_DIR_PREFIX}{canonical_name}"))
    }

    pub fn test_result_path(&self, canonical_name: &str) -> PathBuf {
        self.test_dir(canonical_name).join(RESULT_FILE_NAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join(RESULT_FILE_NAME)
    }

    /// Writes `record` to `TEST.<name>/result.testfarm` and returns its path.
    pub fn write_test_result(&self, record: &LocalResultRecord) -> Result<PathBuf, WriteError> {
        let dir = self.test_dir(&record.test_name);
        fs::create_dir_all(&dir).map_err(|source| WriteError::Io {
            action: "create directory",
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(RESULT_FILE_NAME);
        self.write_atomic(&path, record)?;
        Ok(path)
    }

    /// Writes the run summary to the working directory root.
    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf, WriteError> {
        let path = self.summary_path();
        self.write_atomic(&path, summary)?;
        Ok(path)
    }

    /// Serializes `value` and moves it onto `target` atomically.
    pub fn write_atomic<T: Serialize>(&self, target: &Path, value: &T) -> Result<(), WriteError> {
        let contents = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
        .map_err(|source| WriteError::Serialize {
            path: target.to_path_buf(),
            source,
        })?;

        let tmp_path = temp_path(target);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(io_error("create", &tmp_path))?;
        file.write_all(&contents)
            .map_err(io_error("write", &tmp_path))?;
        file.sync_all().map_err(io_error("sync", &tmp_path))?;
        drop(file);

        match fs::remove_file(target) {
            Ok(()) => debug!("Replaced existing {}", target.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("remove", target)(e)),
        }

        fs::rename(&tmp_path, target).map_err(io_error("rename", &tmp_path))?;
        Ok(())
    }
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> WriteError {
    let path = path.to_path_buf();
    move |source| WriteError::Io {
        action,
        path,
        source,
    }
}

/// Sibling path used while `target` is being written.
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunStatus;
    use tempfile::TempDir;

    fn record(name: &str) -> LocalResultRecord {
        LocalResultRecord {
            test_name: name.to_string(),
            overall_status: "Passed".to_string(),
            overall_message: None,
            overall_stack_trace: None,
            assertions: Vec::new(),
            duration: "00:00:00.0010000".to_string(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/w/result.testfarm")),
            PathBuf::from("/w/result.testfarm.off")
        );
    }

    #[test]
    fn test_write_test_result() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(temp_dir.path());

        let path = writer.write_test_result(&record("Ns.C.M")).unwrap();

        assert_eq!(path, temp_dir.path().join("TEST.Ns.C.M").join("result.testfarm"));
        assert!(!temp_path(&path).exists());
        let loaded: LocalResultRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, record("Ns.C.M"));
    }

    #[test]
    fn test_overwrite_existing_target() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(temp_dir.path()).with_pretty(false);

        let first = writer.write_summary(&RunSummary::new(false, false, false)).unwrap();
        let second = writer.write_summary(&RunSummary::new(true, false, false)).unwrap();
        assert_eq!(first, second);

        let loaded: RunSummary =
            serde_json::from_str(&fs::read_to_string(&second).unwrap()).unwrap();
        assert_eq!(loaded.overall_status, RunStatus::Failed);
        assert!(!temp_path(&second).exists());
    }

    #[test]
    fn test_stale_temp_file_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(temp_dir.path());
        fs::write(temp_path(&writer.summary_path()), "garbage").unwrap();

        writer.write_summary(&RunSummary::new(false, false, false)).unwrap();

        assert!(!temp_path(&writer.summary_path()).exists());
        let loaded: RunSummary =
            serde_json::from_str(&fs::read_to_string(writer.summary_path()).unwrap()).unwrap();
        assert!(loaded.passed());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let writer = ResultWriter::new("/nonexistent/testfarm-root");
        let err = writer.write_summary(&RunSummary::new(false, false, false));
        assert!(matches!(err, Err(WriteError::Io { action: "create", .. })));
    }

    #[test]
    fn test_path_separator_in_name_nests_directories() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(temp_dir.path());

        let path = writer
            .write_test_result(&record("tests/test_x.py.t"))
            .unwrap();

        assert_eq!(
            path,
            temp_dir
                .path()
                .join("TEST.tests")
                .join("test_x.py.t")
                .join("result.testfarm")
        );
        assert!(path.exists());
    }

    #[test]
    fn test_concurrent_writes_to_different_tests() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ResultWriter::new(temp_dir.path());

        std::thread::scope(|scope| {
            for i in 0..16 {
                let writer = &writer;
                scope.spawn(move || writer.write_test_result(&record(&format!("T{i}"))).unwrap());
            }
        });

        for i in 0..16 {
            assert!(writer.test_result_path(&format!("T{i}")).exists());
        }
    }
}
