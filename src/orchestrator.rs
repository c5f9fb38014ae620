//! Run orchestration.
//!
//! The [`RunOrchestrator`] ties the host's lifecycle events to local result
//! files and the remote tracking service.
//!
//! # Event Flow
//!
//! ```text
//!   Host                     RunOrchestrator                    TrackingApi
//!    │                              │                                │
//!    │ discovered(tests) ──────────►│ canonical_name()               │
//!    │                              │ register_child_test() ────────►│
//!    │                              │ tracker.register(name, id)     │
//!    │                              │                                │
//!    │ test result ────────────────►│ tracker.lookup(name)           │
//!    │                              │   └─ absent: register (fallback)►
//!    │                              │ write TEST.<name>/result.testfarm
//!    │                              │ complete_child_test() ────────►│
//!    │                              │ upload_output() ──────────────►│
//!    │                              │                                │
//!    │ run complete ───────────────►│ write result.testfarm          │
//!    │                              │ release client                 │
//! ```
//!
//! There is no global state variable: per-test state lives in the
//! [`ResultTracker`] and the run-level state is a sticky "has failures" flag.
//! Discovery is not guaranteed to precede a test's result (dynamically
//! generated tests are never discovered), which is why result processing
//! registers missing tests itself.
//!
//! # Failure Semantics
//!
//! Only [`RunOrchestrator::initialize`] can fail. Once the run is under way,
//! every problem is logged and swallowed: one test's reporting must not stop
//! the others, and local files are written even when the tracking service is
//! unreachable for the whole run.

use std::collections::HashMap;
use std::ffi::OsString;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, HttpTrackingClient, RemoteStatus, TrackingApi};
use crate::config::{
    ConfigError, TESTS_RUN_CONFIG_PARAM, WORKING_DIR_ENV, expand_path, load_run_config,
};
use crate::host::{HostEvents, TestCase, TestOutcome, TestResultEvent, TestRunHandler};
use crate::identity::canonical_name;
use crate::report::{LocalResultRecord, ResultWriter, RunSummary, WriteError};
use crate::tracker::{ResultTracker, TrackingId};

/// Fatal initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Working directory is not configured; set TESTFARM_WORKING_DIR")]
    WorkingDirUnset,

    #[error("Failed to create working directory {path}: {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create tracking client: {0}")]
    Client(#[from] ApiError),
}

/// Inputs to [`RunOrchestrator::initialize`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Root for all result files.
    pub working_dir: Option<PathBuf>,

    /// Host-supplied parameters. Only `TestsRunConfig` is recognized.
    pub parameters: HashMap<String, Option<String>>,
}

impl InitOptions {
    /// Options with the working directory taken from `TESTFARM_WORKING_DIR`.
    pub fn from_env() -> Self {
        Self {
            working_dir: working_dir_from_env(std::env::var_os(WORKING_DIR_ENV)),
            parameters: HashMap::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Path of the run configuration, if one was supplied and is non-empty.
    pub fn run_config_path(&self) -> Option<PathBuf> {
        self.parameters
            .get(TESTS_RUN_CONFIG_PARAM)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(expand_path)
    }
}

fn working_dir_from_env(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// A tracking client bound to the parent record of this run.
#[derive(Clone)]
pub struct RemoteTarget {
    pub api: Arc<dyn TrackingApi>,
    pub parent_id: TrackingId,
}

impl RemoteTarget {
    pub fn new(api: Arc<dyn TrackingApi>, parent_id: TrackingId) -> Self {
        Self { api, parent_id }
    }
}

impl std::fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("parent_id", &self.parent_id)
            .finish_non_exhaustive()
    }
}

/// Reports one test run to local files and, optionally, the tracking service.
///
/// Shared as `Arc<RunOrchestrator>`; all handlers take `&self` and may run
/// concurrently.
#[derive(Debug)]
pub struct RunOrchestrator {
    writer: ResultWriter,
    tracker: ResultTracker,
    /// Taken (and thereby released) when the run completes.
    remote: RwLock<Option<RemoteTarget>>,
    has_failures: AtomicBool,
}

impl RunOrchestrator {
    /// Creates an orchestrator writing under `working_dir`.
    ///
    /// The directory is expected to exist; see [`initialize`](Self::initialize)
    /// for the full setup from host parameters.
    pub fn new(working_dir: impl Into<PathBuf>, remote: Option<RemoteTarget>) -> Self {
        Self {
            writer: ResultWriter::new(working_dir),
            tracker: ResultTracker::new(),
            remote: RwLock::new(remote),
            has_failures: AtomicBool::new(false),
        }
    }

    /// Sets up the orchestrator from host options and subscribes it to `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No working directory is configured, or it cannot be created
    /// - A run configuration path is given but the file is missing or invalid
    /// - The HTTP client cannot be built
    pub fn initialize(
        events: &mut dyn HostEvents,
        options: InitOptions,
    ) -> Result<Arc<Self>, InitError> {
        let orchestrator = Arc::new(
            Self::from_options(options, std::env::var_os(WORKING_DIR_ENV))
                .inspect_err(|e| error!("Failed to initialize test run logger: {}", e))?,
        );
        events.subscribe(orchestrator.clone());
        Ok(orchestrator)
    }

    /// `env_working_dir` is the value of `TESTFARM_WORKING_DIR`, used when
    /// the options carry no explicit directory.
    fn from_options(
        options: InitOptions,
        env_working_dir: Option<OsString>,
    ) -> Result<Self, InitError> {
        let working_dir = options
            .working_dir
            .clone()
            .or_else(|| working_dir_from_env(env_working_dir))
            .ok_or(InitError::WorkingDirUnset)?;
        std::fs::create_dir_all(&working_dir).map_err(|source| InitError::WorkingDir {
            path: working_dir.clone(),
            source,
        })?;

        let remote = match options.run_config_path() {
            Some(path) => {
                let config = load_run_config(&path)?;
                let client = HttpTrackingClient::from_config(&config)?;
                info!(
                    "Reporting to {} under parent test result {}",
                    client.base_url(),
                    config.parent_test_result_id
                );
                Some(RemoteTarget::new(
                    Arc::new(client),
                    config.parent_test_result_id,
                ))
            }
            None => {
                info!("No run configuration supplied, remote reporting disabled");
                None
            }
        };

        info!("Writing results to {}", working_dir.display());
        Ok(Self::new(working_dir, remote))
    }

    pub fn working_dir(&self) -> &Path {
        self.writer.root()
    }

    pub fn writer(&self) -> &ResultWriter {
        &self.writer
    }

    pub fn tracker(&self) -> &ResultTracker {
        &self.tracker
    }

    /// Whether any test has failed so far in this run.
    pub fn has_failures(&self) -> bool {
        self.has_failures.load(Ordering::SeqCst)
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote().is_some()
    }

    fn remote(&self) -> Option<RemoteTarget> {
        self.remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers `name` and records its tracking id.
    async fn register(&self, remote: &RemoteTarget, name: &str) -> Option<TrackingId> {
        let registered = remote.api.register_child_test(remote.parent_id, name).await?;
        match registered.tracking_id() {
            Some(id) => {
                self.tracker.register(name, id);
                Some(id)
            }
            None => {
                warn!("Registration of {} returned no test result id", name);
                None
            }
        }
    }

    /// Handles a batch of discovered tests.
    pub async fn discover(&self, tests: &[TestCase]) {
        if tests.is_empty() {
            return;
        }

        let Some(remote) = self.remote() else {
            info!("Discovered {} tests", tests.len());
            return;
        };

        info!("Registering {} discovered tests", tests.len());
        let mut registered = 0usize;
        for test in tests {
            let name = canonical_name(&test.fully_qualified_name);
            if self.tracker.is_registered(&name) {
                debug!("{} already registered", name);
                continue;
            }
            if self.register(&remote, &name).await.is_some() {
                registered += 1;
            }
        }
        info!("Registered {}/{} discovered tests", registered, tests.len());
    }

    /// Handles one test result and returns the path of the local result file.
    ///
    /// Remote failures are logged and do not affect the result; only a
    /// failure to write the local file is returned.
    pub async fn record_result(&self, result: &TestResultEvent) -> Result<PathBuf, WriteError> {
        if result.outcome == TestOutcome::Failed {
            self.has_failures.store(true, Ordering::SeqCst);
        }

        let name = canonical_name(&result.test_case.fully_qualified_name);
        let remote = self.remote();

        let tracking_id = match (self.tracker.lookup(&name), &remote) {
            (Some(id), _) => Some(id),
            (None, Some(remote)) => {
                debug!("{} was not discovered, registering now", name);
                self.register(remote, &name).await
            }
            (None, None) => None,
        };

        let record = LocalResultRecord::from_result(name, result);
        let path = self.writer.write_test_result(&record)?;
        debug!("Wrote {} for {}", path.display(), record.test_name);

        if let (Some(remote), Some(id)) = (remote, tracking_id) {
            let status = RemoteStatus::from(result.outcome);
            if !remote.api.complete_child_test(id, status).await {
                warn!("Could not complete {} on the tracking service", record.test_name);
            }
            if !remote.api.upload_output(id, &path).await {
                warn!("Could not upload output of {}", record.test_name);
            }
        }

        Ok(path)
    }

    /// Writes the run summary and releases the tracking client.
    pub fn complete_run(&self, is_aborted: bool, is_canceled: bool) -> RunSummary {
        let summary = RunSummary::new(self.has_failures(), is_aborted, is_canceled);

        match self.writer.write_summary(&summary) {
            Ok(path) => info!(
                "Run finished: {:?} (summary at {})",
                summary.overall_status,
                path.display()
            ),
            Err(e) => error!("Failed to write run summary: {}", e),
        }

        if self
            .remote
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("Released tracking client");
        }

        summary
    }
}

#[async_trait]
impl TestRunHandler for RunOrchestrator {
    async fn on_discovered(&self, tests: &[TestCase]) {
        if AssertUnwindSafe(self.discover(tests))
            .catch_unwind()
            .await
            .is_err()
        {
            error!("Panic while processing {} discovered tests", tests.len());
        }
    }

    async fn on_test_result(&self, result: &TestResultEvent) {
        let name = &result.test_case.fully_qualified_name;
        match AssertUnwindSafe(self.record_result(result))
            .catch_unwind()
            .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to report result of {}: {}", name, e),
            Err(_) => error!("Panic while reporting result of {}", name),
        }
    }

    async fn on_run_complete(&self, is_aborted: bool, is_canceled: bool) {
        if std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.complete_run(is_aborted, is_canceled)
        }))
        .is_err()
        {
            error!("Panic while completing the run");
        }
    }
}
