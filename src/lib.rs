//! testfarm-logger: mirrors test-run results to local files and a TestFarm
//! tracking service.
//!
//! A test host reports three kinds of lifecycle events: tests discovered,
//! one test finished, run complete. The [`RunOrchestrator`] subscribes to
//! them and, for each test, writes `TEST.<name>/result.testfarm` under the
//! working directory and (when a run configuration is supplied) registers,
//! completes and uploads the result as a child of the run's parent record.
//!
//! # Architecture
//!
//! - **Identity**: canonical, filesystem-safe test names ([`identity`], [`checksum`])
//! - **Tracker**: concurrent name to tracking-id map ([`tracker`])
//! - **API**: the tracking service client ([`api`])
//! - **Report**: local result documents and the atomic writer ([`report`])
//! - **Host**: the lifecycle event seam and a JSON-lines replay host ([`host`])
//! - **Orchestrator**: ties the above together ([`orchestrator`])
//!
//! # Example
//!
//! ```no_run
//! use testfarm_logger::host::replay::ReplayHost;
//! use testfarm_logger::orchestrator::{InitOptions, RunOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut host = ReplayHost::new();
//!     let orchestrator = RunOrchestrator::initialize(&mut host, InitOptions::from_env())?;
//!     let events = tokio::io::BufReader::new(tokio::fs::File::open("events.jsonl").await?);
//!     host.run(events).await?;
//!     println!("failures: {}", orchestrator.has_failures());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod checksum;
pub mod config;
pub mod host;
pub mod identity;
pub mod orchestrator;
pub mod report;
pub mod tracker;

// Re-export commonly used types
pub use api::{HttpTrackingClient, RemoteStatus, TrackingApi};
pub use config::{RunConfig, load_run_config};
pub use host::{HostEvents, TestCase, TestOutcome, TestResultEvent, TestRunHandler};
pub use identity::canonical_name;
pub use orchestrator::{InitError, InitOptions, RemoteTarget, RunOrchestrator};
pub use report::{LocalResultRecord, ResultWriter, RunSummary};
pub use tracker::ResultTracker;
