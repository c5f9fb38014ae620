//! Local result files.
//!
//! Every executed test gets a directory `TEST.<canonical name>` under the
//! working directory holding a `result.testfarm` JSON document; the run as a
//! whole gets a `result.testfarm` summary at the working directory root. An
//! external harness polls for these files, so they are always written
//! atomically (see [`writer::ResultWriter`]).
//!
//! ```text
//! <working dir>/
//! ├── result.testfarm                  run summary, written at run complete
//! ├── TEST.Ns.C.Passing/
//! │   └── result.testfarm
//! └── TEST.Ns.C.DataDriven.1A2B3C4D/
//!     └── result.testfarm
//! ```

pub mod record;
pub mod writer;

pub use record::{AssertionRecord, LocalResultRecord, RunStatus, RunSummary, format_duration};
pub use writer::{ResultWriter, WriteError};

/// File name of both per-test results and the run summary.
pub const RESULT_FILE_NAME: &str = "result.testfarm";

/// Suffix of the transient file used during atomic writes.
pub const TEMP_SUFFIX: &str = ".off";

/// Prefix of per-test result directories.
pub const TEST_DIR_PREFIX: &str = "TEST.";
