//! Shared configuration: working directory, RPC endpoint, and the tunables
//! the spec leaves to the implementer (watchdog deadline, queue capacity).

use std::path::PathBuf;
use std::time::Duration;

use crate::mr::error::MrError;

/// The reference watchdog deadline from the spec (10s); shortened in tests
/// so property 4 (watchdog liveness) doesn't cost real wall-clock time.
pub const DEFAULT_WATCHDOG_DEADLINE: Duration = Duration::from_secs(10);

pub const DEFAULT_ADDR: &str = "127.0.0.1:1030";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory shared by the master and all workers for shard/output files.
    pub work_dir: PathBuf,
    pub n_reduce: u32,
    pub watchdog_deadline: Duration,
}

impl Config {
    pub fn new(work_dir: PathBuf, n_reduce: i64) -> Result<Self, MrError> {
        if n_reduce < 1 {
            return Err(MrError::InvalidNReduce(n_reduce));
        }
        Ok(Self {
            work_dir,
            n_reduce: n_reduce as u32,
            watchdog_deadline: DEFAULT_WATCHDOG_DEADLINE,
        })
    }

    pub fn with_watchdog_deadline(mut self, deadline: Duration) -> Self {
        self.watchdog_deadline = deadline;
        self
    }
}
