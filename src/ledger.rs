use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Totals for one mirroring run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
    pub files_downloaded: u64,
    pub files_total: u64,
    pub failures: u64,
}

impl fmt::Display for MirrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "downloaded {} bytes ({} total), {} files ({} total), {} failed",
            self.bytes_downloaded,
            self.bytes_total,
            self.files_downloaded,
            self.files_total,
            self.failures
        )
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    claimed: HashSet<PathBuf>,
    report: MirrorReport,
}

/// Records which local files have been claimed during a run.
///
/// A target is claimed at most once; entries are never removed. The lock is
/// only held for the check-and-set or counter update itself.
#[derive(Debug, Default)]
pub struct DownloadLedger {
    state: Mutex<LedgerState>,
}

impl DownloadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the first caller claiming `target`.
    pub fn try_claim(&self, target: &Path) -> bool {
        self.state.lock().claimed.insert(target.to_path_buf())
    }

    /// A file that was already on disk and therefore not fetched.
    pub fn record_existing(&self, size: u64) {
        let mut state = self.state.lock();
        state.report.bytes_total += size;
        state.report.files_total += 1;
    }

    pub fn record_downloaded(&self, size: u64) {
        let mut state = self.state.lock();
        state.report.bytes_downloaded += size;
        state.report.bytes_total += size;
        state.report.files_downloaded += 1;
        state.report.files_total += 1;
    }

    pub fn record_failure(&self) {
        self.state.lock().report.failures += 1;
    }

    pub fn report(&self) -> MirrorReport {
        self.state.lock().report
    }
}
