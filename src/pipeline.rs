use crate::clock::Clock;
use crate::email::Notifier;
use crate::error::{ConfigError, DeliveryError, ExportError, ScanError};
use crate::export;
use crate::scanner;
use crate::types::{Partial, Report};
use crossbeam_channel::RecvTimeoutError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// How a single tick ended. No variant is fatal; the next tick simply tries again.
#[derive(Debug)]
pub enum RunOutcome {
    Skipped(ConfigError),
    Overlapping,
    ScanFailed(ScanError),
    ExportFailed(ExportError),
    /// Written but not sent, because no notifier is configured.
    Exported {
        path: PathBuf,
        folders: usize,
        suppressed: usize,
    },
    Delivered {
        path: PathBuf,
        folders: usize,
        suppressed: usize,
    },
    DeliveryFailed {
        path: PathBuf,
        error: DeliveryError,
    },
}

/// One scan -> export -> notify run, guarded against overlapping ticks.
pub struct Pipeline {
    root: Option<PathBuf>,
    out_dir: PathBuf,
    scan_timeout: Duration,
    notifier: Option<Box<dyn Notifier>>,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
}

/// Clears the run-in-progress flag when dropped. A timed-out scan worker keeps it.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Pipeline {
    pub fn new(root: Option<PathBuf>, out_dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Pipeline {
            root,
            out_dir,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            notifier: None,
            clock,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn run_once(&self) -> RunOutcome {
        let Some(root) = &self.root else {
            let err = ConfigError::MissingRoot;
            log::error!("run skipped: {err}");
            return RunOutcome::Skipped(err);
        };

        if self.running.swap(true, Ordering::AcqRel) {
            log::warn!("previous run still in progress, skipping this tick");
            return RunOutcome::Overlapping;
        }
        let guard = RunGuard(Arc::clone(&self.running));

        log::info!("scanning {}", root.display());
        let (report, _guard) = match self.scan_with_timeout(root, guard) {
            Ok(scanned) => scanned,
            Err(e) => {
                log::error!("scan failed: {e}");
                return RunOutcome::ScanFailed(e);
            }
        };
        if !report.is_clean() {
            log::warn!(
                "{} entries skipped while scanning {}",
                report.errors.len(),
                root.display()
            );
        }
        let suppressed = report.errors.len();
        let report = report.value;
        let folders = report.folders.len();

        let path = match export::build_document(&report, &self.out_dir, self.clock.as_ref()) {
            Ok(path) => path,
            Err(e) => {
                log::error!("export failed: {e}");
                return RunOutcome::ExportFailed(e);
            }
        };

        let Some(notifier) = &self.notifier else {
            log::info!("no mail configured, report left at {}", path.display());
            return RunOutcome::Exported {
                path,
                folders,
                suppressed,
            };
        };

        match notifier.send_report(&path) {
            Ok(()) => RunOutcome::Delivered {
                path,
                folders,
                suppressed,
            },
            Err(error) => {
                log::error!("error sending email: {error}");
                RunOutcome::DeliveryFailed { path, error }
            }
        }
    }

    /// Runs the scan on a worker thread and gives up after `scan_timeout`.
    ///
    /// The guard travels with the worker and comes back with its result. An
    /// abandoned worker keeps it until the filesystem returns, so later ticks
    /// see the run as still in progress.
    fn scan_with_timeout(
        &self,
        root: &Path,
        guard: RunGuard,
    ) -> Result<(Partial<Report>, RunGuard), ScanError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker_root = root.to_path_buf();
        let clock = Arc::clone(&self.clock);

        thread::Builder::new()
            .name("scan".to_string())
            .spawn(move || {
                let result = scanner::scan_root(&worker_root, clock.as_ref());
                let _ = tx.send((result, guard));
            })
            .map_err(|e| ScanError::io(root, e))?;

        match rx.recv_timeout(self.scan_timeout) {
            Ok((result, guard)) => result.map(|report| (report, guard)),
            Err(RecvTimeoutError::Timeout) => Err(ScanError::Timeout(self.scan_timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ScanError::Walk {
                path: root.to_path_buf(),
                message: "scan worker exited without a result".to_string(),
            }),
        }
    }
}
