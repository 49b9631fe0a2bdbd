use crate::clock::Clock;
use crate::error::ConfigError;
use chrono::{DateTime, Local};
use cron::Schedule;
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Top of every minute (the seconds field comes first).
pub const EVERY_MINUTE: &str = "0 * * * * *";

pub type Job = Arc<dyn Fn() + Send + Sync>;

pub struct Scheduler {
    schedule: Schedule,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(expression: &str, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let schedule =
            Schedule::from_str(expression).map_err(|e| ConfigError::Schedule(e.to_string()))?;
        Ok(Scheduler { schedule, clock })
    }

    #[must_use]
    pub fn next_fire(&self) -> Option<DateTime<Local>> {
        self.schedule.after(&self.clock.now()).next()
    }

    fn until_next(&self) -> Option<Duration> {
        let now = self.clock.now();
        let next = self.schedule.after(&now).next()?;
        Some((next - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Fires `job` on its own thread at every scheduled instant until the handle is stopped.
    ///
    /// Each tick gets a fresh thread, so a slow run never delays the next firing;
    /// the job itself decides what to do about overlap.
    pub fn start(self, job: Job) -> io::Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let worker = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || {
                while let Some(wait) = self.until_next() {
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {
                            log::info!("running scheduled task");
                            let job = Arc::clone(&job);
                            if let Err(e) = thread::Builder::new()
                                .name("tick".to_string())
                                .spawn(move || (*job)())
                            {
                                log::error!("failed to start scheduled run: {e}");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("scheduler stopped");
            })?;

        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }
}

/// Owns the scheduler thread. Dropping it stops the schedule.
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("scheduler thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SystemClock};
    use chrono::TimeZone;
    use std::time::Instant;

    #[test]
    fn test_next_fire_is_top_of_next_minute() {
        let clock = FixedClock(Local.with_ymd_and_hms(2024, 8, 1, 9, 30, 15).unwrap());
        let scheduler = Scheduler::new(EVERY_MINUTE, Arc::new(clock)).unwrap();

        assert_eq!(
            scheduler.next_fire(),
            Some(Local.with_ymd_and_hms(2024, 8, 1, 9, 31, 0).unwrap())
        );
        assert_eq!(scheduler.until_next(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_rejects_bad_expression() {
        let result = Scheduler::new("every minute please", Arc::new(SystemClock));
        assert!(matches!(result, Err(ConfigError::Schedule(_))));
    }

    #[test]
    fn test_fires_and_stops() {
        let scheduler = Scheduler::new("* * * * * *", Arc::new(SystemClock)).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = scheduler
            .start(Arc::new(move || {
                let _ = tx.send(());
            }))
            .unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(3)).is_ok());

        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
