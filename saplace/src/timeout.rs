use anyhow::{ensure, Result};
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default wall-clock budget for a full run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(290);

/// Cheap, cloneable view of the timeout flag, polled by the optimizer
/// between perturbations and temperature steps.
#[derive(Clone, Debug, Default)]
pub struct TimeoutFlag(Arc<AtomicBool>);

impl TimeoutFlag {
    pub fn has_timed_out(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wall-clock watchdog on its own thread.
///
/// The watchdog shares a single atomic flag with the rest of the program
/// and never touches any placement state; the core polls the flag at safe
/// points and winds down on its own.
#[derive(Debug)]
pub struct TimeoutManager {
    timed_out: TimeoutFlag,
    stop: Arc<AtomicBool>,
    budget: Duration,
    watchdog: Option<JoinHandle<()>>,
}

impl TimeoutManager {
    pub fn new(budget: Duration) -> Self {
        TimeoutManager {
            timed_out: TimeoutFlag::default(),
            stop: Arc::new(AtomicBool::new(false)),
            budget,
            watchdog: None,
        }
    }

    /// Starts the watchdog thread. The budget is measured from this call.
    pub fn start_watchdog(&mut self) {
        let flag = self.timed_out.clone();
        let stop = self.stop.clone();
        let budget = self.budget;
        let start = Instant::now();
        self.watchdog = Some(std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if start.elapsed() >= budget {
                    flag.0.store(true, Ordering::Relaxed);
                    warn!("time budget of {budget:?} exhausted, winding down");
                    break;
                }
                std::thread::sleep(Duration::from_millis(250));
            }
        }));
    }

    pub fn flag(&self) -> TimeoutFlag {
        self.timed_out.clone()
    }

    pub fn has_timed_out(&self) -> bool {
        self.timed_out.has_timed_out()
    }

    /// Errors when the budget has been exhausted.
    pub fn check_timeout(&self) -> Result<()> {
        ensure!(!self.has_timed_out(), "time budget exhausted");
        Ok(())
    }
}

impl Drop for TimeoutManager {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.watchdog.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flags_after_budget_elapses() {
        let mut manager = TimeoutManager::new(Duration::from_millis(20));
        manager.start_watchdog();
        assert!(!manager.has_timed_out());
        std::thread::sleep(Duration::from_millis(400));
        assert!(manager.has_timed_out());
        assert!(manager.check_timeout().is_err());
    }

    #[test]
    fn stays_quiet_within_budget() {
        let mut manager = TimeoutManager::new(Duration::from_secs(3600));
        manager.start_watchdog();
        assert!(!manager.flag().has_timed_out());
        assert!(manager.check_timeout().is_ok());
    }
}
