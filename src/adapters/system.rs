//! Delayed restart.
//!
//! The service asks for a restart and keeps answering; the main loop polls
//! the scheduler and the chip resets once the delay has passed, so replies
//! queued in the same iteration still reach their clients.
//!
//! - **`target_os = "espidf"`**: `esp_restart()`.
//! - **all other targets**: records that a restart happened.

use log::{info, warn};

use crate::adapters::time::MonotonicClock;
use crate::app::ports::SystemPort;

pub struct RestartScheduler {
    clock: MonotonicClock,
    deadline_ms: Option<u64>,
    #[cfg(not(target_os = "espidf"))]
    sim_restarted: bool,
}

impl Default for RestartScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RestartScheduler {
    pub fn new() -> Self {
        Self {
            clock: MonotonicClock::new(),
            deadline_ms: None,
            #[cfg(not(target_os = "espidf"))]
            sim_restarted: false,
        }
    }

    /// Arm the restart relative to `now_ms`. An earlier deadline wins.
    pub fn schedule_at(&mut self, now_ms: u64, delay_ms: u32) {
        let at = now_ms + u64::from(delay_ms);
        match self.deadline_ms {
            Some(existing) if existing <= at => {}
            _ => {
                info!("System: restart in {} ms", delay_ms);
                self.deadline_ms = Some(at);
            }
        }
    }

    /// Restart if the deadline has passed. Returns `true` when the restart
    /// was issued (only observable off-target).
    pub fn poll_at(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(at) if now_ms >= at => {
                self.deadline_ms = None;
                self.restart_now();
                true
            }
            _ => false,
        }
    }

    pub fn poll(&mut self) -> bool {
        let now = self.clock.uptime_ms();
        self.poll_at(now)
    }

    #[cfg(target_os = "espidf")]
    fn restart_now(&mut self) {
        warn!("System: restarting");
        log::logger().flush();
        // SAFETY: does not return.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart_now(&mut self) {
        warn!("System(sim): restart");
        self.sim_restarted = true;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn restarted(&self) -> bool {
        self.sim_restarted
    }
}

impl SystemPort for RestartScheduler {
    fn schedule_restart(&mut self, delay_ms: u32) {
        let now = self.clock.uptime_ms();
        self.schedule_at(now, delay_ms);
    }

    fn restart_pending(&self) -> bool {
        self.deadline_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restarts_after_delay() {
        let mut sys = RestartScheduler::new();
        assert!(!sys.poll_at(0));

        sys.schedule_at(1_000, 500);
        assert!(sys.restart_pending());
        assert!(!sys.poll_at(1_499));
        assert!(sys.poll_at(1_500));
        assert!(sys.restarted());
        assert!(!sys.restart_pending());
    }

    #[test]
    fn earlier_deadline_wins() {
        let mut sys = RestartScheduler::new();
        sys.schedule_at(0, 5_000);
        sys.schedule_at(100, 200);
        assert!(sys.poll_at(300));

        let mut sys = RestartScheduler::new();
        sys.schedule_at(0, 200);
        sys.schedule_at(100, 5_000);
        assert!(sys.poll_at(200));
    }
}
