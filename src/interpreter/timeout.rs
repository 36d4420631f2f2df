//! Watchdog for long running scripts
//!
//! Backward jumps and for-in steps call [`TimeoutChecker::tick`]. Only when
//! the tick budget runs out is the clock sampled; the next budget is scaled
//! so that samples land roughly every `check_interval`.

use std::time::{Duration, Instant};

use crate::error::JsError;

/// Decides whether a script that exceeded its time limit is stopped
///
/// `elapsed` is the total time since the outermost host entry started. A
/// declined termination is asked again at every later check.
pub trait InterruptPolicy {
    fn should_terminate(&mut self, elapsed: Duration) -> bool;
}

/// Stop as soon as the limit is exceeded
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysTerminate;

impl InterruptPolicy for AlwaysTerminate {
    fn should_terminate(&mut self, _elapsed: Duration) -> bool {
        true
    }
}

const INITIAL_TICKS: u32 = 1024;
const MIN_TICKS: u32 = 64;
const MAX_TICKS: u32 = 1 << 24;

pub struct TimeoutChecker {
    timeout: Option<Duration>,
    check_interval: Duration,
    ticks_until_check: u32,
    ticks_per_check: u32,
    started: Option<Instant>,
    last_check: Option<Instant>,
    policy: Box<dyn InterruptPolicy>,
}

impl TimeoutChecker {
    pub fn new(timeout_ms: u64, check_interval_ms: u64) -> Self {
        Self {
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            check_interval: Duration::from_millis(check_interval_ms.max(1)),
            ticks_until_check: INITIAL_TICKS,
            ticks_per_check: INITIAL_TICKS,
            started: None,
            last_check: None,
            policy: Box::new(AlwaysTerminate),
        }
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.map_or(0, |t| t.as_millis() as u64)
    }

    pub fn set_policy(&mut self, policy: Box<dyn InterruptPolicy>) {
        self.policy = policy;
    }

    /// Start the clock for a host-level entry
    pub fn start(&mut self) {
        let now = Instant::now();
        self.started = Some(now);
        self.last_check = Some(now);
        self.ticks_until_check = self.ticks_per_check;
    }

    pub fn stop(&mut self) {
        self.started = None;
        self.last_check = None;
    }

    #[inline]
    pub fn tick(&mut self) -> Result<(), JsError> {
        if self.ticks_until_check > 1 {
            self.ticks_until_check -= 1;
            return Ok(());
        }
        self.check()
    }

    fn check(&mut self) -> Result<(), JsError> {
        let now = Instant::now();
        if let Some(last) = self.last_check {
            let since_last = now.duration_since(last);
            self.ticks_per_check = rescale(self.ticks_per_check, since_last, self.check_interval);
        }
        self.last_check = Some(now);
        self.ticks_until_check = self.ticks_per_check;

        let (Some(timeout), Some(started)) = (self.timeout, self.started) else {
            return Ok(());
        };
        let elapsed = now.duration_since(started);
        if elapsed <= timeout {
            return Ok(());
        }
        if self.policy.should_terminate(elapsed) {
            tracing::debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = timeout.as_millis() as u64,
                "terminating script on timeout"
            );
            return Err(JsError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        tracing::debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            "interrupt policy let the script continue"
        );
        Ok(())
    }
}

/// Ticks that would have taken `target` at the rate observed over `observed`
fn rescale(ticks: u32, observed: Duration, target: Duration) -> u32 {
    let observed_ns = observed.as_nanos().max(1);
    let scaled = u128::from(ticks) * target.as_nanos() / observed_ns;
    (scaled.min(u128::from(MAX_TICKS)) as u32).max(MIN_TICKS)
}
