//! One-shot completion timer
//!
//! The timer never fires on its own: the control thread polls it. A
//! [`CancellationToken`] travels with the scheduled completion and is checked
//! before the completion is honoured, so a `stop()` that lands first always
//! wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Compute how long the remaining audio lasts
///
/// `(total_frames - consumed_frames) / sample_rate`, divided by `rate`.
pub fn completion_delay(
    total_frames: u64,
    consumed_frames: u64,
    sample_rate: u32,
    rate: f64,
) -> Duration {
    if sample_rate == 0 || rate <= 0.0 {
        return Duration::ZERO;
    }
    let remaining = total_frames.saturating_sub(consumed_frames) as f64;
    Duration::from_secs_f64(remaining / sample_rate as f64 / rate)
}

/// An armed one-shot completion
#[derive(Debug)]
pub struct CompletionTimer {
    deadline: Instant,
    delay: Duration,
    token: CancellationToken,
}

impl CompletionTimer {
    pub fn arm(now: Instant, delay: Duration) -> Self {
        Self {
            deadline: now + delay,
            delay,
            token: CancellationToken::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the deadline has passed, unless cancelled first
    pub fn is_due(&self, now: Instant) -> bool {
        !self.token.is_cancelled() && now >= self.deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_delay_for_slow_rate() {
        let delay = completion_delay(4 * 44100, 0, 44100, 0.5);
        assert_relative_eq!(delay.as_secs_f64(), 8.0, epsilon = 1e-6);
    }

    #[test]
    fn test_delay_without_rate() {
        let delay = completion_delay(4 * 44100, 0, 44100, 1.0);
        assert_relative_eq!(delay.as_secs_f64(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_delay_subtracts_consumed_frames() {
        let delay = completion_delay(4 * 44100, 44100, 44100, 1.0);
        assert_relative_eq!(delay.as_secs_f64(), 3.0, epsilon = 1e-6);
        assert_eq!(completion_delay(10, 20, 44100, 1.0), Duration::ZERO);
    }

    #[test]
    fn test_timer_due_after_deadline() {
        let now = Instant::now();
        let timer = CompletionTimer::arm(now, Duration::from_secs(2));

        assert!(!timer.is_due(now + Duration::from_secs(1)));
        assert!(timer.is_due(now + Duration::from_secs(2)));
        assert_eq!(timer.remaining(now), Duration::from_secs(2));
    }

    #[test]
    fn test_cancelled_timer_never_due() {
        let now = Instant::now();
        let timer = CompletionTimer::arm(now, Duration::from_secs(1));
        let token = timer.token();

        token.cancel();

        assert!(timer.is_cancelled());
        assert!(!timer.is_due(now + Duration::from_secs(5)));
    }
}
