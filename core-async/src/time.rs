//! Time-related abstractions.
//!
//! `sleep`, `timeout` and `interval` integrate with Tokio's timer wheel, which
//! means tests can drive them deterministically with `tokio::time::pause`.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(5)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(5));
//! }
//! ```

pub use tokio::time::{
    interval, sleep, sleep_until, timeout, Interval, MissedTickBehavior, Sleep, Timeout,
};

/// Monotonic instant that follows Tokio's (pausable) clock.
pub use tokio::time::Instant;

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Error returned by [`timeout`] when the deadline elapses first.
pub use tokio::time::error::Elapsed;

/// Creates an interval whose missed ticks are delayed instead of bursting.
///
/// Polling loops (playback position, remote status) should never fire a
/// backlog of ticks after the executor was busy, so they all go through this.
pub fn steady_interval(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
