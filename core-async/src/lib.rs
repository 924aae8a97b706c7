//! Async facade for the Tandem playback core.
//!
//! Every `core-*` and `provider-*` crate depends on this crate rather than on
//! Tokio directly, so the runtime surface the core relies on stays in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and join handles
//! - `time`: Sleep, timeouts, intervals and instants
//! - `sync`: Synchronization primitives (Mutex, RwLock, channels)
//! - `fs`: Async filesystem helpers used by host bridges
//! - `single_flight`: Share one in-flight computation between concurrent callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod fs;
pub mod runtime;
pub mod single_flight;
pub mod sync;
pub mod task;
pub mod time;

pub use single_flight::SingleFlight;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
