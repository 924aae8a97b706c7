//! Single-flight execution.
//!
//! A [`SingleFlight`] guarantees that at most one computation is in flight at
//! any time. Callers arriving while a computation runs do not start their own;
//! they await the running one and receive a clone of its output. Once the
//! computation completes the slot is cleared and the next caller starts fresh.
//!
//! # Examples
//!
//! ```rust
//! use core_async::SingleFlight;
//!
//! async fn example(flight: &SingleFlight<u32>) {
//!     let (a, b) = futures::join!(
//!         flight.run(|| async { 7 }),
//!         flight.run(|| async { 8 }),
//!     );
//!     // Both callers observed the first computation.
//!     assert_eq!((a, b), (7, 7));
//! }
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

struct Flight<T: Clone> {
    id: u64,
    future: Shared<BoxFuture<'static, T>>,
}

/// Shares one in-flight computation between concurrent callers.
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Option<Flight<T>>>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Runs `start` unless a computation is already in flight, in which case
    /// the caller joins that computation instead. `start` is only invoked by
    /// the caller that actually begins a new flight.
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (id, future) = {
            let mut slot = self.lock_slot();
            match slot.as_ref() {
                Some(flight) => (flight.id, flight.future.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = start().boxed().shared();
                    *slot = Some(Flight {
                        id,
                        future: future.clone(),
                    });
                    (id, future)
                }
            }
        };

        let output = future.await;

        let mut slot = self.lock_slot();
        if slot.as_ref().map(|flight| flight.id) == Some(id) {
            *slot = None;
        }
        output
    }

    /// Whether a computation is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.lock_slot().is_some()
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Flight<T>>> {
        // The guarded section never panics, so a poisoned lock still holds
        // consistent data.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
