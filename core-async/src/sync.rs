//! Synchronization primitives.
//!
//! Re-exports Tokio's async-aware primitives. All of them are `Send + Sync`
//! and never block the executor while waiting.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{Mutex, RwLock};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     let mut guard = mutex.lock().await;
//!     *guard += 1;
//!     drop(guard);
//!
//!     let rwlock = RwLock::new(vec![1, 2, 3]);
//!     let read_guard = rwlock.read().await;
//!     assert_eq!(read_guard.len(), 3);
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedMutexGuard, RwLock,
    RwLockReadGuard, RwLockWriteGuard, Semaphore,
};
