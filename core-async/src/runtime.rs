//! Runtime utilities for hosts that do not already run an executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Builds a multi-threaded runtime suitable for hosting the playback core.
///
/// Hosts embedding the core from a synchronous entry point (FFI shells,
/// command-line demos) create one of these and keep it alive for the whole
/// session.
pub fn build_runtime(worker_threads: usize) -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(worker_threads.max(1))
        .thread_name("tandem-core")
        .enable_all()
        .build()
}

/// Returns a handle to the runtime driving the current task, if any.
pub fn current() -> Option<Handle> {
    Handle::try_current().ok()
}
