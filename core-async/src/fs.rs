//! Async filesystem helpers re-exported from the underlying runtime.

pub use tokio::fs::{
    copy, create_dir_all, metadata, read, read_dir, remove_file, rename, write, DirEntry, File,
};
