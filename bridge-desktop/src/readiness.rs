//! Directory-backed file readiness provider
//!
//! Models a synced folder on desktop: a `remote_root` stands in for the
//! cloud store (for example a mounted network share) and `local_root` holds
//! the files materialized on this machine. Files are copied down on demand
//! through a `.part` file and renamed into place, so a file at its final
//! path is always complete.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileHandle, FileReadinessProvider},
};
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

/// Extensions treated as audio when listing.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "flac", "wav", "ogg", "opus"];

const COPY_CHUNK_SIZE: usize = 256 * 1024;

pub struct DirectoryFileProvider {
    local_root: PathBuf,
    remote_root: Option<PathBuf>,
    /// Fraction copied of in-flight downloads.
    progress: RwLock<HashMap<FileHandle, f32>>,
}

impl DirectoryFileProvider {
    /// Provider over files that are already local.
    pub fn new(local_root: impl Into<PathBuf>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: None,
            progress: RwLock::new(HashMap::new()),
        }
    }

    /// Default location: the user's music directory.
    pub fn in_music_dir() -> Result<Self> {
        dirs::audio_dir()
            .map(Self::new)
            .ok_or_else(|| BridgeError::NotAvailable("No music directory on this system".into()))
    }

    /// Files missing locally are copied down from `remote_root`.
    pub fn with_remote_root(mut self, remote_root: impl Into<PathBuf>) -> Self {
        self.remote_root = Some(remote_root.into());
        self
    }

    fn remote_path(&self, handle: &FileHandle) -> Option<PathBuf> {
        self.remote_root
            .as_ref()
            .map(|root| root.join(handle.path()))
    }

    fn set_progress(&self, handle: &FileHandle, value: Option<f32>) {
        if let Ok(mut progress) = self.progress.write() {
            match value {
                Some(v) => progress.insert(handle.clone(), v),
                None => progress.remove(handle),
            };
        }
    }

    async fn copy_down(&self, handle: &FileHandle, source: &Path) -> Result<()> {
        let target = self.local_path(handle);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = target.with_extension(format!(
            "{}.part",
            handle.extension().unwrap_or_default()
        ));

        let mut reader = fs::File::open(source).await?;
        let total = reader.metadata().await?.len().max(1);
        let mut writer = fs::File::create(&partial).await?;
        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
        let mut copied = 0u64;

        self.set_progress(handle, Some(0.0));
        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            copied += read as u64;
            self.set_progress(handle, Some((copied as f32 / total as f32).min(0.99)));
        }
        writer.flush().await?;
        drop(writer);

        fs::rename(&partial, &target).await?;
        Ok(())
    }
}

/// Recursively collects audio files under `root` as `/`-separated relative
/// paths.
async fn collect_audio_files(root: &Path, out: &mut BTreeSet<String>) -> Result<()> {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let handle = FileHandle::new(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
            if handle
                .extension()
                .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
            {
                out.insert(handle.path().to_string());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl FileReadinessProvider for DirectoryFileProvider {
    #[instrument(skip(self))]
    async fn list_available_resources(&self) -> Result<Vec<FileHandle>> {
        let mut paths = BTreeSet::new();
        collect_audio_files(&self.local_root, &mut paths).await?;
        if let Some(remote_root) = &self.remote_root {
            collect_audio_files(remote_root, &mut paths).await?;
        }

        info!(count = paths.len(), "Listed audio files");
        Ok(paths.into_iter().map(FileHandle::new).collect())
    }

    #[instrument(skip(self), fields(file = %handle))]
    async fn ensure_available(&self, handle: &FileHandle) -> Result<()> {
        if self.is_available(handle) {
            return Ok(());
        }

        let source = self
            .remote_path(handle)
            .filter(|path| path.is_file())
            .ok_or_else(|| BridgeError::NotFound(handle.to_string()))?;

        debug!(source = ?source, "Copying file down");
        let result = self.copy_down(handle, &source).await;
        self.set_progress(handle, None);

        match result {
            Ok(()) => {
                info!("File available");
                Ok(())
            }
            Err(BridgeError::Io(e)) => {
                warn!(error = %e, "Copy interrupted");
                Err(BridgeError::NotReady(format!("{}: {}", handle, e)))
            }
            Err(e) => Err(e),
        }
    }

    fn is_available(&self, handle: &FileHandle) -> bool {
        self.local_path(handle).is_file()
    }

    fn progress(&self, handle: &FileHandle) -> f32 {
        if self.is_available(handle) {
            return 1.0;
        }
        self.progress
            .read()
            .ok()
            .and_then(|progress| progress.get(handle).copied())
            .unwrap_or(0.0)
    }

    fn local_path(&self, handle: &FileHandle) -> PathBuf {
        self.local_root.join(handle.path())
    }
}
