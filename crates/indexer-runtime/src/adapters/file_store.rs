//! File-backed `ReducerStateStore`.
//!
//! One JSON document per reducer under the data directory. Writes go to a
//! temp file first and are renamed into place, so a crash never leaves a
//! half-written row.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rs_01_reducer_sync::{ReducerState, ReducerStateStore, StoreError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const ROW_EXTENSION: &str = "json";

pub struct FileStateStore {
    dir: PathBuf,
    sync_writes: bool,
}

impl FileStateStore {
    /// Open (creating if needed) the store directory.
    pub async fn open(dir: impl AsRef<Path>, sync_writes: bool) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(io_error)?;
        info!(path = %dir.display(), "Opened file state store");
        Ok(Self { dir, sync_writes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn row_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(row_file_stem(name))
            .with_extension(ROW_EXTENSION)
    }
}

/// Escape a reducer name into a file stem. ASCII alphanumerics and `-` are
/// kept; every other byte, `_` included, becomes `_XX` (uppercase hex), so
/// distinct names never share a file.
fn row_file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02X}"));
        }
    }
    stem
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

async fn read_row(path: &Path) -> Result<Option<ReducerState>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display()))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(err)),
    }
}

#[async_trait]
impl ReducerStateStore for FileStateStore {
    async fn load(&self, name: &str) -> Result<Option<ReducerState>, StoreError> {
        read_row(&self.row_path(name)).await
    }

    async fn load_all(&self) -> Result<Vec<ReducerState>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_error)?;
        let mut rows = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ROW_EXTENSION) {
                continue;
            }
            if let Some(row) = read_row(&path).await? {
                rows.push(row);
            }
        }

        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn save(&self, state: &ReducerState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.row_path(&state.name);
        let temp_path = path.with_extension("tmp");

        let mut file = tokio::fs::File::create(&temp_path).await.map_err(io_error)?;
        file.write_all(&bytes).await.map_err(io_error)?;
        if self.sync_writes {
            file.sync_all().await.map_err(io_error)?;
        }
        drop(file);

        tokio::fs::rename(&temp_path, &path).await.map_err(io_error)?;
        debug!(reducer = %state.name, path = %path.display(), "Reducer state written");
        Ok(())
    }
}
