use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use bytes::Bytes;

use super::OutputSink;
use crate::error::ProxyResult;

/// Keeps everything in memory. Cloning shares the underlying storage.
#[derive(Clone, Default)]
pub struct MemoryOutput {
    files: Arc<Mutex<BTreeMap<PathBuf, Bytes>>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(path.as_ref()).cloned())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl OutputSink for MemoryOutput {
    async fn persist(&self, path: &Path, data: Bytes) -> ProxyResult<()> {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.to_path_buf(), data);
        }
        Ok(())
    }

    async fn remove(&self, path: &Path) -> ProxyResult<()> {
        if let Ok(mut files) = self.files.lock() {
            files.remove(path);
        }
        Ok(())
    }
}
