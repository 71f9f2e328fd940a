use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::OutputSink;
use crate::error::ProxyResult;

pub struct FileOutput {
    output_dir: PathBuf,
}

impl FileOutput {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl OutputSink for FileOutput {
    async fn persist(&self, path: &Path, data: Bytes) -> ProxyResult<()> {
        let dest = self.output_dir.join(path);
        if let Some(parent) = dest.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&dest, &data).await?;
        tracing::trace!(path = %dest.display(), size = data.len(), "written");
        Ok(())
    }

    async fn remove(&self, path: &Path) -> ProxyResult<()> {
        let dest = self.output_dir.join(path);
        match tokio::fs::remove_file(&dest).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn location_hint(&self) -> Option<String> {
        Some(self.output_dir.display().to_string())
    }
}
