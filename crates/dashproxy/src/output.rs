pub mod file;
pub mod memory;

use std::{future::Future, path::Path};

use bytes::Bytes;

use crate::error::ProxyResult;

/// Where downloaded segments and manifest snapshots end up.
///
/// Paths are relative to the sink's root and already stripped of query strings.
pub trait OutputSink: Send + Sync {
    /// Write `data` to `path`, creating parent directories and replacing existing content.
    fn persist(&self, path: &Path, data: Bytes) -> impl Future<Output = ProxyResult<()>> + Send;

    /// Remove a previously persisted file. Missing files are not an error.
    fn remove(&self, path: &Path) -> impl Future<Output = ProxyResult<()>> + Send;

    /// Hint a location for the persisted files.
    fn location_hint(&self) -> Option<String> {
        None
    }
}
