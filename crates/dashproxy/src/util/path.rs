use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::dash::url::is_absolute_url;

/// Map a rendered segment address to a path relative to the output directory.
///
/// The query string is dropped, an absolute URL keeps only its path, and any component that
/// could escape the output directory (`..`, root, prefix) is skipped.
pub fn output_path(address: &str) -> PathBuf {
    let without_query = address.split(['?', '#']).next().unwrap_or_default();

    let path = if is_absolute_url(without_query) {
        Url::parse(without_query)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| without_query.to_string())
    } else {
        without_query.to_string()
    };

    Path::new(&path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// `manifest.mpd` => `manifest.3.mpd`
pub fn numbered(path: &Path, n: u64) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{n}.{ext}")),
        None => path.with_extension(n.to_string()),
    }
}
