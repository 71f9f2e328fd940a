use dash_mpd::MPD;
use url::Url;

use crate::ProxyResult;

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

/// The directory part of `url`, keeping its query string.
///
/// `http://h/a/b/manifest.mpd?sig=ab/cd` => `http://h/a/b/?sig=ab/cd`
pub fn directory_of(url: &Url) -> ProxyResult<Url> {
    let mut directory = url.join("./")?;
    directory.set_query(url.query());
    Ok(directory)
}

/// Base address every relative segment address of the MPD is resolved against.
///
/// 1. the directory of the URL the MPD was fetched from
/// 2. replaced by the directory of `MPD.Location` if present
/// 3. an absolute `MPD.BaseURL` replaces it once more, a relative one is resolved against it
///
/// The query of the URL that decided the base stays on it and is inherited by every segment.
pub fn manifest_base_url(mpd: &MPD, manifest_url: &Url) -> ProxyResult<Url> {
    let mut base = directory_of(manifest_url)?;

    if let Some(location) = mpd.locations.first() {
        let location = location.url.trim();
        if !location.is_empty() {
            base = directory_of(&manifest_url.join(location)?)?;
        }
    }

    if let Some(base_url) = mpd.base_url.first() {
        let base_url = base_url.base.trim();
        if is_absolute_url(base_url) {
            base = directory_of(&Url::parse(base_url)?)?;
        } else if !base_url.is_empty() {
            base = merge_baseurls(&base, base_url)?;
        }
    }

    Ok(base)
}

pub(crate) fn merge_baseurls(current: &Url, new: &str) -> ProxyResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // The query of the current URL is carried over unless the new URL has its own.
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=secret, /video42.mp4) =>
        //   https://example.com/video42.mp4?auth=secret
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=old, /video42.mp4?auth=new) =>
        //   https://example.com/video42.mp4?auth=new
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}
