use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use dash_mpd::MPD;
use url::Url;

use super::{
    address::RepresentationAddress,
    locator::ManifestLocator,
    template::Template,
    timeline::{SegmentTimelineExpander, TimelineEntry},
    url::merge_baseurls,
};
use crate::{
    error::{ProxyError, ProxyResult},
    fetch::Fetcher,
    output::OutputSink,
    util::path::output_path,
};

/// One file to fetch: where it comes from and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// The address as written in the MPD after template substitution
    pub relative_path: String,
    pub url: Url,
    /// Relative to the output root
    pub destination: PathBuf,
}

impl DownloadRequest {
    pub fn new(relative_path: String, base_url: &Url) -> ProxyResult<Self> {
        let url = merge_baseurls(base_url, &relative_path)?;
        let destination = output_path(&relative_path);
        Ok(Self {
            relative_path,
            url,
            destination,
        })
    }
}

/// Download state of a single representation, kept across MPD refreshes.
pub struct RepresentationSession {
    address: RepresentationAddress,
    /// `Representation@id` seen when the session was created
    representation_id: Option<String>,

    base_url: Option<Url>,
    initialization_downloaded: bool,
    single_file_downloaded: bool,
    /// Media segments persisted and still described by the latest timeline, by source URL
    downloaded: BTreeMap<Url, PathBuf>,
    retain_segments: bool,
}

impl RepresentationSession {
    pub fn new(address: RepresentationAddress, representation_id: Option<String>) -> Self {
        Self {
            address,
            representation_id,
            base_url: None,
            initialization_downloaded: false,
            single_file_downloaded: false,
            downloaded: BTreeMap::new(),
            retain_segments: false,
        }
    }

    /// Keep segment files on disk after they leave the timeline window.
    pub fn with_retain_segments(mut self, retain_segments: bool) -> Self {
        self.retain_segments = retain_segments;
        self
    }

    pub fn representation_id(&self) -> Option<&str> {
        self.representation_id.as_deref()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn initialization_downloaded(&self) -> bool {
        self.initialization_downloaded
    }

    /// Download whatever the current MPD describes for this representation.
    ///
    /// Failed downloads are logged and skipped. An error is only returned when the MPD does not
    /// have the shape this representation needs, in which case nothing else is fetched for it.
    pub async fn handle_mpd<F, O>(
        &mut self,
        mpd: &MPD,
        mpd_base_url: &Url,
        fetcher: &F,
        output: &O,
    ) -> ProxyResult<()>
    where
        F: Fetcher,
        O: OutputSink,
    {
        self.base_url = Some(mpd_base_url.clone());

        let locator = ManifestLocator::new(mpd);
        let representation = locator.representation(&self.address)?;
        let Some(segment_template) = locator.segment_template(&self.address)? else {
            return self
                .download_single(&locator, mpd_base_url, fetcher, output)
                .await;
        };

        // Representation@BaseURL applies to the templated addresses too
        let base_url = match locator.base_url(&self.address)? {
            Some(base) => merge_baseurls(mpd_base_url, &base.base)?,
            None => mpd_base_url.clone(),
        };
        let id = representation.id.as_deref();

        if let Some(initialization) = segment_template.initialization.as_deref() {
            if !self.initialization_downloaded {
                let path = Template::new()
                    .with_representation_id(id)
                    .resolve(initialization)?;
                let request = DownloadRequest::new(path, &base_url)?;
                // never retried once requested, even when this download fails
                self.initialization_downloaded = true;
                if let Err(e) = download(&request, fetcher, output).await {
                    tracing::error!("Cannot download initialization segment: {e}");
                }
            }
        }

        let Some(timeline) = locator.segment_timeline(&self.address)? else {
            tracing::debug!("No SegmentTimeline, skipping media segments");
            return Ok(());
        };
        let media = segment_template.media.as_deref().ok_or_else(|| {
            ProxyError::MpdParsing("Missing media url template in SegmentTemplate".to_string())
        })?;

        let entries = TimelineEntry::from_timeline(timeline);
        let start_number = segment_template.startNumber.unwrap_or(1);

        // Render everything first so that a broken template fails before any download
        let requests = SegmentTimelineExpander::with_start_number(&entries, start_number)
            .map(|segment| {
                let path = Template::new()
                    .with_representation_id(id)
                    .with_segment(segment)
                    .resolve(media)?;
                DownloadRequest::new(path, &base_url)
            })
            .collect::<ProxyResult<Vec<_>>>()?;

        let window: BTreeSet<Url> = requests.iter().map(|r| r.url.clone()).collect();
        for request in requests {
            if self.downloaded.contains_key(&request.url) {
                tracing::debug!("{} already downloaded", request.relative_path);
                continue;
            }

            match download(&request, fetcher, output).await {
                Ok(()) => {
                    self.downloaded.insert(request.url, request.destination);
                }
                Err(e) => tracing::error!("{e}"),
            }
        }

        self.forget_outdated(&window, output).await;
        Ok(())
    }

    async fn download_single<F, O>(
        &mut self,
        locator: &ManifestLocator<'_>,
        mpd_base_url: &Url,
        fetcher: &F,
        output: &O,
    ) -> ProxyResult<()>
    where
        F: Fetcher,
        O: OutputSink,
    {
        if self.single_file_downloaded {
            tracing::debug!("Single file already downloaded");
            return Ok(());
        }

        let Some(base) = locator.base_url(&self.address)? else {
            return Err(ProxyError::MpdParsing(
                "Representation has neither SegmentTemplate nor BaseURL".to_string(),
            ));
        };
        let request = DownloadRequest::new(base.base.trim().to_string(), mpd_base_url)?;
        match download(&request, fetcher, output).await {
            Ok(()) => self.single_file_downloaded = true,
            Err(e) => tracing::error!("{e}"),
        }
        Ok(())
    }

    /// Drop segments the timeline no longer describes.
    async fn forget_outdated<O>(&mut self, window: &BTreeSet<Url>, output: &O)
    where
        O: OutputSink,
    {
        let outdated: Vec<Url> = self
            .downloaded
            .keys()
            .filter(|url| !window.contains(*url))
            .cloned()
            .collect();
        for url in outdated {
            let Some(path) = self.downloaded.remove(&url) else {
                continue;
            };
            // segments differing only in their query share one file
            if self.retain_segments || self.downloaded.values().any(|p| *p == path) {
                continue;
            }

            tracing::debug!("Removing {}", path.display());
            if let Err(e) = output.remove(&path).await {
                tracing::warn!("Failed to remove {}: {e}", path.display());
            }
        }
    }
}

async fn download<F, O>(request: &DownloadRequest, fetcher: &F, output: &O) -> ProxyResult<()>
where
    F: Fetcher,
    O: OutputSink,
{
    tracing::info!("Requesting {} from {}", request.relative_path, request.url);
    let data = fetcher
        .fetch(&request.url)
        .await
        .map_err(|e| ProxyError::SegmentFetch {
            url: request.url.to_string(),
            source: Box::new(e),
        })?;
    output.persist(&request.destination, data).await
}
