use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use bytes::Bytes;
use dash_mpd::MPD;
use tracing::Instrument;
use url::Url;

use super::{
    address::RepresentationAddress, locator::ManifestLocator,
    representation::RepresentationSession, url::manifest_base_url,
};
use crate::{
    error::{ProxyError, ProxyResult},
    fetch::Fetcher,
    output::OutputSink,
    util::{
        path::numbered,
        retry::{RetryPolicy, Sleeper, TokioSleeper},
    },
};

pub const MANIFEST_FILE_NAME: &str = "manifest.mpd";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Also write `manifest.<n>.mpd` for every refresh
    pub save_manifests: bool,
    /// Keep segment files after they leave the live window
    pub retain_segments: bool,
    pub retry: RetryPolicy,
    /// Lower bound for the delay derived from `MPD@minimumUpdatePeriod`
    pub min_refresh_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            save_manifests: false,
            retain_segments: false,
            retry: RetryPolicy::default(),
            min_refresh_interval: Duration::from_secs(1),
        }
    }
}

/// ┌──────────────┐   MPD    ┌────────────────────┐  per representation  ┌────────────────────────┐
/// │              ├─────────►│                    ├─────────────────────►│                        │
/// │ MPD endpoint │          │   ManifestSession  │                      │  RepresentationSession │
/// │              │◄─────────┤                    │                      │                        │
/// └──────────────┘ refresh  └─────────┬──────────┘                      └───────────┬────────────┘
///                                     │ manifest.mpd                                │ segments
///                                     ▼                                             ▼
///                              ┌─────────────┐                               ┌─────────────┐
///                              │ OutputSink  │◄──────────────────────────────┤   Fetcher   │
///                              └─────────────┘                               └─────────────┘
///
/// Every step runs one after another: a refresh only starts once all downloads of the previous
/// cycle are finished.
pub struct ManifestSession<F, O, S = TokioSleeper> {
    manifest_url: Url,
    fetcher: F,
    output: O,
    sleeper: S,
    options: SessionOptions,

    sessions: HashMap<RepresentationAddress, RepresentationSession>,
    refresh_count: u64,
}

impl<F, O> ManifestSession<F, O>
where
    F: Fetcher,
    O: OutputSink,
{
    pub fn new(manifest_url: Url, fetcher: F, output: O, options: SessionOptions) -> Self {
        Self::with_sleeper(manifest_url, fetcher, output, options, TokioSleeper)
    }
}

impl<F, O, S> ManifestSession<F, O, S>
where
    F: Fetcher,
    O: OutputSink,
    S: Sleeper,
{
    pub fn with_sleeper(
        manifest_url: Url,
        fetcher: F,
        output: O,
        options: SessionOptions,
        sleeper: S,
    ) -> Self {
        Self {
            manifest_url,
            fetcher,
            output,
            sleeper,
            options,
            sessions: HashMap::new(),
            refresh_count: 0,
        }
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn sessions(&self) -> impl Iterator<Item = &RepresentationSession> {
        self.sessions.values()
    }

    pub fn session(&self, address: &RepresentationAddress) -> Option<&RepresentationSession> {
        self.sessions.get(address)
    }

    /// Run until the MPD turns out to be static, or until fetching it is given up.
    pub async fn run(&mut self) -> ProxyResult<()> {
        tracing::info!(
            "Running dash proxy for stream {}. Output goes in {}",
            self.manifest_url,
            self.output.location_hint().as_deref().unwrap_or("memory")
        );

        while let Some(delay) = self.run_cycle().await? {
            tracing::debug!("Refreshing MPD in {delay:?}");
            self.sleeper.sleep(delay).await;
        }

        Ok(())
    }

    /// Fetch and handle the MPD once. Returns the delay before the next cycle for dynamic MPDs.
    pub async fn run_cycle(&mut self) -> ProxyResult<Option<Duration>> {
        self.refresh_count += 1;

        let (raw, mpd) = self.fetch_mpd().await?;
        self.handle_mpd(&mpd).await;
        self.write_output_mpd(raw).await?;

        match mpd.minimumUpdatePeriod {
            Some(minimum_update_period) => {
                Ok(Some(minimum_update_period.max(self.options.min_refresh_interval)))
            }
            None => {
                tracing::info!("VOD MPD. Nothing more to do. Stopping...");
                Ok(None)
            }
        }
    }

    async fn fetch_mpd(&self) -> ProxyResult<(Bytes, MPD)> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let error = match self.fetcher.fetch_manifest(&self.manifest_url).await {
                Ok(raw) => match std::str::from_utf8(&raw) {
                    Ok(text) => match dash_mpd::parse(text) {
                        Ok(mpd) => return Ok((raw, mpd)),
                        Err(e) => ProxyError::from(e),
                    },
                    Err(e) => ProxyError::MpdParsing(e.to_string()),
                },
                Err(e) => e,
            };

            let Some(delay) = self.options.retry.delay_after(attempts) else {
                tracing::error!("Cannot GET the MPD: {error}. Giving up after {attempts} attempts");
                return Err(ProxyError::ManifestFetch { attempts });
            };
            tracing::warn!(
                "Cannot GET the MPD: {error}. Retrying after {}s",
                delay.as_secs_f64()
            );
            self.sleeper.sleep(delay).await;
        }
    }

    async fn handle_mpd(&mut self, mpd: &MPD) {
        let base_url = match manifest_base_url(mpd, &self.manifest_url) {
            Ok(base_url) => base_url,
            Err(e) => {
                tracing::error!("Cannot resolve base url of the MPD: {e}");
                return;
            }
        };

        if mpd.periods.is_empty() {
            tracing::warn!("MPD has no period");
            return;
        }
        tracing::debug!("Found {} periods, choosing the 1st one", mpd.periods.len());

        let locator = ManifestLocator::new(mpd);
        for address in locator.addresses(0) {
            let representation_id = locator
                .representation(&address)
                .ok()
                .and_then(|r| r.id.clone());
            tracing::debug!(
                "Found representation with id {}",
                representation_id.as_deref().unwrap_or("UKN")
            );

            let span = tracing::info_span!("representation", %address);
            if let Err(e) = self
                .ensure_downloader(mpd, &base_url, address, representation_id)
                .instrument(span)
                .await
            {
                tracing::error!("Skipping {address}: {e}");
            }
        }
    }

    /// Create the session of `address` on first sight and drive it against `mpd`.
    async fn ensure_downloader(
        &mut self,
        mpd: &MPD,
        base_url: &Url,
        address: RepresentationAddress,
        representation_id: Option<String>,
    ) -> ProxyResult<()> {
        let known = self.sessions.get(&address).map(|s| s.representation_id());
        match known {
            Some(known_id) if known_id == representation_id.as_deref() => {
                tracing::debug!("A downloader for {address} already started");
            }
            Some(known_id) => {
                tracing::warn!(
                    "{address} changed from {} to {}, starting over",
                    known_id.unwrap_or("UKN"),
                    representation_id.as_deref().unwrap_or("UKN")
                );
                self.insert_session(address, representation_id);
            }
            None => {
                tracing::info!("Starting a downloader for {address}");
                self.insert_session(address, representation_id);
            }
        }

        let Some(session) = self.sessions.get_mut(&address) else {
            return Ok(());
        };
        session
            .handle_mpd(mpd, base_url, &self.fetcher, &self.output)
            .await
    }

    fn insert_session(&mut self, address: RepresentationAddress, representation_id: Option<String>) {
        let session = RepresentationSession::new(address, representation_id)
            .with_retain_segments(self.options.retain_segments);
        self.sessions.insert(address, session);
    }

    async fn write_output_mpd(&self, raw: Bytes) -> ProxyResult<()> {
        tracing::info!("Writing the update MPD file");
        let path = Path::new(MANIFEST_FILE_NAME);

        if self.options.save_manifests {
            let numbered: PathBuf = numbered(path, self.refresh_count);
            self.output.persist(&numbered, raw.clone()).await?;
        }
        self.output.persist(path, raw).await
    }
}
