use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{bail, Context};
use clap::Parser;
use dashproxy::{
    FileOutput, HttpClient, HttpFetcher, ManifestSession, RetryPolicy, SessionOptions,
};
use fake_user_agent::get_chrome_rua;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, COOKIE, USER_AGENT},
    Client, Url,
};

#[derive(Parser, Debug, Clone)]
#[clap(version, about = "Mirror a MPEG-DASH stream, its MPD and segments to a directory")]
pub struct DashProxyArgs {
    /// URL of the MPD
    mpd: Url,

    /// Debug output
    #[clap(short, long)]
    verbose: bool,

    /// Keep downloaded segments after they leave the live window
    #[clap(short, long)]
    download: bool,

    /// Output directory
    #[clap(short, long, default_value = ".", env = "DASH_PROXY_OUTPUT")]
    output: PathBuf,

    /// File with one `KEY=VALUE` cookie per line
    #[clap(short, long)]
    cookie_jar: Option<PathBuf>,

    /// HTTP header sent with every request, in `KEY=VALUE` form
    #[clap(long = "http-header")]
    http_headers: Vec<String>,

    /// HTTP cookie sent with every request, in `KEY=VALUE` form
    #[clap(long = "http-cookie")]
    http_cookies: Vec<String>,

    /// Also save every fetched MPD as `manifest.<n>.mpd`
    #[clap(long)]
    save_individual_mpds: bool,

    /// Seconds to wait before fetching the MPD again after a failure
    #[clap(long, default_value = "10")]
    retry_interval: u64,

    /// Give up after this many failed retries of the MPD. Retries forever when omitted.
    #[clap(long)]
    max_retries: Option<u32>,

    /// Multiply the retry interval by this factor after every failed MPD fetch
    #[clap(long, default_value = "1.0")]
    retry_backoff: f64,

    /// Upper bound in seconds for the retry interval when backing off
    #[clap(long, default_value = "300")]
    max_retry_interval: u64,

    /// Lower bound in seconds for the delay between two MPD refreshes
    #[clap(long, default_value = "1")]
    min_refresh_interval: u64,
}

fn split_pair(pair: &str) -> anyhow::Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => bail!("Expected KEY=VALUE, got {pair:?}"),
    }
}

impl DashProxyArgs {
    fn cookies(&self) -> anyhow::Result<Vec<(String, String)>> {
        let mut cookies = Vec::new();

        if let Some(jar) = &self.cookie_jar {
            let content = std::fs::read_to_string(jar)
                .with_context(|| format!("Cannot read cookie jar {}", jar.display()))?;
            for line in content.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let (key, value) = split_pair(line)?;
                cookies.push((key.to_string(), value.to_string()));
            }
        }

        for cookie in &self.http_cookies {
            let (key, value) = split_pair(cookie)?;
            cookies.retain(|(k, _)| k != key);
            cookies.push((key.to_string(), value.to_string()));
        }

        Ok(cookies)
    }

    fn client(&self) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();

        let cookies = self.cookies()?;
        if !cookies.is_empty() {
            let cookie = cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert(COOKIE, HeaderValue::from_str(&cookie)?);
        }

        for header in &self.http_headers {
            let (key, value) = split_pair(header)?;
            headers.insert(HeaderName::from_str(key)?, HeaderValue::from_str(value)?);
        }

        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_str(get_chrome_rua())?);
        }

        Ok(HttpClient::new(Client::builder().default_headers(headers))?)
    }

    fn options(&self) -> SessionOptions {
        SessionOptions {
            save_manifests: self.save_individual_mpds,
            retain_segments: self.download,
            retry: RetryPolicy::fixed(Duration::from_secs(self.retry_interval))
                .with_max_attempts(self.max_retries.map(|r| r.saturating_add(1)))
                .with_backoff(
                    self.retry_backoff,
                    Duration::from_secs(self.max_retry_interval),
                ),
            min_refresh_interval: Duration::from_secs(self.min_refresh_interval),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = DashProxyArgs::parse();

    let default_directive = if args.verbose {
        "dashproxy=debug,dash_proxy=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = args.client()?;
    let output = FileOutput::new(&args.output);

    let mut session = ManifestSession::new(
        args.mpd.clone(),
        HttpFetcher::new(client.clone()),
        output,
        args.options(),
    );
    session.run().await?;

    tracing::debug!(
        "Finished after {} refreshes, {} cookies in store",
        session.refresh_count(),
        client.cookie_count()
    );

    Ok(())
}
