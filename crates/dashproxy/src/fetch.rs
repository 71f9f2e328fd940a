use std::future::Future;

use bytes::Bytes;
use reqwest::header::ACCEPT;
use url::Url;

use crate::{
    error::{ProxyError, ProxyResult},
    util::http::HttpClient,
};

const MPD_ACCEPT: &str = "application/dash+xml,video/vnd.mpeg.dash.mpd";

/// GET a resource and return its body. Any status outside `200..300` is an error.
pub trait Fetcher: Send + Sync {
    fn fetch_manifest(&self, url: &Url) -> impl Future<Output = ProxyResult<Bytes>> + Send;

    fn fetch(&self, url: &Url) -> impl Future<Output = ProxyResult<Bytes>> + Send;
}

#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    async fn get(&self, url: &Url, accept: &str) -> ProxyResult<Bytes> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            if let Ok(body) = response.text().await {
                tracing::debug!("Error body: {body}");
            }
            return Err(ProxyError::HttpError(status));
        }

        Ok(response.bytes().await?)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_manifest(&self, url: &Url) -> ProxyResult<Bytes> {
        self.get(url, MPD_ACCEPT).await
    }

    async fn fetch(&self, url: &Url) -> ProxyResult<Bytes> {
        self.get(url, "*/*").await
    }
}
