use thiserror::Error;

use crate::dash::address::RepresentationAddress;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{address} does not exist: {level} index out of range (len {len})")]
    AddressOutOfRange {
        address: RepresentationAddress,
        level: &'static str,
        len: usize,
    },

    #[error("Template marker ${marker}$ can not be resolved in {template:?}")]
    UnresolvedMarker { marker: String, template: String },

    #[error("Failed to fetch MPD after {attempts} attempts")]
    ManifestFetch { attempts: u32 },

    #[error("Failed to fetch {url}: {source}")]
    SegmentFetch {
        url: String,
        #[source]
        source: Box<ProxyError>,
    },

    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Invalid MPD: {0}")]
    MpdParsing(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    MpdParseError(#[from] dash_mpd::DashMpdError),
}

pub type ProxyResult<T> = Result<T, ProxyError>;
