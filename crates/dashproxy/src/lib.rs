pub mod dash;
pub mod error;
pub mod fetch;
pub mod output;
pub mod util;

pub use dash::session::{ManifestSession, SessionOptions};
pub use error::{ProxyError, ProxyResult};
pub use fetch::{Fetcher, HttpFetcher};
pub use output::{file::FileOutput, memory::MemoryOutput, OutputSink};
pub use util::{
    http::HttpClient,
    retry::{RetryPolicy, Sleeper, TokioSleeper},
};
