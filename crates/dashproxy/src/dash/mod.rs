//! # MPEG-DASH Proxy
//!
//! Mirrors a DASH stream to an output location: the MPD itself is written as `manifest.mpd`
//! and every segment it references is fetched to the same relative path it has under the
//! MPD base URL, so the output directory can be served as-is.
//!
//! ## Static MPD
//!
//! An MPD without `MPD@minimumUpdatePeriod` is handled exactly once. All initialization and
//! media segments of the first Period are downloaded, then [`session::ManifestSession::run`]
//! returns.
//!
//! ## Dynamic MPD
//!
//! With `MPD@minimumUpdatePeriod` present the MPD is fetched again after that period.
//!
//! *   **Per-representation state:** every `(period, adaptation set, representation)` position
//!     gets one [`representation::RepresentationSession`], kept across refreshes. It downloads
//!     the initialization segment once and skips media segments it already fetched.
//! *   **Sliding window:** segments that left the `SegmentTimeline` are removed from the output,
//!     unless segments are retained.
//! *   **Failures:** a failed MPD fetch is retried according to [`crate::RetryPolicy`]. A failed
//!     segment is logged and retried on the next refresh.
//!
//! Only `SegmentTemplate` with `SegmentTimeline` addressing is expanded. Representations
//! without a template are treated as a single file at their `BaseURL`.
pub mod address;
pub mod locator;
pub mod representation;
pub mod session;
pub mod template;
pub mod timeline;
pub mod url;
