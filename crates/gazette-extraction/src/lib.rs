//! Text extraction client (C3), fronting a Tika-compatible HTTP service.
//!
//! Grounded on the original's `data_extraction/text_extraction.py`: content
//! sniffing (here via `infer` rather than `python-magic`), the accepted-type
//! table, the `text/plain` short-circuit, the explicit zip rejection, and
//! the `connect=30s, read=300s`, 3-attempt `2^attempt`-second retry policy.
//! The HTTP transport itself is `gazette-reliability`'s `HttpClientService`.

pub mod client;
pub mod mime;

pub use client::ExtractorClient;
pub use mime::{sniff, DetectedMime};
