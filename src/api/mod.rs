//! Backend domain: analyze + streamed tutorial.
//!
//! Public API for talking to the Edison backend.
//! External code should only use the items exported here.
//!
//!   - client.rs    reqwest client + `TutorialBackend` trait
//!   - stream.rs    cancellable `TutorialStream`
//!   - streaming.rs incremental chunk decoder (NDJSON / SSE / concatenated)
//!   - types.rs     `AnalysisResult`, `TutorialChunk`

mod client;
mod stream;
pub mod streaming;
pub mod types;

pub use client::{BackendClient, TutorialBackend, FILE_FIELD, IDEA_FIELD};
pub use stream::{ByteStream, TutorialStream};
pub use streaming::ChunkDecoder;
pub use types::{AnalysisResult, TutorialChunk};

/// First 200 characters of a payload, for log lines.
pub(crate) fn preview(s: &str) -> &str {
    match s.char_indices().nth(200) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
