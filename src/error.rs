//! Error type shared by every Edison subsystem.
//!
//! Transport, Decode, Stream and Cancelled are the outcomes a request can end
//! with. The rest are local checks that fail before anything goes on the wire.

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection failure, or the backend answered with a non-success status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The one-shot analyze body could not be parsed.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The tutorial stream broke after it had started.
    #[error("stream error: {0}")]
    Stream(String),

    /// The user stopped the stream. Not a failure.
    #[error("stream cancelled")]
    Cancelled,

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not a supported image: {0}")]
    InvalidImage(String),

    #[error("no image selected")]
    NoFile,

    #[error("no analysis result yet, analyze an image first")]
    NoAnalysis,

    #[error("no project idea selected")]
    NoSelection,

    #[error("'{0}' is not one of the current project ideas")]
    UnknownIdea(String),

    /// An analyze result was handed back with no analysis in flight.
    #[error("no analysis is in flight")]
    NotAnalyzing,

    /// Another fetch or stream is already in flight.
    #[error("busy: {0}")]
    Busy(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for user-initiated stops, which callers should not report as failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
