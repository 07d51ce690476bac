//! Edison: photograph your electronic components, get project ideas, and
//! watch a step-by-step tutorial stream in.
//!
//! No business logic lives here, only module declarations and re-exports.
//!
//! Modules:
//!   - api       backend client, tutorial stream, incremental decoder
//!   - config    env / config file / defaults
//!   - pipeline  multi-step orchestration (analyze, refresh, stream)
//!   - session   per-stream session ids and cancel handles
//!   - state     the workspace state machine the UI drives
//!   - tutorial  the growing tutorial text
//!   - upload    the image being analyzed

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod state;
pub mod tutorial;
pub mod upload;

pub use api::{AnalysisResult, BackendClient, TutorialBackend, TutorialChunk, TutorialStream};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{analyze_image, refresh_ideas, run_tutorial_stream, stream_tutorial};
pub use session::{CancelHandle, SessionId};
pub use state::{Phase, StreamOutcome, Workspace};
pub use tutorial::TutorialBuffer;
pub use upload::ImageUpload;
