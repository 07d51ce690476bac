//! HTTP client for the Edison backend.
//!
//! Two calls:
//! - analyze:  image → components + project ideas (one request/response)
//! - tutorial: image + chosen idea → streamed tutorial chunks
//!
//! Neither retries. Every failure is handed back to the caller, which may
//! simply call again.

use super::stream::{ByteStream, TutorialStream};
use super::types::{AnalysisResult, AnalyzeResponse};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::upload::ImageUpload;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the chosen idea on the tutorial request.
pub const IDEA_FIELD: &str = "project_idea";

/// What the session pipeline needs from a backend.
///
/// Implemented by [`BackendClient`] over HTTP; tests plug in fakes.
#[allow(async_fn_in_trait)]
pub trait TutorialBackend {
    async fn analyze(&self, upload: &ImageUpload) -> Result<AnalysisResult>;

    async fn open_tutorial_stream(
        &self,
        upload: &ImageUpload,
        idea: &str,
        cancel: CancellationToken,
    ) -> Result<TutorialStream>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: Config,
}

impl BackendClient {
    pub fn new(config: Config) -> Result<Self> {
        // No overall timeout: a tutorial can stream for minutes.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("edison/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn image_part(upload: &ImageUpload) -> Result<Part> {
        Part::bytes(upload.bytes().to_vec())
            .file_name(upload.file_name().to_string())
            .mime_str(upload.mime_type())
            .map_err(|e| Error::InvalidImage(e.to_string()))
    }

    async fn post(&self, url: &str, form: Form) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[API] {} returned {}: {}", url, status, super::preview(&body));
            return Err(Error::Transport(format!("backend returned {}", status)));
        }
        Ok(response)
    }
}

impl TutorialBackend for BackendClient {
    async fn analyze(&self, upload: &ImageUpload) -> Result<AnalysisResult> {
        let url = self.config.analyze_url();
        log::info!("[ANALYZE] Uploading {} ({} bytes)", upload.file_name(), upload.len());
        let start = std::time::Instant::now();

        let form = Form::new().part(FILE_FIELD, Self::image_part(upload)?);
        let response = self.post(&url, form).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let parsed: AnalyzeResponse = serde_json::from_slice(&body).map_err(|e| {
            log::warn!(
                "[ANALYZE] Unparseable body: {} (raw: {})",
                e,
                super::preview(&String::from_utf8_lossy(&body))
            );
            Error::Decode(e.to_string())
        })?;
        let result = AnalysisResult::from(parsed);

        log::info!(
            "[ANALYZE] {} components, {} ideas in {}ms",
            result.components.len(),
            result.ideas.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    async fn open_tutorial_stream(
        &self,
        upload: &ImageUpload,
        idea: &str,
        cancel: CancellationToken,
    ) -> Result<TutorialStream> {
        let url = self.config.tutorial_url();
        log::info!("[STREAM] Requesting tutorial for '{}'", idea);
        let start = std::time::Instant::now();

        let form = Form::new()
            .part(FILE_FIELD, Self::image_part(upload)?)
            .text(IDEA_FIELD, idea.to_string());

        // Cancel can land while we are still waiting for headers.
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.post(&url, form) => response?,
        };
        log::info!("[STREAM] TTFB: {}ms", start.elapsed().as_millis());

        let body: ByteStream = response
            .bytes_stream()
            .map(|read| read.map_err(|e| Error::Stream(e.to_string())))
            .boxed();
        Ok(TutorialStream::new(body, cancel))
    }
}
