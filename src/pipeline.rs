//! Multi-step orchestration over the workspace and a backend.
//!
//! - analyze_image:   image → components + ideas, applied to the workspace
//! - refresh_ideas:   the same call again, for a fresh set of ideas
//! - stream_tutorial: selected idea → open stream → fold chunks → outcome

use crate::api::{AnalysisResult, TutorialBackend, TutorialChunk};
use crate::error::{Error, Result};
use crate::state::{StreamOutcome, StreamTicket, Workspace};

/// Run analyze for the workspace's current image and apply the result.
pub async fn analyze_image<'w, B: TutorialBackend>(
    workspace: &'w mut Workspace,
    backend: &B,
) -> Result<&'w AnalysisResult> {
    let upload = workspace.begin_analyze()?;
    let outcome = backend.analyze(&upload).await;
    workspace.finish_analyze(outcome)
}

/// "Refresh ideas" is a re-run of analyze; there is no dedicated endpoint.
pub async fn refresh_ideas<'w, B: TutorialBackend>(
    workspace: &'w mut Workspace,
    backend: &B,
) -> Result<&'w AnalysisResult> {
    log::info!("[PIPELINE] Refreshing project ideas");
    analyze_image(workspace, backend).await
}

/// Start a session for the selected idea and run it to the end.
///
/// `on_chunk` sees every applied chunk together with the tutorial so far.
pub async fn stream_tutorial<B, F>(
    workspace: &mut Workspace,
    backend: &B,
    on_chunk: F,
) -> Result<StreamOutcome>
where
    B: TutorialBackend,
    F: FnMut(&TutorialChunk, &str),
{
    let ticket = workspace.begin_stream()?;
    Ok(run_tutorial_stream(workspace, backend, ticket, on_chunk).await)
}

/// Drive a session obtained from [`Workspace::begin_stream`].
///
/// Split from `stream_tutorial` so callers can grab the ticket's cancel
/// handle before the workspace is borrowed for the duration of the stream.
pub async fn run_tutorial_stream<B, F>(
    workspace: &mut Workspace,
    backend: &B,
    ticket: StreamTicket,
    mut on_chunk: F,
) -> StreamOutcome
where
    B: TutorialBackend,
    F: FnMut(&TutorialChunk, &str),
{
    let start = std::time::Instant::now();
    let session = ticket.session;

    let outcome = match backend
        .open_tutorial_stream(&ticket.upload, &ticket.idea, ticket.token())
        .await
    {
        Err(Error::Cancelled) => StreamOutcome::Cancelled,
        Err(e) => StreamOutcome::Failed(e),
        Ok(mut stream) => {
            let mut chunks = 0usize;
            loop {
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        if !workspace.apply_chunk(session, &chunk) {
                            // Superseded: stop reading for a session nobody displays.
                            break StreamOutcome::Cancelled;
                        }
                        chunks += 1;
                        if chunks == 1 {
                            log::info!("[STREAM] TTFT: {}ms", start.elapsed().as_millis());
                        }
                        on_chunk(&chunk, workspace.tutorial());
                    }
                    Some(Err(Error::Cancelled)) => break StreamOutcome::Cancelled,
                    Some(Err(e)) => break StreamOutcome::Failed(e),
                    None => break StreamOutcome::Completed { chunks },
                }
            }
        }
    };

    log::info!(
        "[STREAM] Session {} ended after {}ms: {} chars",
        session,
        start.elapsed().as_millis(),
        workspace.tutorial().len()
    );
    workspace.finish_stream(session, &outcome);
    outcome
}
