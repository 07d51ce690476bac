//! Selection / session state: what the UI layer owns.
//!
//! Tracks the chosen image, the latest analysis, the selected idea, the
//! tutorial buffer and the single active stream session, and refuses
//! operations that are not valid in the current phase.
//!
//!   Idle ─analyze→ Analyzing ─ok→ Ready ─tutorial→ Streaming ─end→ Ready
//!                      └─err→ Error          (failed) └─err→ Error
//!
//! Error is per-attempt: the next analyze or tutorial request leaves it.

use crate::api::{AnalysisResult, TutorialChunk};
use crate::error::{Error, Result};
use crate::session::{CancelHandle, SessionId, SessionState, StreamSession};
use crate::tutorial::TutorialBuffer;
use crate::upload::ImageUpload;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Analyzing,
    Ready,
    Streaming,
    Error,
}

/// How a tutorial stream ended.
#[derive(Debug)]
pub enum StreamOutcome {
    Completed { chunks: usize },
    Cancelled,
    Failed(Error),
}

impl StreamOutcome {
    fn session_state(&self) -> SessionState {
        match self {
            StreamOutcome::Completed { .. } => SessionState::Completed,
            StreamOutcome::Cancelled => SessionState::Cancelled,
            StreamOutcome::Failed(_) => SessionState::Failed,
        }
    }
}

/// Everything the pipeline needs to run one tutorial stream.
#[derive(Debug)]
pub struct StreamTicket {
    pub session: SessionId,
    pub upload: ImageUpload,
    pub idea: String,
    token: CancellationToken,
    cancel: CancelHandle,
}

impl StreamTicket {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

#[derive(Debug)]
pub struct Workspace {
    phase: Phase,
    file: Option<ImageUpload>,
    analysis: Option<AnalysisResult>,
    selected: Option<String>,
    tutorial: TutorialBuffer,
    session: Option<StreamSession>,
    last_error: Option<String>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            file: None,
            analysis: None,
            selected: None,
            tutorial: TutorialBuffer::new(),
            session: None,
            last_error: None,
        }
    }

    // ── What the UI reads ──────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn file(&self) -> Option<&ImageUpload> {
        self.file.as_ref()
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn selected_idea(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn tutorial(&self) -> &str {
        self.tutorial.as_str()
    }

    pub fn tutorial_buffer(&self) -> &TutorialBuffer {
        &self.tutorial
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.session.as_ref().filter(|s| s.is_live()).map(|s| s.id())
    }

    // ── Image + analysis ───────────────────────────────────────────

    /// Pick the image to work on. Does not touch a stream already running.
    pub fn set_file(&mut self, upload: ImageUpload) {
        log::info!("[SESSION] File set: {}", upload.file_name());
        self.file = Some(upload);
    }

    /// Enter Analyzing and return the image to send.
    ///
    /// Refused while a fetch or a tutorial stream is in flight.
    pub fn begin_analyze(&mut self) -> Result<ImageUpload> {
        match self.phase {
            Phase::Analyzing => return Err(Error::Busy("an analysis is already running")),
            Phase::Streaming => return Err(Error::Busy("a tutorial is streaming, stop it first")),
            Phase::Idle | Phase::Ready | Phase::Error => {}
        }
        let upload = self.file.clone().ok_or(Error::NoFile)?;
        self.phase = Phase::Analyzing;
        self.last_error = None;
        Ok(upload)
    }

    /// Apply the outcome of an analyze call started with `begin_analyze`.
    ///
    /// Success replaces the previous result wholesale and drops a selection
    /// that is not among the new ideas. Failure keeps the previous result.
    /// Outside Analyzing the outcome is discarded and nothing changes.
    pub fn finish_analyze(&mut self, outcome: Result<AnalysisResult>) -> Result<&AnalysisResult> {
        if self.phase != Phase::Analyzing {
            log::warn!("[SESSION] Discarding analyze result in phase {:?}", self.phase);
            return Err(Error::NotAnalyzing);
        }
        match outcome {
            Ok(result) => {
                if let Some(idea) = &self.selected {
                    if !result.has_idea(idea) {
                        log::info!("[SESSION] Clearing stale selection '{}'", idea);
                        self.selected = None;
                    }
                }
                self.phase = Phase::Ready;
                Ok(self.analysis.insert(result))
            }
            Err(e) => {
                log::error!("[SESSION] Analyze failed: {}", e);
                self.phase = Phase::Error;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    // ── Selection ──────────────────────────────────────────────────

    /// Select an idea by name. It must belong to the current result.
    pub fn select_idea(&mut self, idea: &str) -> Result<()> {
        let analysis = self.analysis.as_ref().ok_or(Error::NoAnalysis)?;
        if !analysis.has_idea(idea) {
            return Err(Error::UnknownIdea(idea.to_string()));
        }
        self.selected = Some(idea.to_string());
        Ok(())
    }

    /// Select an idea by its position in the current result.
    pub fn select_idea_at(&mut self, index: usize) -> Result<()> {
        let analysis = self.analysis.as_ref().ok_or(Error::NoAnalysis)?;
        let idea = analysis
            .ideas
            .get(index)
            .cloned()
            .ok_or_else(|| Error::UnknownIdea(format!("#{}", index + 1)))?;
        self.selected = Some(idea);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // ── Tutorial stream ────────────────────────────────────────────

    /// Start a new stream session for the selected idea.
    ///
    /// A session that is still live is cancelled first; from here on only
    /// the new session may write to the buffer. The buffer is reset here and
    /// nowhere else.
    pub fn begin_stream(&mut self) -> Result<StreamTicket> {
        if self.phase == Phase::Analyzing {
            return Err(Error::Busy("an analysis is running"));
        }
        let upload = self.file.clone().ok_or(Error::NoFile)?;
        if self.analysis.is_none() {
            return Err(Error::NoAnalysis);
        }
        let idea = self.selected.clone().ok_or(Error::NoSelection)?;

        if let Some(mut previous) = self.session.take() {
            if previous.cancel() {
                log::info!("[SESSION] Superseding live session {}", previous.id());
            }
            previous.end(SessionState::Cancelled);
        }

        let session = StreamSession::new();
        let ticket = StreamTicket {
            session: session.id(),
            upload,
            idea,
            token: session.token(),
            cancel: session.cancel_handle(),
        };
        log::info!("[SESSION] Stream {} started for '{}'", ticket.session, ticket.idea);

        self.tutorial = TutorialBuffer::new();
        self.session = Some(session);
        self.phase = Phase::Streaming;
        self.last_error = None;
        Ok(ticket)
    }

    /// Fold one chunk into the buffer if it belongs to the live session.
    ///
    /// Returns whether the chunk was applied.
    pub fn apply_chunk(&mut self, session: SessionId, chunk: &TutorialChunk) -> bool {
        if self.active_session() != Some(session) {
            log::debug!("[SESSION] Ignoring chunk from stale session {}", session);
            return false;
        }
        self.tutorial.apply(chunk)
    }

    /// Close a session. Freezes the buffer and leaves Streaming.
    ///
    /// Completion and cancellation return to Ready; a failure goes to Error
    /// with whatever was already streamed still visible. Outcomes for a
    /// session that has been superseded are ignored.
    pub fn finish_stream(&mut self, session: SessionId, outcome: &StreamOutcome) {
        let Some(current) = self.session.as_mut().filter(|s| s.id() == session) else {
            log::debug!("[SESSION] Ignoring outcome for superseded session {}", session);
            return;
        };
        if !current.is_live() {
            return;
        }
        current.end(outcome.session_state());
        self.tutorial.freeze();

        match outcome {
            StreamOutcome::Completed { chunks } => {
                log::info!("[SESSION] Stream {} complete: {} chunks", session, chunks);
                self.phase = Phase::Ready;
            }
            StreamOutcome::Cancelled => {
                log::info!("[SESSION] Stream {} cancelled", session);
                self.phase = Phase::Ready;
            }
            StreamOutcome::Failed(e) => {
                log::error!("[SESSION] Stream {} failed: {}", session, e);
                self.phase = Phase::Error;
                self.last_error = Some(e.to_string());
            }
        }
        self.session = None;
    }

    /// Cancel the live session, if any. Returns whether one was signalled.
    pub fn cancel(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => session.cancel(),
            None => false,
        }
    }

    /// Handle for cancelling the live session from elsewhere.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.session
            .as_ref()
            .filter(|s| s.is_live())
            .map(StreamSession::cancel_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::sample_png;

    fn upload() -> ImageUpload {
        ImageUpload::from_bytes("board.png", sample_png()).unwrap()
    }

    fn result(components: &[&str], ideas: &[&str]) -> AnalysisResult {
        AnalysisResult {
            components: components.iter().map(|s| s.to_string()).collect(),
            ideas: ideas.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ready_workspace() -> Workspace {
        let mut ws = Workspace::new();
        ws.set_file(upload());
        ws.begin_analyze().unwrap();
        ws.finish_analyze(Ok(result(&["LED", "Resistor"], &["Blinker", "Alarm"])))
            .unwrap();
        ws
    }

    fn overview(text: &str) -> TutorialChunk {
        TutorialChunk::Overview {
            text: text.to_string(),
        }
    }

    #[test]
    fn analyze_needs_a_file() {
        let mut ws = Workspace::new();
        assert!(matches!(ws.begin_analyze(), Err(Error::NoFile)));
        assert_eq!(ws.phase(), Phase::Idle);
    }

    #[test]
    fn analyze_success_moves_to_ready() {
        let ws = ready_workspace();
        assert_eq!(ws.phase(), Phase::Ready);
        assert_eq!(ws.analysis().unwrap().ideas, vec!["Blinker", "Alarm"]);
    }

    #[test]
    fn analyze_failure_keeps_previous_result() {
        let mut ws = ready_workspace();
        ws.begin_analyze().unwrap();
        let err = ws
            .finish_analyze(Err(Error::Transport("connection refused".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(ws.phase(), Phase::Error);
        assert!(ws.last_error().is_some());
        assert_eq!(ws.analysis().unwrap().components, vec!["LED", "Resistor"]);

        // Next user action leaves Error.
        ws.begin_analyze().unwrap();
        assert_eq!(ws.phase(), Phase::Analyzing);
        assert!(ws.last_error().is_none());
    }

    #[test]
    fn new_result_replaces_wholesale_and_clears_stale_selection() {
        let mut ws = ready_workspace();
        ws.select_idea("Blinker").unwrap();

        ws.begin_analyze().unwrap();
        ws.finish_analyze(Ok(result(&["Servo"], &["Robot arm"]))).unwrap();
        assert_eq!(ws.analysis().unwrap(), &result(&["Servo"], &["Robot arm"]));
        assert_eq!(ws.selected_idea(), None);
    }

    #[test]
    fn selection_survives_when_still_offered() {
        let mut ws = ready_workspace();
        ws.select_idea("Alarm").unwrap();
        ws.begin_analyze().unwrap();
        ws.finish_analyze(Ok(result(&["LED"], &["Alarm", "Night light"]))).unwrap();
        assert_eq!(ws.selected_idea(), Some("Alarm"));
    }

    #[test]
    fn selecting_unknown_idea_is_refused() {
        let mut ws = ready_workspace();
        assert!(matches!(ws.select_idea("Robot"), Err(Error::UnknownIdea(_))));
        assert!(matches!(ws.select_idea_at(5), Err(Error::UnknownIdea(_))));
        ws.select_idea_at(1).unwrap();
        assert_eq!(ws.selected_idea(), Some("Alarm"));
    }

    #[test]
    fn selecting_before_analysis_is_refused() {
        let mut ws = Workspace::new();
        assert!(matches!(ws.select_idea("Blinker"), Err(Error::NoAnalysis)));
    }

    #[test]
    fn stream_requires_selection() {
        let mut ws = ready_workspace();
        assert!(matches!(ws.begin_stream(), Err(Error::NoSelection)));
        assert_eq!(ws.phase(), Phase::Ready);
    }

    #[test]
    fn stream_lifecycle_resets_grows_and_freezes() {
        let mut ws = ready_workspace();
        ws.select_idea("Blinker").unwrap();

        let ticket = ws.begin_stream().unwrap();
        assert!(ws.is_streaming());
        assert_eq!(ws.active_session(), Some(ticket.session));
        assert_eq!(ticket.idea, "Blinker");

        assert!(ws.apply_chunk(ticket.session, &overview("A blinker project...")));
        ws.finish_stream(ticket.session, &StreamOutcome::Completed { chunks: 1 });

        assert_eq!(ws.phase(), Phase::Ready);
        assert_eq!(ws.tutorial(), "A blinker project...");
        assert!(ws.tutorial_buffer().is_frozen());
        assert!(!ws.apply_chunk(ticket.session, &overview(" late")));
        assert!(ws.active_session().is_none());

        // A new stream starts from an empty buffer.
        let next = ws.begin_stream().unwrap();
        assert_eq!(ws.tutorial(), "");
        assert_ne!(next.session, ticket.session);
    }

    #[test]
    fn analyze_is_refused_while_streaming() {
        let mut ws = ready_workspace();
        ws.select_idea("Blinker").unwrap();
        ws.begin_stream().unwrap();
        assert!(matches!(ws.begin_analyze(), Err(Error::Busy(_))));
        assert!(ws.is_streaming());
    }

    #[test]
    fn new_stream_supersedes_live_one() {
        let mut ws = ready_workspace();
        ws.select_idea("Blinker").unwrap();
        let first = ws.begin_stream().unwrap();
        ws.apply_chunk(first.session, &overview("old"));

        ws.select_idea("Alarm").unwrap();
        let second = ws.begin_stream().unwrap();

        assert!(first.token().is_cancelled());
        assert!(!second.token().is_cancelled());
        assert_eq!(ws.tutorial(), "");

        // Stragglers from the first session are ignored.
        assert!(!ws.apply_chunk(first.session, &overview("stale")));
        ws.finish_stream(first.session, &StreamOutcome::Cancelled);
        assert!(ws.is_streaming());

        assert!(ws.apply_chunk(second.session, &overview("new")));
        assert_eq!(ws.tutorial(), "new");
    }

    #[test]
    fn cancel_signals_live_session_only() {
        let mut ws = ready_workspace();
        assert!(!ws.cancel());
        ws.select_idea("Blinker").unwrap();
        let ticket = ws.begin_stream().unwrap();
        assert!(ws.cancel_handle().is_some());
        assert!(ws.cancel());
        assert!(ticket.token().is_cancelled());

        ws.finish_stream(ticket.session, &StreamOutcome::Cancelled);
        assert_eq!(ws.phase(), Phase::Ready);
        assert!(ws.cancel_handle().is_none());
        assert!(!ws.cancel());
    }

    #[test]
    fn stream_failure_keeps_partial_tutorial() {
        let mut ws = ready_workspace();
        ws.select_idea("Blinker").unwrap();
        let ticket = ws.begin_stream().unwrap();
        ws.apply_chunk(ticket.session, &overview("partial"));
        ws.finish_stream(
            ticket.session,
            &StreamOutcome::Failed(Error::Stream("reset".to_string())),
        );
        assert_eq!(ws.phase(), Phase::Error);
        assert_eq!(ws.tutorial(), "partial");
        assert!(ws.tutorial_buffer().is_frozen());

        // Retrying the same request is allowed from Error.
        ws.begin_stream().unwrap();
        assert!(ws.is_streaming());
    }

    #[test]
    fn late_analyze_result_is_discarded_while_streaming() {
        let mut ws = ready_workspace();
        ws.select_idea("Blinker").unwrap();
        let ticket = ws.begin_stream().unwrap();

        let err = ws
            .finish_analyze(Ok(result(&["Servo"], &["Robot arm"])))
            .unwrap_err();
        assert!(matches!(err, Error::NotAnalyzing));
        assert_eq!(ws.phase(), Phase::Streaming);
        assert_eq!(ws.active_session(), Some(ticket.session));
        assert_eq!(ws.analysis().unwrap().ideas, vec!["Blinker", "Alarm"]);
        assert_eq!(ws.selected_idea(), Some("Blinker"));
    }

    #[test]
    fn analyze_result_without_begin_is_discarded() {
        let mut ws = Workspace::new();
        let err = ws.finish_analyze(Ok(result(&["LED"], &["Blinker"]))).unwrap_err();
        assert!(matches!(err, Error::NotAnalyzing));
        assert_eq!(ws.phase(), Phase::Idle);
        assert!(ws.analysis().is_none());
    }
}
