//! Stream sessions and the cancel handle handed to the UI.
//!
//! Every tutorial request gets its own `StreamSession` with its own token.
//! A session ends exactly once; after that it cannot be reused.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Live,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self != SessionState::Live
    }
}

#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    token: CancellationToken,
    state: SessionState,
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst)),
            token: CancellationToken::new(),
            state: SessionState::Live,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == SessionState::Live
    }

    /// Token passed to the transport for this session only.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            session: self.id,
            token: self.token.clone(),
        }
    }

    /// Signal the token. Returns false if the session had already ended.
    pub fn cancel(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Record how the session ended. The first terminal state sticks.
    pub fn end(&mut self, state: SessionState) {
        if self.is_live() && state.is_terminal() {
            self.state = state;
        }
        // Whatever happened, nothing may keep reading under this token.
        self.token.cancel();
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle that cancels one specific session, safe to move into
/// another task (e.g. a Ctrl-C listener).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    session: SessionId,
    token: CancellationToken,
}

impl CancelHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn cancel(&self) {
        log::info!("[SESSION] Cancel requested for {}", self.session);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_get_distinct_ids_and_tokens() {
        let a = StreamSession::new();
        let b = StreamSession::new();
        assert_ne!(a.id(), b.id());
        a.cancel_handle().cancel();
        assert!(a.token().is_cancelled());
        assert!(!b.token().is_cancelled());
    }

    #[test]
    fn first_terminal_state_sticks() {
        let mut session = StreamSession::new();
        session.end(SessionState::Cancelled);
        session.end(SessionState::Completed);
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(!session.cancel());
    }

    #[test]
    fn ending_a_session_releases_its_token() {
        let mut session = StreamSession::new();
        let handle = session.cancel_handle();
        session.end(SessionState::Completed);
        assert!(handle.is_cancelled());
        assert_eq!(handle.session(), session.id());
    }
}
