//! Resumable session state

/// How the next connection attempt introduces itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Fresh session (op 2)
    Identify,
    /// Continue the previous session from the last sequence (op 6)
    Resume,
}

/// What survives from one connection attempt to the next.
///
/// `resume` can only be set while both a session id and a sequence are
/// known, so a resume handshake always has what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    sequence: Option<u64>,
    session_id: Option<String>,
    resume: bool,
    initial: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sequence: None,
            session_id: None,
            resume: false,
            initial: true,
        }
    }

    /// Last sequence number received
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether the next attempt will try to resume
    #[must_use]
    pub fn resume(&self) -> bool {
        self.resume
    }

    /// True until the first handshake of this session was sent
    #[must_use]
    pub fn initial(&self) -> bool {
        self.initial
    }

    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    #[must_use]
    pub fn handshake_mode(&self) -> HandshakeMode {
        if self.resume && self.can_resume() {
            HandshakeMode::Resume
        } else {
            HandshakeMode::Identify
        }
    }

    /// Remember a dispatch sequence number. Out-of-order values never move it back.
    pub fn record_sequence(&mut self, sequence: u64) {
        self.sequence = Some(self.sequence.map_or(sequence, |current| current.max(sequence)));
    }

    /// A READY arrived: this is now the session to resume
    pub fn begin_session(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    /// Request (or cancel) a resume for the next attempt. Ignored when there
    /// is nothing to resume.
    pub fn set_resume(&mut self, resume: bool) {
        self.resume = resume && self.can_resume();
    }

    /// The transport dropped under us: resume right away if at all possible
    pub fn force_resume(&mut self) {
        self.initial = false;
        self.set_resume(true);
    }

    /// The server refused to resume: the next attempt identifies from scratch
    pub fn invalidate(&mut self) {
        self.sequence = None;
        self.session_id = None;
        self.resume = false;
    }

    /// The first handshake went out
    pub fn mark_handshake_sent(&mut self) {
        self.initial = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn established() -> SessionState {
        let mut state = SessionState::new();
        state.begin_session("abc");
        state.record_sequence(5);
        state.mark_handshake_sent();
        state
    }

    #[test]
    fn test_new_state_identifies() {
        let state = SessionState::new();
        assert!(state.initial());
        assert!(!state.resume());
        assert_eq!(state.handshake_mode(), HandshakeMode::Identify);
    }

    #[test]
    fn test_sequence_never_decreases() {
        let mut state = SessionState::new();
        state.record_sequence(10);
        state.record_sequence(7);
        assert_eq!(state.sequence(), Some(10));
        state.record_sequence(11);
        assert_eq!(state.sequence(), Some(11));
    }

    #[test]
    fn test_resume_requires_session() {
        let mut state = SessionState::new();
        state.set_resume(true);
        assert!(!state.resume());

        state.record_sequence(3);
        state.force_resume();
        assert!(!state.resume(), "sequence alone is not resumable");
        assert!(!state.initial());

        let mut state = established();
        state.set_resume(true);
        assert_eq!(state.handshake_mode(), HandshakeMode::Resume);
    }

    #[test]
    fn test_invalidate_clears_session() {
        let mut state = established();
        state.force_resume();
        state.invalidate();

        assert_eq!(state.session_id(), None);
        assert_eq!(state.sequence(), None);
        assert_eq!(state.handshake_mode(), HandshakeMode::Identify);
        assert!(!state.initial());
    }
}
