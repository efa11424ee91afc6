//! Session: the common shape shared by shell, log, and port-forward
//! sessions. The managers in `kviewd::sessions` own the actual streams;
//! this is the state-machine type they publish through the Event Fabric
//! and `/health`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Shell,
    Log,
    PortForward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Starting,
    Active,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    /// State transitions are monotonic except `starting -> failed`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Starting, Active) | (Starting, Failed) => true,
            (Active, Closing) | (Active, Failed) => true,
            (Closing, Closed) | (Closing, Failed) => true,
            (same, other) if same == other => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub kind: SessionKind,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub state: SessionState,
    pub peer: String,
    pub subscription: Option<String>,
}

impl Session {
    pub fn new(id: String, kind: SessionKind, peer: String) -> Session {
        Session {
            id,
            kind,
            created_at: chrono::Utc::now(),
            state: SessionState::Starting,
            peer,
            subscription: None,
        }
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionTransitionError> {
        if self.state.can_transition_to(next) {
            self.state = next;
            Ok(())
        } else {
            Err(SessionTransitionError {
                from: self.state,
                to: next,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal session transition {from:?} -> {to:?}")]
pub struct SessionTransitionError {
    pub from: SessionState,
    pub to: SessionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_may_fail_directly() {
        assert!(SessionState::Starting.can_transition_to(SessionState::Failed));
    }

    #[test]
    fn closed_cannot_reopen() {
        assert!(!SessionState::Closed.can_transition_to(SessionState::Active));
    }

    #[test]
    fn transition_rejects_illegal_jump() {
        let mut s = Session::new("s1".into(), SessionKind::Shell, "127.0.0.1".into());
        assert!(s.transition(SessionState::Closed).is_err());
        assert_eq!(s.state, SessionState::Starting);
        s.transition(SessionState::Active).unwrap();
        s.transition(SessionState::Closing).unwrap();
        s.transition(SessionState::Closed).unwrap();
    }
}
