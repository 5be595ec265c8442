use std::collections::VecDeque;

use super::error::{StateError, StateResult};
use super::{event::StateTransition, SessionEvent, SessionState};

const TRANSITION_HISTORY_LIMIT: usize = 64;

#[derive(Debug)]
pub struct StateMachine {
    state: SessionState,
    transition_history: VecDeque<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::default(),
            transition_history: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn can_transition(&self, event: SessionEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        match (self.state, event) {
            (SessionState::Idle, RequestMask) => Some(SessionState::AwaitingMask),
            (SessionState::AwaitingMask, MaskResolved | MaskFailed) => Some(SessionState::Idle),
            (SessionState::Idle, RequestEdit) => Some(SessionState::AwaitingEdit),
            (SessionState::AwaitingEdit, EditResolved | EditFailed) => Some(SessionState::Idle),
            (SessionState::Idle, Undo | EditMask) => Some(SessionState::Idle),
            (SessionState::Idle, SaveAndClose | Cancel) => Some(SessionState::Closed),
            (state, EditAnnotations | SelectTool) if !state.is_closed() => Some(state),
            _ => None,
        }
    }

    /// Like [`Self::next_state`], but as an error the caller can propagate.
    pub fn ensure(&self, event: SessionEvent) -> StateResult<SessionState> {
        self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid state transition requested");
            StateError::InvalidStateTransition { from, event }
        })
    }

    pub fn transition(&mut self, event: SessionEvent) -> StateResult<SessionState> {
        tracing::debug!(from = ?self.state, event = ?event, "request state transition");
        let next = self.ensure(event)?;

        let record = StateTransition::new(Some(self.state), event, next);
        self.state = next;
        if self.transition_history.len() == TRANSITION_HISTORY_LIMIT {
            self.transition_history.pop_front();
        }
        self.transition_history.push_back(record);

        Ok(self.state)
    }

    /// Most recent transitions, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition> {
        self.transition_history.iter()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionState::{:?}", self.state)
    }
}
