use super::model::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    RequestMask,
    MaskResolved,
    MaskFailed,
    RequestEdit,
    EditResolved,
    EditFailed,
    Undo,
    /// Stroke painting or an explicit mask clear.
    EditMask,
    /// Bubble changes. Accepted while a request is in flight.
    EditAnnotations,
    SelectTool,
    SaveAndClose,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: Option<SessionState>,
    pub event: SessionEvent,
    pub to: SessionState,
}

impl StateTransition {
    pub const fn new(from: Option<SessionState>, event: SessionEvent, to: SessionState) -> Self {
        Self { from, event, to }
    }
}
