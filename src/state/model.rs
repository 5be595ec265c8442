/// Request-gating state of an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Subject-mask request in flight.
    AwaitingMask,
    /// Edit request in flight.
    AwaitingEdit,
    /// Saved or cancelled; nothing further is accepted.
    Closed,
}

impl SessionState {
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::AwaitingMask | Self::AwaitingEdit)
    }

    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingMask => "awaiting-mask",
            Self::AwaitingEdit => "awaiting-edit",
            Self::Closed => "closed",
        }
    }
}
