use crate::mask::PenWidth;

/// The active canvas tool. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Pen(PenWidth),
    AiSelect,
    Bubble,
}

impl Default for ToolMode {
    fn default() -> Self {
        Self::Pen(PenWidth::default())
    }
}

impl ToolMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pen(_) => "pen",
            Self::AiSelect => "ai-select",
            Self::Bubble => "bubble",
        }
    }

    pub const fn pen_width(self) -> Option<PenWidth> {
        match self {
            Self::Pen(width) => Some(width),
            Self::AiSelect | Self::Bubble => None,
        }
    }

    pub const fn draws_mask(self) -> bool {
        matches!(self, Self::Pen(_))
    }
}
