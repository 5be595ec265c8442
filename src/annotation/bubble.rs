use serde::{Deserialize, Serialize};

use crate::geometry::{Color, ToolBounds, ToolPoint};

pub const DEFAULT_BUBBLE_TEXT: &str = "Hello!";
pub const DEFAULT_BUBBLE_POSITION: ToolPoint = ToolPoint::new(50, 50);
pub const DEFAULT_BUBBLE_WIDTH: u32 = 120;
pub const DEFAULT_BUBBLE_HEIGHT: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BubbleShape {
    #[default]
    Rounded,
    Ellipse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleStyle {
    pub background_color: Color,
    pub text_color: Color,
    pub border_color: Color,
}

impl Default for BubbleStyle {
    fn default() -> Self {
        Self {
            background_color: Color::WHITE,
            text_color: Color::BLACK,
            border_color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub id: u64,
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub shape: BubbleShape,
    pub background_color: Color,
    pub text_color: Color,
    pub border_color: Color,
}

impl Bubble {
    pub fn with_defaults(id: u64) -> Self {
        let style = BubbleStyle::default();
        Self {
            id,
            text: DEFAULT_BUBBLE_TEXT.to_string(),
            x: DEFAULT_BUBBLE_POSITION.x,
            y: DEFAULT_BUBBLE_POSITION.y,
            width: DEFAULT_BUBBLE_WIDTH,
            height: DEFAULT_BUBBLE_HEIGHT,
            shape: BubbleShape::default(),
            background_color: style.background_color,
            text_color: style.text_color,
            border_color: style.border_color,
        }
    }

    pub const fn bounds(&self) -> ToolBounds {
        ToolBounds::new(self.x, self.y, self.width, self.height)
    }

    pub fn lines(&self) -> Vec<&str> {
        self.text.split('\n').collect()
    }

    pub fn apply(&mut self, patch: &BubblePatch) {
        let BubblePatch {
            text,
            x,
            y,
            width,
            height,
            shape,
            background_color,
            text_color,
            border_color,
        } = patch;
        if let Some(text) = text {
            self.text.clone_from(text);
        }
        if let Some(x) = *x {
            self.x = x;
        }
        if let Some(y) = *y {
            self.y = y;
        }
        if let Some(width) = *width {
            self.width = width;
        }
        if let Some(height) = *height {
            self.height = height;
        }
        if let Some(shape) = *shape {
            self.shape = shape;
        }
        if let Some(color) = *background_color {
            self.background_color = color;
        }
        if let Some(color) = *text_color {
            self.text_color = color;
        }
        if let Some(color) = *border_color {
            self.border_color = color;
        }
    }
}

/// Partial bubble attributes; `None` fields are left untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubblePatch {
    pub text: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub shape: Option<BubbleShape>,
    pub background_color: Option<Color>,
    pub text_color: Option<Color>,
    pub border_color: Option<Color>,
}

impl BubblePatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn position(x: i32, y: i32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn shape(shape: BubbleShape) -> Self {
        Self {
            shape: Some(shape),
            ..Self::default()
        }
    }

    pub fn style(style: BubbleStyle) -> Self {
        Self {
            background_color: Some(style.background_color),
            text_color: Some(style.text_color),
            border_color: Some(style.border_color),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
