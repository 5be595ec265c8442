//! Speech-bubble annotations layered over the current raster.

mod bubble;
mod font;
mod render;

use image::RgbaImage;

pub use bubble::{
    Bubble, BubblePatch, BubbleShape, BubbleStyle, DEFAULT_BUBBLE_HEIGHT,
    DEFAULT_BUBBLE_POSITION, DEFAULT_BUBBLE_TEXT, DEFAULT_BUBBLE_WIDTH,
};
pub use font::{BubbleFont, FontError};
pub use render::{BUBBLE_BORDER_WIDTH, BUBBLE_CORNER_RADIUS, BUBBLE_FONT_SIZE, BUBBLE_LINE_HEIGHT};

pub(crate) use render::over;

#[cfg(test)]
pub(crate) use font::test_font;

/// Ordered bubble collection; later bubbles draw on top. Owns every bubble and
/// tracks at most one selected id.
#[derive(Debug, Clone)]
pub struct AnnotationSet {
    bubbles: Vec<Bubble>,
    next_id: u64,
    selected: Option<u64>,
}

impl Default for AnnotationSet {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationSet {
    pub const fn new() -> Self {
        Self {
            bubbles: Vec::new(),
            next_id: 1,
            selected: None,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn find_mut(&mut self, id: u64) -> Option<&mut Bubble> {
        self.bubbles.iter_mut().find(|bubble| bubble.id == id)
    }

    /// Adds a default bubble and selects it.
    pub fn add(&mut self) -> u64 {
        let id = self.allocate_id();
        self.bubbles.push(Bubble::with_defaults(id));
        self.selected = Some(id);
        tracing::debug!(id, count = self.bubbles.len(), "bubble added");
        id
    }

    /// Merges `patch` into bubble `id`. Unknown ids are ignored and return `false`.
    pub fn update(&mut self, id: u64, patch: &BubblePatch) -> bool {
        match self.find_mut(id) {
            Some(bubble) => {
                bubble.apply(patch);
                true
            }
            None => {
                tracing::debug!(id, "ignoring update for unknown bubble");
                false
            }
        }
    }

    pub fn update_selected(&mut self, patch: &BubblePatch) -> bool {
        match self.selected {
            Some(id) => self.update(id, patch),
            None => false,
        }
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.bubbles.len();
        self.bubbles.retain(|bubble| bubble.id != id);
        let removed = self.bubbles.len() != before;
        if self.selected == Some(id) {
            self.selected = None;
        }
        if removed {
            tracing::debug!(id, count = self.bubbles.len(), "bubble removed");
        } else {
            tracing::debug!(id, "ignoring removal of unknown bubble");
        }
        removed
    }

    /// Selects `id`, replacing any previous selection. Unknown ids clear the selection.
    pub fn select(&mut self, id: u64) -> bool {
        let exists = self.get(id).is_some();
        self.selected = exists.then_some(id);
        exists
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_id(&self) -> Option<u64> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Bubble> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: u64) -> Option<&Bubble> {
        self.bubbles.iter().find(|bubble| bubble.id == id)
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    /// Draws every bubble, in insertion order, onto `target`.
    pub fn render(&self, target: &mut RgbaImage, font: Option<&BubbleFont>) {
        for bubble in &self.bubbles {
            render::draw_bubble(target, bubble, font);
        }
    }

    /// Renders the set onto a fresh transparent layer.
    pub fn render_layer(&self, width: u32, height: u32, font: Option<&BubbleFont>) -> RgbaImage {
        let mut layer = RgbaImage::new(width, height);
        self.render(&mut layer, font);
        layer
    }
}
