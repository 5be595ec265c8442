use serde::{Deserialize, Serialize};

use crate::geometry::ToolPoint;

/// Fixed brush diameters offered by the pen tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenWidth {
    Small,
    #[default]
    Medium,
    Large,
}

impl PenWidth {
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    pub const fn diameter(self) -> u32 {
        match self {
            Self::Small => 20,
            Self::Medium => 35,
            Self::Large => 50,
        }
    }

    pub fn radius(self) -> f32 {
        self.diameter() as f32 / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenStroke {
    pub points: Vec<ToolPoint>,
    pub width: PenWidth,
    pub finalized: bool,
}

impl PenStroke {
    pub fn new(start: ToolPoint, width: PenWidth) -> Self {
        Self {
            points: vec![start],
            width,
            finalized: false,
        }
    }

    pub fn last_point(&self) -> ToolPoint {
        self.points
            .last()
            .copied()
            .unwrap_or(ToolPoint::new(0, 0))
    }

    pub fn append_point(&mut self, point: ToolPoint) {
        self.points.push(point);
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }
}
