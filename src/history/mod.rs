//! Linear version history of edit results.
//!
//! Versions live in an append/truncate-only `Vec` with a cursor into it.
//! Appending while the cursor is behind the tip drops everything after the
//! cursor first, so there is only ever one future.

use crate::raster::RasterVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    Moved { cursor: usize },
    AtOldest,
}

impl UndoOutcome {
    pub const fn message(self) -> &'static str {
        match self {
            Self::Moved { .. } => "undo applied",
            Self::AtOldest => "no earlier version",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionHistory {
    versions: Vec<RasterVersion>,
    cursor: usize,
}

impl VersionHistory {
    pub fn new(initial: RasterVersion) -> Self {
        Self {
            versions: vec![initial],
            cursor: 0,
        }
    }

    /// Pushes `version` as the new tip and returns how many versions were discarded.
    pub fn append(&mut self, version: RasterVersion) -> usize {
        let keep = self.cursor.saturating_add(1);
        let discarded = self.versions.len().saturating_sub(keep);
        self.versions.truncate(keep);
        self.versions.push(version);
        self.cursor = self.versions.len() - 1;
        if discarded > 0 {
            tracing::debug!(discarded, cursor = self.cursor, "history branch truncated");
        }
        discarded
    }

    pub fn undo(&mut self) -> UndoOutcome {
        if self.cursor == 0 {
            return UndoOutcome::AtOldest;
        }
        self.cursor -= 1;
        UndoOutcome::Moved {
            cursor: self.cursor,
        }
    }

    pub fn current(&self) -> &RasterVersion {
        &self.versions[self.cursor]
    }

    pub fn original(&self) -> &RasterVersion {
        &self.versions[0]
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub const fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn versions(&self) -> &[RasterVersion] {
        &self.versions
    }

    pub fn contains(&self, version_id: u64) -> bool {
        self.versions.iter().any(|version| version.id() == version_id)
    }
}
