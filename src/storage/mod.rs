use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::compositor::ExportedImage;
use crate::config::EditorConfig;

const DEFAULT_EXPORT_STEM: &str = "storyedit";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no export directory configured")]
    MissingExportDir,
    #[error("export name is empty")]
    MissingExportName,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Receives the flattened image when a session is saved.
pub trait SessionSink {
    fn on_session_complete(&mut self, image: ExportedImage) -> StorageResult<()>;
}

impl<F> SessionSink for F
where
    F: FnMut(ExportedImage) -> StorageResult<()>,
{
    fn on_session_complete(&mut self, image: ExportedImage) -> StorageResult<()> {
        self(image)
    }
}

/// Writes the exported image into a directory as `<stem>.png`.
#[derive(Debug, Clone)]
pub struct FileExportSink {
    export_dir: PathBuf,
    stem: String,
    written: Option<PathBuf>,
}

impl FileExportSink {
    pub fn new(export_dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            export_dir: export_dir.into(),
            stem: stem.into(),
            written: None,
        }
    }

    pub fn from_config(config: &EditorConfig) -> StorageResult<Self> {
        let dir = config
            .export_dir
            .clone()
            .ok_or(StorageError::MissingExportDir)?;
        Ok(Self::new(dir, DEFAULT_EXPORT_STEM))
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Path of the last successful write.
    pub fn written_path(&self) -> Option<&Path> {
        self.written.as_deref()
    }

    pub fn allocate_target_path(&self) -> StorageResult<PathBuf> {
        let stem = self.stem.trim();
        if stem.is_empty() {
            return Err(StorageError::MissingExportName);
        }
        let mut path = self.export_dir.join(format!("{stem}.png"));
        let mut suffix = 1_u32;
        while path.exists() {
            path = self.export_dir.join(format!("{stem}-{suffix}.png"));
            suffix = suffix.saturating_add(1);
        }
        Ok(path)
    }
}

impl SessionSink for FileExportSink {
    fn on_session_complete(&mut self, image: ExportedImage) -> StorageResult<()> {
        fs::create_dir_all(&self.export_dir)?;
        let target = self.allocate_target_path()?;
        write_replace(&target, &image.bytes)?;
        tracing::info!(
            path = %target.display(),
            width = image.width,
            height = image.height,
            "flattened image written"
        );
        self.written = Some(target);
        Ok(())
    }
}

fn write_replace(destination: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut staging = destination.as_os_str().to_owned();
    staging.push(".part");
    let staging = PathBuf::from(staging);
    fs::write(&staging, bytes)?;
    if let Err(err) = fs::rename(&staging, destination) {
        let _ = fs::remove_file(&staging);
        return Err(StorageError::Io(err));
    }
    Ok(())
}
