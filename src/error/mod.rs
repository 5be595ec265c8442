use crate::annotation::FontError;
use crate::backend::BackendError;
use crate::raster::RasterError;
use crate::session::SessionError;
use crate::state::StateError;
use crate::storage::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Font(#[from] FontError),
    #[error("invalid bubble description: {0}")]
    Bubbles(#[from] serde_json::Error),
}
