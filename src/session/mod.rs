//! Edit session controller.
//!
//! Owns one image's version history, mask surface and bubbles, and drives the
//! backend round trips through [`StateMachine`]. A mask request and an edit
//! request can never overlap, and undo is only accepted while idle.
//!
//! Requests can be driven two ways. Callers that own their own async plumbing
//! use `begin_*` to get a request and `complete_*` to hand the result back.
//! Everything else uses `dispatch_*`, which runs the backend on a worker
//! thread, and then [`EditSession::poll`] or [`EditSession::wait`].

mod tool;
mod worker;

use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;

use crate::annotation::{AnnotationSet, BubbleFont, BubblePatch, FontError};
use crate::backend::{
    BackendError, BackendResult, EditBackend, EditRequest, EditedImage, MaskRequest,
};
use crate::compositor::{self, ExportedImage};
use crate::config::EditorConfig;
use crate::geometry::ToolPoint;
use crate::history::{UndoOutcome, VersionHistory};
use crate::mask::{MaskSurface, PenStroke, PenWidth};
use crate::raster::{RasterError, RasterVersion};
use crate::state::{SessionEvent, SessionState, StateError, StateMachine};
use crate::storage::{SessionSink, StorageError};

pub use tool::ToolMode;
use worker::{PendingRequest, WorkerPoll};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("failed to export flattened image: {0}")]
    Export(#[from] RasterError),
    #[error("failed to deliver flattened image: {0}")]
    Sink(#[from] StorageError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// A backend result delivered by [`EditSession::poll`] or [`EditSession::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    MaskImported,
    EditApplied { version_id: u64 },
}

#[derive(Debug)]
enum InFlight {
    Mask(PendingRequest<BackendResult<RgbaImage>>),
    Edit(PendingRequest<BackendResult<EditedImage>>),
}

#[derive(Debug)]
pub struct EditSession {
    history: VersionHistory,
    mask: MaskSurface,
    annotations: AnnotationSet,
    machine: StateMachine,
    tool: ToolMode,
    pen_width: PenWidth,
    prompt: String,
    last_error: Option<String>,
    font: Option<BubbleFont>,
    font_error: Option<FontError>,
    in_flight: Option<InFlight>,
}

impl EditSession {
    /// Opens a session on `initial`, looking up the bubble font from `config`.
    /// When no font can be loaded the session still opens; bubbles are drawn
    /// without text and [`Self::font_error`] says why.
    pub fn open(initial: RasterVersion, config: &EditorConfig) -> Self {
        match BubbleFont::resolve(config.font_path.as_deref()) {
            Ok(font) => Self::open_with_font(initial, config, Some(font)),
            Err(err) => {
                let mut session = Self::open_with_font(initial, config, None);
                session.font_error = Some(err);
                session
            }
        }
    }

    pub fn open_with_font(
        initial: RasterVersion,
        config: &EditorConfig,
        font: Option<BubbleFont>,
    ) -> Self {
        let (width, height) = initial.dimensions();
        let pen_width = config.pen_width();
        tracing::debug!(
            version = initial.id(),
            width,
            height,
            mime = %initial.mime_type(),
            "edit session opened"
        );
        Self {
            history: VersionHistory::new(initial),
            mask: MaskSurface::new(width, height),
            annotations: AnnotationSet::new(),
            machine: StateMachine::new(),
            tool: ToolMode::Pen(pen_width),
            pen_width,
            prompt: String::new(),
            last_error: None,
            font,
            font_error: None,
            in_flight: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn tool(&self) -> ToolMode {
        self.tool
    }

    pub fn pen_width(&self) -> PenWidth {
        self.pen_width
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    pub fn current(&self) -> &RasterVersion {
        self.history.current()
    }

    pub fn mask(&self) -> &MaskSurface {
        &self.mask
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn font(&self) -> Option<&BubbleFont> {
        self.font.as_ref()
    }

    pub fn font_error(&self) -> Option<&FontError> {
        self.font_error.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// User-facing message for the most recent backend failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn has_pending_request(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn select_tool(&mut self, mode: ToolMode) -> SessionResult<()> {
        self.machine.transition(SessionEvent::SelectTool)?;
        if let ToolMode::Pen(width) = mode {
            self.pen_width = width;
        }
        self.switch_tool(mode);
        Ok(())
    }

    pub fn set_pen_width(&mut self, width: PenWidth) -> SessionResult<()> {
        self.machine.transition(SessionEvent::SelectTool)?;
        self.pen_width = width;
        if self.tool.draws_mask() {
            self.tool = ToolMode::Pen(width);
        }
        Ok(())
    }

    fn switch_tool(&mut self, mode: ToolMode) {
        if !mode.draws_mask() {
            self.mask.end_stroke();
        }
        if self.tool != mode {
            tracing::debug!(from = self.tool.label(), to = mode.label(), "tool changed");
        }
        self.tool = mode;
    }

    /// Starts a pen stroke. Returns `false` when the pen is not the active tool.
    pub fn begin_stroke(&mut self, point: ToolPoint) -> SessionResult<bool> {
        if !self.tool.draws_mask() {
            return Ok(false);
        }
        self.machine.transition(SessionEvent::EditMask)?;
        self.mask.begin_stroke(point, self.pen_width);
        Ok(true)
    }

    pub fn extend_stroke(&mut self, point: ToolPoint) {
        if self.machine.state() == SessionState::Idle {
            self.mask.extend_stroke(point);
        }
    }

    pub fn end_stroke(&mut self) -> Option<PenStroke> {
        self.mask.end_stroke()
    }

    /// Returns whether anything was selected before the clear.
    pub fn clear_mask(&mut self) -> SessionResult<bool> {
        self.machine.transition(SessionEvent::EditMask)?;
        Ok(self.mask.clear())
    }

    /// Adds a default bubble, selects it and switches to the bubble tool.
    pub fn add_bubble(&mut self) -> SessionResult<u64> {
        self.machine.transition(SessionEvent::EditAnnotations)?;
        self.switch_tool(ToolMode::Bubble);
        Ok(self.annotations.add())
    }

    pub fn update_bubble(&mut self, id: u64, patch: &BubblePatch) -> SessionResult<bool> {
        self.machine.transition(SessionEvent::EditAnnotations)?;
        Ok(self.annotations.update(id, patch))
    }

    pub fn update_selected_bubble(&mut self, patch: &BubblePatch) -> SessionResult<bool> {
        self.machine.transition(SessionEvent::EditAnnotations)?;
        Ok(self.annotations.update_selected(patch))
    }

    pub fn remove_bubble(&mut self, id: u64) -> SessionResult<bool> {
        self.machine.transition(SessionEvent::EditAnnotations)?;
        Ok(self.annotations.remove(id))
    }

    pub fn select_bubble(&mut self, id: u64) -> SessionResult<bool> {
        self.machine.transition(SessionEvent::EditAnnotations)?;
        Ok(self.annotations.select(id))
    }

    pub fn begin_subject_mask(&mut self) -> SessionResult<MaskRequest> {
        self.ensure_no_worker(SessionEvent::RequestMask)?;
        self.machine.transition(SessionEvent::RequestMask)?;
        self.switch_tool(ToolMode::AiSelect);
        self.last_error = None;
        let image = self.history.current().clone();
        tracing::debug!(version = image.id(), "subject mask requested");
        Ok(MaskRequest {
            mime_type: image.mime_type().clone(),
            image,
        })
    }

    /// Imports a successful mask, replacing any strokes. A failure leaves the
    /// mask as it was and is kept in [`Self::last_error`].
    pub fn complete_subject_mask(
        &mut self,
        result: BackendResult<RgbaImage>,
    ) -> SessionResult<()> {
        self.ensure_no_worker(SessionEvent::MaskResolved)?;
        let result = result.and_then(|mask| {
            if mask.width() == 0 || mask.height() == 0 {
                Err(BackendError::malformed("subject mask is empty"))
            } else {
                Ok(mask)
            }
        });
        match result {
            Ok(mask) => {
                self.machine.transition(SessionEvent::MaskResolved)?;
                self.mask.import_mask(&mask);
                Ok(())
            }
            Err(err) => {
                self.machine.transition(SessionEvent::MaskFailed)?;
                Err(self.surface(err))
            }
        }
    }

    /// Builds the edit request from the current raster, the trimmed prompt and
    /// the mask when one has been drawn or imported.
    pub fn begin_apply_edit(&mut self) -> SessionResult<EditRequest> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::InvalidInput("edit prompt is empty"));
        }
        let prompt = prompt.to_string();
        self.ensure_no_worker(SessionEvent::RequestEdit)?;
        self.machine.transition(SessionEvent::RequestEdit)?;
        self.mask.end_stroke();
        self.last_error = None;

        let image = self.history.current().clone();
        let mask = self
            .mask
            .has_selection()
            .then(|| self.mask.export_for_backend());
        tracing::info!(
            version = image.id(),
            masked = mask.is_some(),
            "edit requested"
        );
        Ok(EditRequest {
            mime_type: image.mime_type().clone(),
            image,
            prompt,
            mask,
        })
    }

    /// Appends a successful edit as the new current version and returns its
    /// id. The mask is cleared and the prompt reset. A failure changes nothing
    /// but [`Self::last_error`].
    pub fn complete_apply_edit(
        &mut self,
        result: BackendResult<EditedImage>,
    ) -> SessionResult<u64> {
        self.ensure_no_worker(SessionEvent::EditResolved)?;
        let result = result.and_then(|edited| {
            if edited.image.width() == 0 || edited.image.height() == 0 {
                Err(BackendError::malformed("edited image is empty"))
            } else {
                Ok(edited)
            }
        });
        match result {
            Ok(edited) => {
                self.machine.transition(SessionEvent::EditResolved)?;
                let version = RasterVersion::new(edited.image, edited.mime_type);
                let version_id = version.id();
                let (width, height) = version.dimensions();
                let discarded = self.history.append(version);
                self.mask.resize(width, height);
                self.prompt.clear();
                tracing::info!(
                    version = version_id,
                    cursor = self.history.cursor(),
                    discarded,
                    "edit applied"
                );
                Ok(version_id)
            }
            Err(err) => {
                self.machine.transition(SessionEvent::EditFailed)?;
                Err(self.surface(err))
            }
        }
    }

    /// A dispatched request is settled only by [`Self::poll`] or [`Self::wait`].
    fn ensure_no_worker(&self, event: SessionEvent) -> SessionResult<()> {
        if self.in_flight.is_none() {
            return Ok(());
        }
        let from = self.machine.state();
        tracing::warn!(?from, ?event, "request belongs to a dispatched worker");
        Err(StateError::InvalidStateTransition { from, event }.into())
    }

    fn surface(&mut self, err: BackendError) -> SessionError {
        tracing::warn!(%err, "backend request failed");
        self.last_error = Some(err.to_string());
        SessionError::Backend(err)
    }

    pub fn dispatch_subject_mask<B>(&mut self, backend: Arc<B>) -> SessionResult<()>
    where
        B: EditBackend + ?Sized + 'static,
    {
        let request = self.begin_subject_mask()?;
        let pending = PendingRequest::spawn(move || backend.request_subject_mask(&request));
        self.in_flight = Some(InFlight::Mask(pending));
        Ok(())
    }

    pub fn dispatch_apply_edit<B>(&mut self, backend: Arc<B>) -> SessionResult<()>
    where
        B: EditBackend + ?Sized + 'static,
    {
        let request = self.begin_apply_edit()?;
        let pending = PendingRequest::spawn(move || backend.request_edited_image(&request));
        self.in_flight = Some(InFlight::Edit(pending));
        Ok(())
    }

    /// Delivers a finished worker result, if any. Never blocks.
    pub fn poll(&mut self) -> Option<SessionResult<Completion>> {
        match self.in_flight.take()? {
            InFlight::Mask(pending) => match pending.try_take() {
                WorkerPoll::Pending => {
                    self.in_flight = Some(InFlight::Mask(pending));
                    None
                }
                ready => Some(self.finish_mask(ready)),
            },
            InFlight::Edit(pending) => match pending.try_take() {
                WorkerPoll::Pending => {
                    self.in_flight = Some(InFlight::Edit(pending));
                    None
                }
                ready => Some(self.finish_edit(ready)),
            },
        }
    }

    /// Blocks until the dispatched request finishes. `None` when nothing is in flight.
    pub fn wait(&mut self) -> Option<SessionResult<Completion>> {
        Some(match self.in_flight.take()? {
            InFlight::Mask(pending) => self.finish_mask(pending.wait()),
            InFlight::Edit(pending) => self.finish_edit(pending.wait()),
        })
    }

    fn finish_mask(
        &mut self,
        poll: WorkerPoll<BackendResult<RgbaImage>>,
    ) -> SessionResult<Completion> {
        let result = match poll {
            WorkerPoll::Ready(result) => result,
            WorkerPoll::Pending | WorkerPoll::Lost => Err(BackendError::WorkerLost),
        };
        self.complete_subject_mask(result)
            .map(|()| Completion::MaskImported)
    }

    fn finish_edit(
        &mut self,
        poll: WorkerPoll<BackendResult<EditedImage>>,
    ) -> SessionResult<Completion> {
        let result = match poll {
            WorkerPoll::Ready(result) => result,
            WorkerPoll::Pending | WorkerPoll::Lost => Err(BackendError::WorkerLost),
        };
        self.complete_apply_edit(result)
            .map(|version_id| Completion::EditApplied { version_id })
    }

    /// Steps back one version. Stepping past the original is a no-op.
    pub fn undo(&mut self) -> SessionResult<UndoOutcome> {
        self.machine.transition(SessionEvent::Undo)?;
        let outcome = self.history.undo();
        if let UndoOutcome::Moved { cursor } = outcome {
            let (width, height) = self.history.current().dimensions();
            self.mask.resize(width, height);
            tracing::debug!(cursor, "undo applied");
        }
        Ok(outcome)
    }

    /// Canvas redraw: current raster, mask tint, bubbles.
    pub fn preview(&self) -> RgbaImage {
        compositor::compose_preview(
            self.history.current(),
            &self.mask,
            &self.annotations,
            self.font.as_ref(),
        )
    }

    pub fn flatten(&self) -> RgbaImage {
        compositor::flatten(self.history.current(), &self.annotations, self.font.as_ref())
    }

    pub fn export(&self) -> SessionResult<ExportedImage> {
        Ok(compositor::export(
            self.history.current(),
            &self.annotations,
            self.font.as_ref(),
        )?)
    }

    /// Flattens the session and hands the image to `sink`. The sink is called
    /// exactly once and the session is closed afterwards, even if it fails.
    pub fn save_and_close<S>(&mut self, sink: &mut S) -> SessionResult<()>
    where
        S: SessionSink + ?Sized,
    {
        self.machine.ensure(SessionEvent::SaveAndClose)?;
        let exported = self.export()?;
        self.machine.transition(SessionEvent::SaveAndClose)?;
        self.mask.clear();
        tracing::info!(
            version = self.history.current().id(),
            bubbles = self.annotations.len(),
            width = exported.width,
            height = exported.height,
            "session saved"
        );
        sink.on_session_complete(exported)?;
        Ok(())
    }

    /// Closes the session without emitting anything.
    pub fn cancel(&mut self) -> SessionResult<()> {
        self.machine.transition(SessionEvent::Cancel)?;
        self.mask.clear();
        tracing::info!("session cancelled");
        Ok(())
    }
}
