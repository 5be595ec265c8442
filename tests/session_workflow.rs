use std::collections::VecDeque;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use storyedit::AppError;
use storyedit::annotation::{BubbleFont, BubblePatch};
use storyedit::backend::{
    BackendError, BackendResult, EditBackend, EditRequest, EditedImage, MaskRequest,
};
use storyedit::config::EditorConfig;
use storyedit::geometry::ToolPoint;
use storyedit::history::UndoOutcome;
use storyedit::raster::{MimeType, RasterVersion};
use storyedit::session::{Completion, EditSession, SessionError, ToolMode};
use storyedit::state::SessionState;
use storyedit::storage::FileExportSink;

const V0: Rgba<u8> = Rgba([30, 60, 90, 255]);
const V1: Rgba<u8> = Rgba([120, 0, 160, 255]);
const V2: Rgba<u8> = Rgba([200, 150, 20, 255]);

fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

fn bundled_font_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fonts/DejaVuSans.ttf")
}

fn open_session() -> EditSession {
    let initial = RasterVersion::new(solid(240, 160, V0), MimeType::png());
    let font = BubbleFont::from_bytes(include_bytes!("fonts/DejaVuSans.ttf").to_vec())
        .expect("bundled font parses");
    EditSession::open_with_font(initial, &EditorConfig::default(), Some(font))
}

/// Pixels in the region that are close to the default black text colour.
fn count_dark(image: &RgbaImage, xs: Range<u32>, ys: Range<u32>) -> usize {
    ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
        .filter(|&(x, y)| image.get_pixel(x, y).0[..3].iter().all(|&c| c < 100))
        .count()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SeenEdit {
    prompt: String,
    masked: bool,
    image_id: u64,
}

/// Replays queued answers in order and records what it was asked.
#[derive(Default)]
struct ScriptedBackend {
    masks: Mutex<VecDeque<BackendResult<RgbaImage>>>,
    edits: Mutex<VecDeque<BackendResult<EditedImage>>>,
    seen: Mutex<Vec<SeenEdit>>,
}

impl ScriptedBackend {
    fn with_edits(edits: impl IntoIterator<Item = BackendResult<EditedImage>>) -> Self {
        Self {
            edits: Mutex::new(edits.into_iter().collect()),
            ..Self::default()
        }
    }

    fn queue_mask(&self, mask: BackendResult<RgbaImage>) {
        self.masks.lock().expect("masks lock").push_back(mask);
    }

    fn seen(&self) -> Vec<SeenEdit> {
        self.seen.lock().expect("seen lock").clone()
    }
}

impl EditBackend for ScriptedBackend {
    fn request_subject_mask(&self, _request: &MaskRequest) -> BackendResult<RgbaImage> {
        self.masks
            .lock()
            .expect("masks lock")
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::request("no scripted mask")))
    }

    fn request_edited_image(&self, request: &EditRequest) -> BackendResult<EditedImage> {
        self.seen.lock().expect("seen lock").push(SeenEdit {
            prompt: request.prompt.clone(),
            masked: request.is_masked(),
            image_id: request.image.id(),
        });
        self.edits
            .lock()
            .expect("edits lock")
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::request("no scripted edit")))
    }
}

fn apply(session: &mut EditSession, backend: &Arc<ScriptedBackend>, prompt: &str) -> u64 {
    session.set_prompt(prompt);
    session
        .dispatch_apply_edit(Arc::clone(backend))
        .expect("dispatch edit");
    match session.wait() {
        Some(Ok(Completion::EditApplied { version_id })) => version_id,
        other => panic!("unexpected completion: {other:?}"),
    }
}

#[test]
fn undo_then_edit_discards_the_redo_branch() {
    let backend = Arc::new(ScriptedBackend::with_edits([
        Ok(EditedImage::new(solid(240, 160, V1), MimeType::png())),
        Ok(EditedImage::new(solid(240, 160, V2), MimeType::png())),
    ]));
    let mut session = open_session();
    let v0 = session.current().id();

    let v1 = apply(&mut session, &backend, "make the sky purple");
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().cursor(), 1);
    assert_eq!(session.current().pixels().get_pixel(0, 0), &V1);

    assert_eq!(
        session.undo().expect("undo"),
        UndoOutcome::Moved { cursor: 0 }
    );
    assert_eq!(session.current().id(), v0);

    let v2 = apply(&mut session, &backend, "add a hat");
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().cursor(), 1);
    assert_eq!(session.current().id(), v2);
    assert!(!session.history().contains(v1));
    assert_eq!(session.history().original().id(), v0);

    let seen = backend.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].prompt, "make the sky purple");
    assert!(!seen[0].masked);
    assert_eq!(seen[1].image_id, v0);

    let bubble = session.add_bubble().expect("bubble");
    session
        .update_bubble(bubble, &BubblePatch::text("Hi!"))
        .expect("text");
    session
        .update_bubble(bubble, &BubblePatch::position(50, 50))
        .expect("position");

    let flattened = session.flatten();
    assert_eq!(flattened.dimensions(), (240, 160));
    assert_eq!(*flattened.get_pixel(10, 10), V2);
    assert_eq!(*flattened.get_pixel(60, 80), Rgba([255, 255, 255, 255]));
    assert_eq!(*flattened.get_pixel(200, 140), V2);
    // Default bubble is 120x60, so "Hi!" is centred on (110, 80).
    assert!(count_dark(&flattened, 95..126, 70..91) > 0);
    assert_eq!(count_dark(&flattened, 0..48, 0..160), 0);
}

#[test]
fn undo_at_the_original_is_a_quiet_noop() {
    let mut session = open_session();
    for _ in 0..3 {
        assert_eq!(session.undo().expect("undo"), UndoOutcome::AtOldest);
    }
    assert_eq!(session.history().cursor(), 0);
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn truncation_keeps_one_linear_future() {
    let edits = (0..6).map(|shade| {
        Ok(EditedImage::new(
            solid(8, 8, Rgba([shade, shade, shade, 255])),
            MimeType::png(),
        ))
    });
    let backend = Arc::new(ScriptedBackend::with_edits(edits));
    let mut session = open_session();

    let mut ids = Vec::new();
    for step in 0..5 {
        ids.push(apply(&mut session, &backend, &format!("edit {step}")));
    }
    for _ in 0..2 {
        session.undo().expect("undo");
    }
    apply(&mut session, &backend, "one more");

    // Five edits, two undos, one edit: four results after the original.
    assert_eq!(session.history().len() - 1, 5 - 2 + 1);
    assert!(!session.history().contains(ids[3]));
    assert!(!session.history().contains(ids[4]));
    assert!(session.history().contains(ids[2]));
}

#[test]
fn masked_edit_sends_the_binary_mask_and_clears_it_afterwards() {
    let backend = Arc::new(ScriptedBackend::with_edits([Ok(EditedImage::new(
        solid(240, 160, V1),
        MimeType::png(),
    ))]));
    let mut session = open_session();

    session.begin_stroke(ToolPoint::new(40, 40)).expect("stroke");
    session.extend_stroke(ToolPoint::new(80, 40));
    session.end_stroke();
    assert!(session.mask().has_selection());

    apply(&mut session, &backend, "recolor the scarf");
    assert!(backend.seen()[0].masked);
    assert!(!session.mask().has_selection());
    assert!(session
        .mask()
        .export_for_backend()
        .pixels()
        .all(|pixel| *pixel == Rgba([0, 0, 0, 255])));
}

#[test]
fn backend_failure_changes_nothing_and_allows_manual_retry() {
    let backend = Arc::new(ScriptedBackend::with_edits([
        Err(BackendError::QuotaExceeded),
        Ok(EditedImage::new(solid(240, 160, V1), MimeType::png())),
    ]));
    let mut session = open_session();
    session.begin_stroke(ToolPoint::new(10, 10)).expect("stroke");
    session.end_stroke();
    session.set_prompt("add a hat");

    session
        .dispatch_apply_edit(Arc::clone(&backend))
        .expect("dispatch");
    let result = session.wait().expect("completion");
    assert!(matches!(
        result,
        Err(SessionError::Backend(BackendError::QuotaExceeded))
    ));
    assert_eq!(session.history().len(), 1);
    assert!(session.mask().has_selection());
    assert!(session.last_error().is_some());
    assert_eq!(session.state(), SessionState::Idle);

    session
        .dispatch_apply_edit(Arc::clone(&backend))
        .expect("retry");
    assert!(matches!(
        session.wait(),
        Some(Ok(Completion::EditApplied { .. }))
    ));
    assert!(session.last_error().is_none());
    assert_eq!(backend.seen().len(), 2);
}

#[test]
fn subject_mask_round_trip_through_the_worker() {
    let backend = Arc::new(ScriptedBackend::default());
    let mut subject = solid(120, 80, Rgba([0, 0, 0, 255]));
    for y in 20..60 {
        for x in 30..90 {
            subject.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
    }
    backend.queue_mask(Ok(subject));

    let mut session = open_session();
    session
        .dispatch_subject_mask(Arc::clone(&backend))
        .expect("dispatch mask");
    assert_eq!(session.tool(), ToolMode::AiSelect);
    assert!(matches!(session.wait(), Some(Ok(Completion::MaskImported))));

    assert!(session.mask().has_selection());
    assert!(session.mask().is_selected(120, 80));
    assert!(!session.mask().is_selected(5, 5));
}

/// Blocks every call until the test releases it.
struct GatedBackend {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl EditBackend for GatedBackend {
    fn request_subject_mask(&self, _request: &MaskRequest) -> BackendResult<RgbaImage> {
        let _ = self.gate.lock().expect("gate lock").recv();
        Err(BackendError::request("unused"))
    }

    fn request_edited_image(&self, request: &EditRequest) -> BackendResult<EditedImage> {
        let _ = self.gate.lock().expect("gate lock").recv();
        let (width, height) = request.image.dimensions();
        Ok(EditedImage::new(solid(width, height, V2), MimeType::png()))
    }
}

#[test]
fn poll_delivers_on_the_calling_thread_once_the_worker_finishes() {
    let (release, gate) = mpsc::channel();
    let backend = Arc::new(GatedBackend {
        gate: Mutex::new(gate),
    });
    let mut session = open_session();
    session.set_prompt("add a hat");
    session
        .dispatch_apply_edit(backend)
        .expect("dispatch edit");

    assert!(session.poll().is_none());
    assert_eq!(session.state(), SessionState::AwaitingEdit);
    assert!(session.has_pending_request());
    assert!(matches!(session.undo(), Err(SessionError::State(_))));
    assert!(matches!(
        session.dispatch_subject_mask(Arc::new(ScriptedBackend::default())),
        Err(SessionError::State(_))
    ));

    release.send(()).expect("release worker");
    let deadline = Instant::now() + Duration::from_secs(5);
    let completion = loop {
        if let Some(result) = session.poll() {
            break result;
        }
        assert!(Instant::now() < deadline, "worker never answered");
        std::thread::sleep(Duration::from_millis(5));
    };

    assert!(matches!(completion, Ok(Completion::EditApplied { .. })));
    assert!(!session.has_pending_request());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.current().pixels().get_pixel(0, 0), &V2);
    assert_eq!(session.prompt(), "");
}

#[test]
fn manual_calls_cannot_settle_or_replace_a_dispatched_request() {
    let (release, gate) = mpsc::channel();
    let backend = Arc::new(GatedBackend {
        gate: Mutex::new(gate),
    });
    let mut session = open_session();
    session.set_prompt("add a hat");
    session
        .dispatch_apply_edit(backend)
        .expect("dispatch edit");

    let stale = EditedImage::new(solid(240, 160, Rgba([255, 0, 0, 255])), MimeType::png());
    assert!(matches!(
        session.complete_apply_edit(Ok(stale)),
        Err(SessionError::State(_))
    ));
    assert!(matches!(
        session.complete_subject_mask(Err(BackendError::QuotaExceeded)),
        Err(SessionError::State(_))
    ));
    assert!(matches!(
        session.begin_apply_edit(),
        Err(SessionError::State(_))
    ));
    assert_eq!(session.state(), SessionState::AwaitingEdit);
    assert_eq!(session.history().len(), 1);
    assert!(session.has_pending_request());

    release.send(()).expect("release worker");
    assert!(matches!(
        session.wait(),
        Some(Ok(Completion::EditApplied { .. }))
    ));
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.current().pixels().get_pixel(0, 0), &V2);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.wait().is_none());
}

struct PanickingBackend;

impl EditBackend for PanickingBackend {
    fn request_subject_mask(&self, _request: &MaskRequest) -> BackendResult<RgbaImage> {
        panic!("mask backend crashed");
    }

    fn request_edited_image(&self, _request: &EditRequest) -> BackendResult<EditedImage> {
        panic!("edit backend crashed");
    }
}

#[test]
fn lost_worker_is_reported_as_a_backend_failure() {
    let mut session = open_session();
    session
        .dispatch_subject_mask(Arc::new(PanickingBackend))
        .expect("dispatch");
    let result = session.wait().expect("completion");
    assert!(matches!(
        result,
        Err(SessionError::Backend(BackendError::WorkerLost))
    ));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.mask().has_selection());
}

#[test]
fn dyn_backends_can_be_dispatched() {
    let backend: Arc<dyn EditBackend> = Arc::new(ScriptedBackend::with_edits([Ok(
        EditedImage::new(solid(16, 16, V1), MimeType::png()),
    )]));
    let mut session = open_session();
    session.set_prompt("shrink");
    session.dispatch_apply_edit(backend).expect("dispatch");
    assert!(matches!(
        session.wait(),
        Some(Ok(Completion::EditApplied { .. }))
    ));
    assert_eq!(session.mask().dimensions(), (16, 16));
}

#[test]
fn save_writes_the_flattened_image_through_the_file_sink() {
    let root = tempfile::tempdir().expect("tempdir");
    let mut sink = FileExportSink::new(root.path(), "page-1");
    let mut session = open_session();
    session.add_bubble().expect("bubble");
    session.begin_stroke(ToolPoint::new(200, 20)).expect("stroke");
    session.end_stroke();
    let expected = session.flatten();

    session.save_and_close(&mut sink).expect("save");
    assert_eq!(session.state(), SessionState::Closed);

    let path = sink.written_path().expect("written").to_path_buf();
    let bytes = std::fs::read(path).expect("read export");
    let decoded = RasterVersion::from_bytes(&bytes, MimeType::png()).expect("decode");
    assert_eq!(decoded.pixels(), &expected);
    assert_eq!(*decoded.pixels().get_pixel(200, 20), V0);

    let mut second = FileExportSink::new(root.path(), "page-2");
    assert!(session.save_and_close(&mut second).is_err());
    assert!(second.written_path().is_none());
}

#[test]
fn headless_flatten_applies_bubble_patches() {
    let source = RasterVersion::new(solid(200, 120, V0), MimeType::png());
    let bytes = source.encode().expect("encode");
    let bubbles = storyedit::parse_bubbles(
        r##"[{"text":"Hi!","x":10,"y":10,"background_color":"#ffff00"}]"##,
    )
    .expect("parse bubbles");

    let config = EditorConfig {
        font_path: Some(bundled_font_path()),
        ..EditorConfig::default()
    };
    let exported = storyedit::flatten_with_bubbles(&bytes, MimeType::png(), &bubbles, &config)
        .expect("flatten");
    let decoded = RasterVersion::from_bytes(&exported.bytes, MimeType::png()).expect("decode");
    assert_eq!(decoded.dimensions(), (200, 120));
    assert_eq!(*decoded.pixels().get_pixel(20, 40), Rgba([255, 255, 0, 255]));
    assert_eq!(*decoded.pixels().get_pixel(190, 110), V0);
}

#[test]
fn headless_flatten_uses_the_configured_font_for_text() {
    let source = RasterVersion::new(solid(200, 120, V0), MimeType::png());
    let bytes = source.encode().expect("encode");
    let bubbles = storyedit::parse_bubbles(r#"[{"text":"Hi!","x":10,"y":10}]"#)
        .expect("parse bubbles");
    let config = EditorConfig {
        font_path: Some(bundled_font_path()),
        ..EditorConfig::default()
    };

    let exported = storyedit::flatten_with_bubbles(&bytes, MimeType::png(), &bubbles, &config)
        .expect("flatten");
    let decoded = RasterVersion::from_bytes(&exported.bytes, MimeType::png()).expect("decode");
    // Default 120x60 bubble at (10, 10): text is centred on (70, 40).
    assert!(count_dark(decoded.pixels(), 55..86, 30..51) > 0);
}

#[test]
fn headless_flatten_reports_an_unusable_font_only_when_text_needs_one() {
    let source = RasterVersion::new(solid(64, 64, V0), MimeType::png());
    let bytes = source.encode().expect("encode");
    let root = tempfile::tempdir().expect("tempdir");
    let broken = root.path().join("broken.ttf");
    std::fs::write(&broken, b"not a font").expect("write font");
    let config = EditorConfig {
        font_path: Some(broken),
        ..EditorConfig::default()
    };

    let blank = storyedit::parse_bubbles(r#"[{"text":"   "}]"#).expect("parse bubbles");
    storyedit::flatten_with_bubbles(&bytes, MimeType::png(), &blank, &config)
        .expect("blank bubbles need no font");

    let worded = storyedit::parse_bubbles(r#"[{"text":"Hi!"}]"#).expect("parse bubbles");
    match storyedit::flatten_with_bubbles(&bytes, MimeType::png(), &worded, &config) {
        // A system sans-serif font stands in for the broken file.
        Ok(exported) => assert!(!exported.bytes.is_empty()),
        Err(AppError::Font(err)) => assert!(err.to_string().contains("broken.ttf")),
        Err(other) => panic!("unexpected error: {other}"),
    }
}
