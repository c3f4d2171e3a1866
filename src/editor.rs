//! Single owner of the scene. Commands are applied synchronously here; the
//! network-bound ones come back as [`PendingJob`]s for the dispatcher to run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::credentials::CredentialStore;
use crate::error::{EditorError, MissingField, Result};
use crate::events::{Command, Notice, NoticeKind, ObjectSummary, SceneSummary};
use crate::panel::{PropertyPanel, SelectionState};
use crate::processing::color::HexColor;
use crate::processing::filters::FilterKind;
use crate::processing::layout::{PlacementPolicy, Viewport, compute_placement};
use crate::render::export::{ExportedImage, export_scene};
use crate::render::text::FontBook;
use crate::scene::{
    Bitmap, BitmapObject, ClipRect, ObjectId, ObjectKind, Scene, StampGlyph, TextRun,
};
use crate::tasks::busy::{BusyGuard, Control, Controls};
use crate::tasks::loader::LoadError;

/// Work that has to leave the editor to finish.
#[derive(Debug)]
pub enum Job {
    Upload {
        path: PathBuf,
    },
    Generate {
        prompt: String,
        seed: Option<u64>,
        api_key: Option<String>,
    },
}

impl Job {
    pub fn control(&self) -> Control {
        match self {
            Job::Upload { .. } => Control::Upload,
            Job::Generate { .. } => Control::Generate,
        }
    }
}

/// A job together with the guard that keeps its control disabled.
#[derive(Debug)]
pub struct PendingJob {
    pub job: Job,
    pub guard: BusyGuard,
}

#[derive(Debug)]
pub enum Outcome {
    Done(Option<Notice>),
    Spawn(PendingJob),
}

impl Outcome {
    fn quiet() -> Self {
        Outcome::Done(None)
    }

    fn notice(kind: NoticeKind, message: impl Into<String>) -> Self {
        Outcome::Done(Some(Notice::new(kind, message)))
    }
}

pub struct Editor {
    config: Arc<Configuration>,
    scene: Scene,
    selection: SelectionState,
    viewport: Viewport,
    controls: Controls,
    credentials: CredentialStore,
    fonts: FontBook,
}

impl Editor {
    pub fn new(config: Arc<Configuration>, credentials: CredentialStore, fonts: FontBook) -> Self {
        let canvas = &config.canvas;
        let scene = Scene::new(canvas.width, canvas.height, canvas.background);
        let text = &config.text;
        let selection = SelectionState::new(PropertyPanel::new(
            text.font_size,
            text.fill,
            text.font_family.clone(),
        ));
        let mut viewport = Viewport::new(canvas.width, canvas.height, config.viewport.padding);
        let [container_w, container_h] = config.viewport.initial_container;
        viewport.resize(container_w, container_h);
        Self {
            config,
            scene,
            selection,
            viewport,
            controls: Controls::new(),
            credentials,
            fonts,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn apply(&mut self, command: Command) -> Outcome {
        debug!(command = command.name(), "applying command");
        match command {
            Command::ResizeViewport { width, height } => {
                let scale = self.viewport.resize(width, height);
                debug!(width, height, scale, "viewport resized");
                Outcome::quiet()
            }
            Command::AddText { content } => self.add_text(content),
            Command::AddStamp { glyph } => self.add_stamp(glyph),
            Command::Upload { path } => self.start(Job::Upload { path }),
            Command::Generate { prompt, seed } => self.start_generate(prompt, seed),
            Command::Select { id } => {
                if self.selection.select(&self.scene, ObjectId(id)) {
                    Outcome::quiet()
                } else {
                    Outcome::notice(NoticeKind::InvalidInput, format!("No object {}", ObjectId(id)))
                }
            }
            Command::SelectAt { x, y } => {
                let hit = self
                    .viewport
                    .to_logical(x, y)
                    .and_then(|(lx, ly)| self.scene.hit_test(lx, ly));
                match hit {
                    Some(id) => {
                        self.selection.select(&self.scene, id);
                    }
                    None => self.selection.deselect(),
                }
                Outcome::quiet()
            }
            Command::Deselect => {
                self.selection.deselect();
                Outcome::quiet()
            }
            Command::SetFontSize { size } => {
                if size == 0 {
                    return Outcome::notice(NoticeKind::InvalidInput, "Font size must be positive");
                }
                self.selection.set_font_size(&mut self.scene, size);
                Outcome::quiet()
            }
            Command::SetFill { color } => match HexColor::parse(&color) {
                Some(fill) => {
                    self.selection.set_fill(&mut self.scene, fill);
                    Outcome::quiet()
                }
                None => invalid_colour(&color),
            },
            Command::SetFontFamily { family } => {
                let family = family.trim();
                if family.is_empty() {
                    return Outcome::notice(NoticeKind::InvalidInput, "Font family is empty");
                }
                self.selection.set_font_family(&mut self.scene, family);
                Outcome::quiet()
            }
            Command::BringForward => {
                if let Some(id) = self.selection.selection().id() {
                    self.scene.bring_forward(id);
                }
                Outcome::quiet()
            }
            Command::SendBackward => {
                if let Some(id) = self.selection.selection().id() {
                    self.scene.send_backward(id);
                }
                Outcome::quiet()
            }
            Command::Delete => {
                if let Some(id) = self.selection.selection().id() {
                    self.scene.remove(id);
                    self.selection.reconcile(&self.scene);
                }
                Outcome::quiet()
            }
            Command::ClearAll => {
                let removed = self.scene.clear();
                self.selection.deselect();
                debug!(removed, "scene cleared");
                Outcome::quiet()
            }
            Command::ApplyFilter { filter } => self.apply_filter(filter),
            Command::Crop => self.crop_selected(),
            Command::SetBackground { color } => match HexColor::parse(&color) {
                Some(bg) => {
                    self.scene.set_background(bg);
                    Outcome::quiet()
                }
                None => invalid_colour(&color),
            },
            Command::SetApiKey { key } => match self.credentials.save(key.trim()) {
                Ok(()) => Outcome::notice(NoticeKind::ApiKeySaved, "API key saved"),
                Err(err) => storage_failed(self.credentials.path(), err),
            },
            Command::ClearApiKey => match self.credentials.clear() {
                Ok(()) => Outcome::notice(NoticeKind::ApiKeyCleared, "API key removed"),
                Err(err) => storage_failed(self.credentials.path(), err),
            },
            Command::Export { multiplier } => {
                let multiplier = multiplier.unwrap_or(self.config.export.multiplier);
                let max = self.config.export.max_multiplier;
                if multiplier == 0 || multiplier > max {
                    return Outcome::notice(
                        NoticeKind::InvalidInput,
                        format!("Export multiplier must be between 1 and {max}"),
                    );
                }
                match self.export_to_disk(multiplier) {
                    Ok(path) => {
                        let message = format!("Saved {}", path.display());
                        Outcome::notice(NoticeKind::Exported(path), message)
                    }
                    Err(err) => {
                        warn!(error = %err, "export failed");
                        Outcome::Done(Some(notice_for(&err)))
                    }
                }
            }
            Command::Inspect(reply) => {
                if reply.send(self.summary()).is_err() {
                    debug!("inspect requester went away");
                }
                Outcome::quiet()
            }
        }
    }

    fn add_text(&mut self, content: Option<String>) -> Outcome {
        let text = &self.config.text;
        let content = content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| text.default_content.clone());
        let id = self.scene.add(
            ObjectKind::Text(TextRun {
                content,
                font_family: text.font_family.clone(),
                font_size: text.font_size,
                font_weight: text.font_weight,
                fill: text.fill,
            }),
            text.left,
            text.top,
        );
        self.selection.select(&self.scene, id);
        Outcome::quiet()
    }

    fn add_stamp(&mut self, glyph: String) -> Outcome {
        let glyph = glyph.trim();
        if glyph.is_empty() {
            return Outcome::notice(NoticeKind::InvalidInput, "Stamp glyph is empty");
        }
        if !self.config.stamps.glyphs.iter().any(|g| g == glyph) {
            return Outcome::notice(
                NoticeKind::InvalidInput,
                format!("{glyph} is not in the stamp palette"),
            );
        }
        let id = self.scene.add(
            ObjectKind::Stamp(StampGlyph {
                glyph: glyph.to_string(),
                font_size: self.config.stamps.font_size,
            }),
            0.0,
            0.0,
        );
        self.scene.center_object(id);
        self.selection.select(&self.scene, id);
        Outcome::quiet()
    }

    fn start_generate(&mut self, prompt: String, seed: Option<u64>) -> Outcome {
        let api_key = self.credentials.api_key().map(str::to_string);
        if self.config.generation.provider.requires_key() && api_key.is_none() {
            return Outcome::Done(Some(notice_for(&EditorError::MissingInput(
                MissingField::ApiKey,
            ))));
        }
        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Outcome::Done(Some(notice_for(&EditorError::MissingInput(
                MissingField::Prompt,
            ))));
        }
        self.start(Job::Generate {
            prompt,
            seed,
            api_key,
        })
    }

    fn start(&mut self, job: Job) -> Outcome {
        let control = job.control();
        match self.controls.try_acquire(control) {
            Some(guard) => Outcome::Spawn(PendingJob { job, guard }),
            None => {
                debug!(?control, "control busy; request ignored");
                Outcome::notice(NoticeKind::Busy, "Still working on the previous request")
            }
        }
    }

    fn selected_bitmap_mut(&mut self) -> Option<&mut BitmapObject> {
        let id = self.selection.selection().id()?;
        self.scene.get_mut(id)?.as_bitmap_mut()
    }

    fn apply_filter(&mut self, filter: FilterKind) -> Outcome {
        let Some(bitmap) = self.selected_bitmap_mut() else {
            return select_image_first();
        };
        bitmap.filter = filter;
        self.scene.request_render();
        Outcome::quiet()
    }

    fn crop_selected(&mut self) -> Outcome {
        let fraction = self.config.crop.fraction;
        let Some(bitmap) = self.selected_bitmap_mut() else {
            return select_image_first();
        };
        let (w, h) = bitmap.bitmap.dimensions();
        bitmap.clip = Some(ClipRect::centered(f64::from(w), f64::from(h), fraction));
        self.scene.request_render();
        Outcome::notice(NoticeKind::Cropped, "Cropped to the centre")
    }

    /// Sizes and centres a decoded bitmap, adds it on top and selects it.
    pub fn place_bitmap(&mut self, bitmap: Bitmap, policy: PlacementPolicy) -> Result<ObjectId> {
        let (w, h) = bitmap.dimensions();
        let placement = compute_placement(w, h, self.scene.width(), self.scene.height(), policy)?;
        let id = self.scene.add(
            ObjectKind::Bitmap(BitmapObject {
                bitmap,
                filter: FilterKind::None,
                clip: None,
            }),
            placement.left,
            placement.top,
        );
        if let Some(object) = self.scene.get_mut(id) {
            object.apply_placement(&placement);
        }
        self.selection.select(&self.scene, id);
        info!(%id, width = w, height = h, scale = placement.scale_x, "bitmap placed");
        Ok(id)
    }

    /// Places the result of a finished job and reports it.
    pub fn complete_job(&mut self, control: Control, result: Result<Bitmap>) -> Notice {
        let (policy, kind, message) = match control {
            Control::Upload => (
                self.config.placement.upload,
                NoticeKind::ImageUploaded,
                "Image loaded",
            ),
            Control::Generate => (
                self.config.placement.generated,
                NoticeKind::ImageGenerated,
                "Image generated",
            ),
        };
        match result.and_then(|bitmap| self.place_bitmap(bitmap, policy)) {
            Ok(_) => Notice::new(kind, message),
            Err(err) => {
                warn!(?control, error = %err, "job failed");
                notice_for(&err)
            }
        }
    }

    pub fn export(&self, multiplier: u32) -> Result<ExportedImage> {
        export_scene(
            &self.scene,
            &self.fonts,
            multiplier,
            &self.config.export.file_prefix,
            Utc::now(),
        )
    }

    fn export_to_disk(&self, multiplier: u32) -> Result<PathBuf> {
        let exported = self.export(multiplier)?;
        let dir = &self.config.export.output_dir;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&exported.file_name);
        std::fs::write(&path, &exported.png)?;
        Ok(path)
    }

    pub fn summary(&self) -> SceneSummary {
        let objects = self
            .scene
            .objects()
            .iter()
            .map(|object| {
                let bitmap = match &object.kind {
                    ObjectKind::Bitmap(b) => Some(b),
                    _ => None,
                };
                ObjectSummary {
                    id: object.id,
                    kind: object.kind.label(),
                    bounds: object.bounds(),
                    scale: (object.scale_x, object.scale_y),
                    filter: bitmap.map(|b| b.filter),
                    clipped: bitmap.is_some_and(|b| b.clip.is_some()),
                    tainted: bitmap.is_some_and(|b| b.bitmap.origin.is_tainted()),
                }
            })
            .collect();
        SceneSummary {
            objects,
            selection: self.selection.selection(),
            panel: self.selection.panel().clone(),
            background: self.scene.background().to_string(),
            viewport_scale: self.viewport.scale(),
            revision: self.scene.revision(),
            has_api_key: self.credentials.api_key().is_some(),
            generate_enabled: self.controls.is_enabled(Control::Generate),
            upload_enabled: self.controls.is_enabled(Control::Upload),
        }
    }
}

/// User-facing notice for a failed operation.
pub fn notice_for(err: &EditorError) -> Notice {
    match err {
        EditorError::MissingInput(MissingField::Prompt) => {
            Notice::new(NoticeKind::PromptRequired, "Enter a prompt first")
        }
        EditorError::MissingInput(MissingField::ApiKey) => {
            Notice::new(NoticeKind::ApiKeyRequired, "Enter an API key first")
        }
        EditorError::ProviderRejection {
            status: 401 | 403,
            body,
        } => Notice::new(
            NoticeKind::PermissionDenied,
            "The provider refused the API key",
        )
        .with_detail(body.clone()),
        EditorError::ProviderRejection { status: 429, body } => Notice::new(
            NoticeKind::RateLimited,
            "Generation limit reached, try again later",
        )
        .with_detail(body.clone()),
        EditorError::ProviderRejection { status, body } => Notice::new(
            NoticeKind::ProviderRejected,
            format!("Generation failed (status {status})"),
        )
        .with_detail(body.clone()),
        EditorError::InvalidEndpoint(endpoint) => Notice::new(
            NoticeKind::ProviderRejected,
            "Generation endpoint is misconfigured",
        )
        .with_detail(endpoint.clone()),
        EditorError::Network(_)
        | EditorError::Timeout
        | EditorError::Load(LoadError::Network(_) | LoadError::Timeout(_)) => {
            Notice::new(NoticeKind::NetworkFailure, "Connection error")
                .with_detail(err.to_string())
        }
        EditorError::InvalidAsset(_) | EditorError::Load(LoadError::InvalidAsset(_)) => {
            Notice::new(NoticeKind::InvalidAsset, "The image could not be decoded")
                .with_detail(err.to_string())
        }
        EditorError::Load(_) => Notice::new(NoticeKind::LoadFailed, "The image could not be loaded")
            .with_detail(err.to_string()),
        EditorError::TaintedExport => Notice::new(
            NoticeKind::ExportFailed,
            "Export blocked: a cross-origin image was loaded without permission",
        ),
        EditorError::ExportTooLarge { .. } => {
            Notice::new(NoticeKind::InvalidInput, "Export size is too large")
                .with_detail(err.to_string())
        }
        EditorError::Io(_) | EditorError::Encode(_) | EditorError::Render(_) => {
            Notice::new(NoticeKind::ExportFailed, "Export failed").with_detail(err.to_string())
        }
    }
}

fn select_image_first() -> Outcome {
    Outcome::notice(NoticeKind::SelectImageFirst, "Select an image first")
}

fn invalid_colour(raw: &str) -> Outcome {
    Outcome::notice(NoticeKind::InvalidInput, format!("Not a colour: {raw}"))
}

fn storage_failed(slot: &Path, err: anyhow::Error) -> Outcome {
    warn!(path = %slot.display(), error = %err, "credential slot update failed");
    Outcome::Done(Some(
        Notice::new(NoticeKind::StorageFailed, "Could not update the saved API key")
            .with_detail(format!("{err:#}")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::Selection;
    use image::{Rgba, RgbaImage};

    fn editor() -> (Editor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Configuration::default();
        config.export.output_dir = dir.path().join("out");
        let credentials = CredentialStore::open(dir.path().join("key.json")).unwrap();
        (
            Editor::new(Arc::new(config), credentials, FontBook::empty()),
            dir,
        )
    }

    fn notice(outcome: Outcome) -> Option<Notice> {
        match outcome {
            Outcome::Done(notice) => notice,
            Outcome::Spawn(pending) => panic!("unexpected job {:?}", pending.job),
        }
    }

    fn kind(outcome: Outcome) -> Option<NoticeKind> {
        notice(outcome).map(|n| n.kind)
    }

    fn bitmap(w: u32, h: u32) -> Bitmap {
        Bitmap::new(
            RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255])),
            crate::scene::BitmapOrigin::Local,
        )
    }

    #[test]
    fn add_then_delete_restores_scene() {
        let (mut ed, _dir) = editor();
        assert!(ed.scene().is_empty());
        assert_eq!(kind(ed.apply(Command::AddText { content: None })), None);
        assert_eq!(ed.scene().len(), 1);
        let id = ed.scene().objects()[0].id;
        assert_eq!(ed.selection().selection(), Selection::Selected(id));
        assert!(ed.selection().panel().delete_visible);

        ed.apply(Command::Delete);
        assert!(ed.scene().is_empty());
        assert_eq!(ed.selection().selection(), Selection::None);
        assert!(!ed.selection().panel().delete_visible);
    }

    #[test]
    fn new_text_uses_configured_defaults() {
        let (mut ed, _dir) = editor();
        ed.apply(Command::AddText { content: None });
        let object = &ed.scene().objects()[0];
        assert_eq!((object.left, object.top), (200.0, 200.0));
        match &object.kind {
            ObjectKind::Text(t) => {
                assert_eq!(t.content, "Text Here");
                assert_eq!(t.font_size, 120);
                assert_eq!(t.font_weight, 900);
            }
            other => panic!("expected text, got {}", other.label()),
        }
    }

    #[test]
    fn stamps_are_centred() {
        let (mut ed, _dir) = editor();
        ed.apply(Command::AddStamp { glyph: "🔥".into() });
        let (cx, cy) = ed.scene().objects()[0].center();
        assert!((cx - 540.0).abs() < 1e-9 && (cy - 540.0).abs() < 1e-9);
        assert_eq!(
            kind(ed.apply(Command::AddStamp { glyph: "  ".into() })),
            Some(NoticeKind::InvalidInput)
        );
        assert_eq!(ed.scene().len(), 1);
    }

    #[test]
    fn stamps_come_from_the_palette() {
        let (mut ed, _dir) = editor();
        for glyph in ["🦄", "x", "🔥🔥"] {
            assert_eq!(
                kind(ed.apply(Command::AddStamp { glyph: glyph.into() })),
                Some(NoticeKind::InvalidInput),
                "accepted {glyph}"
            );
        }
        assert!(ed.scene().is_empty());
        assert_eq!(kind(ed.apply(Command::AddStamp { glyph: " 📸 ".into() })), None);
        assert_eq!(ed.scene().len(), 1);
    }

    #[test]
    fn filter_and_crop_require_selected_bitmap() {
        let (mut ed, _dir) = editor();
        assert_eq!(kind(ed.apply(Command::Crop)), Some(NoticeKind::SelectImageFirst));
        ed.apply(Command::AddText { content: None });
        let revision = ed.scene().revision();
        assert_eq!(
            kind(ed.apply(Command::ApplyFilter {
                filter: FilterKind::Sepia
            })),
            Some(NoticeKind::SelectImageFirst)
        );
        assert_eq!(ed.scene().revision(), revision);
    }

    #[test]
    fn placed_upload_is_fitted_selected_and_editable() {
        let (mut ed, _dir) = editor();
        let notice = ed.complete_job(Control::Upload, Ok(bitmap(2000, 1000)));
        assert_eq!(notice.kind, NoticeKind::ImageUploaded);

        let summary = ed.summary();
        let placed = &summary.objects[0];
        let (l, t, w, h) = placed.bounds;
        assert!((w - 864.0).abs() < 1e-6 && (h - 432.0).abs() < 1e-6);
        assert!((l - 108.0).abs() < 1e-6 && (t - 324.0).abs() < 1e-6);
        assert_eq!(summary.selection, Selection::Selected(placed.id));

        ed.apply(Command::ApplyFilter {
            filter: FilterKind::Vintage,
        });
        assert_eq!(kind(ed.apply(Command::Crop)), Some(NoticeKind::Cropped));
        let placed = &ed.summary().objects[0];
        assert_eq!(placed.filter, Some(FilterKind::Vintage));
        assert!(placed.clipped);
        assert!(!placed.tainted);
    }

    #[test]
    fn failed_job_inserts_nothing() {
        let (mut ed, _dir) = editor();
        let notice = ed.complete_job(
            Control::Generate,
            Err(EditorError::ProviderRejection {
                status: 403,
                body: "denied".into(),
            }),
        );
        assert_eq!(notice.kind, NoticeKind::PermissionDenied);
        assert_eq!(notice.detail.as_deref(), Some("denied"));
        assert!(ed.scene().is_empty());
    }

    #[test]
    fn generate_checks_inputs_then_disables_control() {
        let (mut ed, _dir) = editor();
        let generate = |prompt: &str| Command::Generate {
            prompt: prompt.into(),
            seed: None,
        };
        assert_eq!(kind(ed.apply(generate("sunset"))), Some(NoticeKind::ApiKeyRequired));
        assert_eq!(
            kind(ed.apply(Command::SetApiKey { key: "k-1".into() })),
            Some(NoticeKind::ApiKeySaved)
        );
        assert_eq!(kind(ed.apply(generate("   "))), Some(NoticeKind::PromptRequired));
        assert!(ed.controls().is_enabled(Control::Generate));

        let pending = match ed.apply(generate(" sunset ")) {
            Outcome::Spawn(pending) => pending,
            Outcome::Done(n) => panic!("expected a job, got {n:?}"),
        };
        match &pending.job {
            Job::Generate {
                prompt, api_key, ..
            } => {
                assert_eq!(prompt, "sunset");
                assert_eq!(api_key.as_deref(), Some("k-1"));
            }
            other => panic!("unexpected job {other:?}"),
        }
        assert!(!ed.summary().generate_enabled);
        assert_eq!(kind(ed.apply(generate("again"))), Some(NoticeKind::Busy));
        drop(pending);
        assert!(ed.summary().generate_enabled);
    }

    #[test]
    fn pointer_selection_and_panel_edits() {
        let (mut ed, _dir) = editor();
        ed.apply(Command::AddText {
            content: Some("Hi".into()),
        });
        ed.apply(Command::Deselect);
        // Unit display scale with a 32px margin on each side.
        ed.apply(Command::ResizeViewport {
            width: 1144.0,
            height: 1144.0,
        });
        assert!((ed.viewport().scale() - 1.0).abs() < 1e-12);
        ed.apply(Command::SelectAt { x: 242.0, y: 242.0 });
        assert!(ed.selection().selection().id().is_some());
        ed.apply(Command::SetFill {
            color: "#ff0000".into(),
        });
        assert_eq!(ed.selection().panel().fill, HexColor([255, 0, 0]));
        assert_eq!(
            kind(ed.apply(Command::SetFill {
                color: "red-ish".into()
            })),
            Some(NoticeKind::InvalidInput)
        );
        ed.apply(Command::SelectAt { x: 40.0, y: 40.0 });
        assert_eq!(ed.selection().selection(), Selection::None);
    }

    #[test]
    fn background_and_export() {
        let (mut ed, dir) = editor();
        ed.apply(Command::SetBackground {
            color: "#FFF".into(),
        });
        assert_eq!(ed.summary().background, "#ffffff");
        ed.complete_job(Control::Generate, Ok(bitmap(64, 32)));

        let outcome = notice(ed.apply(Command::Export { multiplier: Some(1) })).unwrap();
        let NoticeKind::Exported(path) = outcome.kind else {
            panic!("expected export, got {outcome:?}");
        };
        assert!(path.starts_with(dir.path().join("out")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Creative-AI-Pro-") && name.ends_with(".png"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1080));
    }

    #[test]
    fn oversized_export_is_refused_and_editor_stays_usable() {
        let (mut ed, dir) = editor();
        ed.complete_job(Control::Generate, Ok(bitmap(64, 32)));
        for multiplier in [4_000_000, 9, 0] {
            assert_eq!(
                kind(ed.apply(Command::Export {
                    multiplier: Some(multiplier)
                })),
                Some(NoticeKind::InvalidInput),
                "multiplier {multiplier}"
            );
        }
        assert!(!dir.path().join("out").exists());

        let outcome = notice(ed.apply(Command::Export { multiplier: Some(1) })).unwrap();
        assert!(matches!(outcome.kind, NoticeKind::Exported(_)), "{outcome:?}");
    }

    #[test]
    fn export_too_large_maps_to_invalid_input() {
        let n = notice_for(&EditorError::ExportTooLarge { multiplier: 64 });
        assert_eq!(n.kind, NoticeKind::InvalidInput);
        assert!(n.detail.unwrap().contains("64x"));
    }
}
