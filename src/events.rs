use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use tokio::sync::oneshot;

use crate::panel::{PropertyPanel, Selection};
use crate::processing::filters::FilterKind;
use crate::scene::ObjectId;

/// Every user action the editor understands.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    ResizeViewport {
        width: f64,
        height: f64,
    },
    AddText {
        #[serde(default)]
        content: Option<String>,
    },
    AddStamp {
        glyph: String,
    },
    Upload {
        path: PathBuf,
    },
    Generate {
        prompt: String,
        #[serde(default)]
        seed: Option<u64>,
    },
    Select {
        id: u64,
    },
    /// Pointer selection in container coordinates, mapped through the viewport.
    SelectAt {
        x: f64,
        y: f64,
    },
    Deselect,
    SetFontSize {
        size: u32,
    },
    SetFill {
        color: String,
    },
    SetFontFamily {
        family: String,
    },
    BringForward,
    SendBackward,
    Delete,
    ClearAll,
    ApplyFilter {
        filter: FilterKind,
    },
    Crop,
    SetBackground {
        color: String,
    },
    SetApiKey {
        key: String,
    },
    ClearApiKey,
    Export {
        #[serde(default)]
        multiplier: Option<u32>,
    },
    #[serde(skip)]
    Inspect(oneshot::Sender<SceneSummary>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ResizeViewport { .. } => "resize-viewport",
            Command::AddText { .. } => "add-text",
            Command::AddStamp { .. } => "add-stamp",
            Command::Upload { .. } => "upload",
            Command::Generate { .. } => "generate",
            Command::Select { .. } => "select",
            Command::SelectAt { .. } => "select-at",
            Command::Deselect => "deselect",
            Command::SetFontSize { .. } => "set-font-size",
            Command::SetFill { .. } => "set-fill",
            Command::SetFontFamily { .. } => "set-font-family",
            Command::BringForward => "bring-forward",
            Command::SendBackward => "send-backward",
            Command::Delete => "delete",
            Command::ClearAll => "clear-all",
            Command::ApplyFilter { .. } => "apply-filter",
            Command::Crop => "crop",
            Command::SetBackground { .. } => "set-background",
            Command::SetApiKey { .. } => "set-api-key",
            Command::ClearApiKey => "clear-api-key",
            Command::Export { .. } => "export",
            Command::Inspect(_) => "inspect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    ImageGenerated,
    ImageUploaded,
    Exported(PathBuf),
    Cropped,
    ApiKeySaved,
    ApiKeyCleared,
    PromptRequired,
    ApiKeyRequired,
    SelectImageFirst,
    InvalidInput,
    Busy,
    TranslationSkipped,
    NetworkFailure,
    PermissionDenied,
    RateLimited,
    ProviderRejected,
    InvalidAsset,
    LoadFailed,
    ExportFailed,
    StorageFailed,
    /// A background job ended without a result.
    JobFailed,
}

impl NoticeKind {
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            NoticeKind::ImageGenerated
                | NoticeKind::ImageUploaded
                | NoticeKind::Exported(_)
                | NoticeKind::Cropped
                | NoticeKind::ApiKeySaved
                | NoticeKind::ApiKeyCleared
        )
    }
}

/// Transient user-facing message (the toast of a graphical front end).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    /// Raw provider response kept for diagnosis.
    pub detail: Option<String>,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Read-only view of the editor state, answered to `Command::Inspect`.
#[derive(Debug, Clone)]
pub struct SceneSummary {
    pub objects: Vec<ObjectSummary>,
    pub selection: Selection,
    pub panel: PropertyPanel,
    pub background: String,
    pub viewport_scale: f64,
    pub revision: u64,
    pub has_api_key: bool,
    pub generate_enabled: bool,
    pub upload_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub id: ObjectId,
    pub kind: &'static str,
    pub bounds: (f64, f64, f64, f64),
    pub scale: (f64, f64),
    pub filter: Option<FilterKind>,
    pub clipped: bool,
    pub tainted: bool,
}
