use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::processing::color::HexColor;
use crate::processing::layout::{FitMode, PlacementPolicy};
use crate::render::export::MAX_EXPORT_SIDE;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CanvasSettings {
    /// Logical canvas width in pixels.
    pub width: u32,
    /// Logical canvas height in pixels.
    pub height: u32,
    pub background: HexColor,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
            background: HexColor([0x0f, 0x17, 0x2a]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ViewportSettings {
    /// Space kept free around the displayed canvas inside its container.
    pub padding: f64,
    /// Container size assumed at startup, before the first resize signal.
    pub initial_container: [f64; 2],
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            padding: 64.0,
            initial_container: [1280.0, 960.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlacementSettings {
    /// Policy for user uploads.
    pub upload: PlacementPolicy,
    /// Policy for generated images.
    pub generated: PlacementPolicy,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            upload: PlacementPolicy::fit(0.8),
            generated: PlacementPolicy::fit(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    /// Request with an `Origin` header and require the response to allow it.
    #[default]
    Anonymous,
    /// Plain fetch; remote bitmaps are tainted for export.
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LoaderSettings {
    /// Upper bound on a single fetch + decode.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub cross_origin: CrossOrigin,
    /// Origin presented on anonymous cross-origin requests.
    pub origin: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cross_origin: CrossOrigin::Anonymous,
            origin: "http://localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Key-authenticated JSON predict endpoint returning base64 PNG bytes.
    #[default]
    Imagen,
    /// Unauthenticated GET-by-URL endpoint returning raw image bytes.
    Pollinations,
}

impl ProviderKind {
    /// Whether the provider refuses to run without an API key.
    pub fn requires_key(self) -> bool {
        self == ProviderKind::Imagen
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ImagenSettings {
    pub endpoint: String,
    pub model: String,
    pub sample_count: u32,
    pub aspect_ratio: String,
}

impl Default for ImagenSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "imagen-3.0-generate-001".to_string(),
            sample_count: 1,
            aspect_ratio: "1:1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PollinationsSettings {
    pub endpoint: String,
    pub width: u32,
    pub height: u32,
    pub nologo: bool,
}

impl Default for PollinationsSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://image.pollinations.ai/prompt".to_string(),
            width: 1080,
            height: 1080,
            nologo: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TranslationSettings {
    /// Translate prompts containing non-Latin letters before generation.
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GenerationSettings {
    pub provider: ProviderKind,
    /// Bound on each provider round-trip.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub imagen: ImagenSettings,
    pub pollinations: PollinationsSettings,
    pub translation: TranslationSettings,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Imagen,
            request_timeout: Duration::from_secs(60),
            imagen: ImagenSettings::default(),
            pollinations: PollinationsSettings::default(),
            translation: TranslationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TextSettings {
    pub default_content: String,
    pub font_family: String,
    pub font_size: u32,
    pub font_weight: u16,
    pub fill: HexColor,
    /// Insertion point of new text, top-left corner in logical pixels.
    pub left: f64,
    pub top: f64,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            default_content: "Text Here".to_string(),
            font_family: "Inter".to_string(),
            font_size: 120,
            font_weight: 900,
            fill: HexColor::WHITE,
            left: 200.0,
            top: 200.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct StampSettings {
    /// Glyphs offered in the stamp palette.
    pub glyphs: Vec<String>,
    pub font_size: u32,
}

impl Default for StampSettings {
    fn default() -> Self {
        let glyphs = [
            "✨", "🔥", "👑", "💖", "📍", "🌈", "⚡", "💬", "🚀", "💯", "🎨", "📸",
        ];
        Self {
            glyphs: glyphs.iter().map(|g| g.to_string()).collect(),
            font_size: 180,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CropSettings {
    /// Share of the bitmap kept by the centre crop, per axis.
    pub fraction: f64,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self { fraction: 0.7 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ExportSettings {
    /// Integer resolution multiplier over the logical canvas.
    pub multiplier: u32,
    /// Largest multiplier an `export` command may ask for.
    pub max_multiplier: u32,
    pub file_prefix: String,
    pub output_dir: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            multiplier: 2,
            max_multiplier: 8,
            file_prefix: "Creative-AI-Pro".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CredentialSettings {
    /// File holding the persisted API key slot.
    pub path: PathBuf,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("creative-canvas-credentials.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    pub canvas: CanvasSettings,
    pub viewport: ViewportSettings,
    pub placement: PlacementSettings,
    pub loader: LoaderSettings,
    pub generation: GenerationSettings,
    pub text: TextSettings,
    pub stamps: StampSettings,
    pub crop: CropSettings,
    pub export: ExportSettings,
    pub credentials: CredentialSettings,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_yaml::from_str(&s)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.canvas.width > 0 && self.canvas.height > 0,
            "canvas width and height must be greater than zero"
        );
        ensure!(
            self.viewport.padding.is_finite() && self.viewport.padding >= 0.0,
            "viewport.padding must be a non-negative number"
        );
        validate_policy(&self.placement.upload).context("invalid placement.upload")?;
        validate_policy(&self.placement.generated).context("invalid placement.generated")?;
        ensure!(
            self.loader.timeout > Duration::ZERO,
            "loader.timeout must be positive"
        );
        ensure!(
            !self.loader.origin.trim().is_empty(),
            "loader.origin must not be empty"
        );
        ensure!(
            self.generation.request_timeout > Duration::ZERO,
            "generation.request-timeout must be positive"
        );
        ensure!(
            self.generation.imagen.sample_count >= 1,
            "generation.imagen.sample-count must be >= 1"
        );
        ensure!(
            self.generation.pollinations.width > 0 && self.generation.pollinations.height > 0,
            "generation.pollinations width and height must be greater than zero"
        );
        ensure!(self.text.font_size > 0, "text.font-size must be greater than zero");
        ensure!(
            self.stamps.font_size > 0,
            "stamps.font-size must be greater than zero"
        );
        ensure!(
            self.crop.fraction > 0.0 && self.crop.fraction <= 1.0,
            "crop.fraction must be in (0, 1]"
        );
        ensure!(
            self.export.multiplier >= 1 && self.export.multiplier <= self.export.max_multiplier,
            "export.multiplier must be in [1, export.max-multiplier]"
        );
        let longest = u64::from(self.canvas.width.max(self.canvas.height));
        ensure!(
            longest * u64::from(self.export.max_multiplier) <= u64::from(MAX_EXPORT_SIDE),
            "export.max-multiplier exceeds the {MAX_EXPORT_SIDE}px export side limit for this canvas"
        );
        ensure!(
            !self.export.file_prefix.is_empty(),
            "export.file-prefix must not be empty"
        );
        ensure!(
            !self.credentials.path.as_os_str().is_empty(),
            "credentials.path must not be empty"
        );
        Ok(self)
    }
}

fn validate_policy(policy: &PlacementPolicy) -> Result<()> {
    ensure!(
        policy.shrink.is_finite() && policy.shrink > 0.0 && policy.shrink <= 1.0,
        "shrink must be in (0, 1]"
    );
    if policy.mode == FitMode::Cover {
        ensure!(
            (policy.shrink - 1.0).abs() < f64::EPSILON,
            "cover mode does not take a shrink factor"
        );
    }
    Ok(())
}
