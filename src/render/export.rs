use std::io::Cursor;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use fast_image_resize as fir;
use image::{ImageFormat, Rgba, RgbaImage, imageops};
use tracing::{debug, info};

use crate::error::{EditorError, Result};
use crate::processing::filters::apply_filter;
use crate::render::text::{FontBook, draw_text};
use crate::scene::{BitmapObject, ObjectKind, Scene, SceneObject};

const STAMP_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);
const STAMP_FAMILY: &str = "Noto Emoji";
const STAMP_WEIGHT: u16 = 400;

/// Longest side, in pixels, a rendered export may have.
pub const MAX_EXPORT_SIDE: u32 = 16_384;

/// Encoded export, ready to be written or downloaded.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// `<prefix>-<unix millis>.png`
pub fn export_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}.png", prefix, at.timestamp_millis())
}

/// Rasterises the scene at `multiplier` times its logical resolution.
pub fn render_scene(scene: &Scene, fonts: &FontBook, multiplier: u32) -> Result<RgbaImage> {
    if scene
        .objects()
        .iter()
        .any(|o| matches!(&o.kind, ObjectKind::Bitmap(b) if b.bitmap.origin.is_tainted()))
    {
        return Err(EditorError::TaintedExport);
    }

    let m = multiplier.max(1);
    let (width, height) =
        export_size(scene, m).ok_or(EditorError::ExportTooLarge { multiplier: m })?;
    let mut canvas = RgbaImage::from_pixel(width, height, scene.background().to_rgba());
    let factor = f64::from(m);

    for object in scene.objects() {
        match &object.kind {
            ObjectKind::Bitmap(bitmap) => draw_bitmap(&mut canvas, object, bitmap, factor)?,
            ObjectKind::Text(text) => {
                let font = fonts.resolve(&text.font_family, text.font_weight);
                draw_run(
                    &mut canvas,
                    object,
                    font.as_ref(),
                    &text.content,
                    text.fill.to_rgba(),
                    text.font_size,
                    factor,
                );
            }
            ObjectKind::Stamp(stamp) => {
                let font = fonts.resolve(STAMP_FAMILY, STAMP_WEIGHT);
                draw_run(
                    &mut canvas,
                    object,
                    font.as_ref(),
                    &stamp.glyph,
                    STAMP_FILL,
                    stamp.font_size,
                    factor,
                );
            }
        }
    }
    Ok(canvas)
}

fn export_size(scene: &Scene, multiplier: u32) -> Option<(u32, u32)> {
    let width = scene.width().checked_mul(multiplier)?;
    let height = scene.height().checked_mul(multiplier)?;
    (width <= MAX_EXPORT_SIDE && height <= MAX_EXPORT_SIDE).then_some((width, height))
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

pub fn export_scene(
    scene: &Scene,
    fonts: &FontBook,
    multiplier: u32,
    prefix: &str,
    at: DateTime<Utc>,
) -> Result<ExportedImage> {
    let image = render_scene(scene, fonts, multiplier)?;
    let png = encode_png(&image)?;
    let file_name = export_file_name(prefix, at);
    info!(file = %file_name, width = image.width(), height = image.height(), "scene exported");
    Ok(ExportedImage {
        file_name,
        width: image.width(),
        height: image.height(),
        png,
    })
}

fn draw_bitmap(
    canvas: &mut RgbaImage,
    object: &SceneObject,
    bitmap: &BitmapObject,
    factor: f64,
) -> Result<()> {
    let source = bitmap.bitmap.pixels.as_ref();
    let (mut working, offset) = match bitmap.clip {
        Some(clip) => {
            let x = clip.x.round().max(0.0) as u32;
            let y = clip.y.round().max(0.0) as u32;
            let w = (clip.width.round() as u32).clamp(1, source.width().saturating_sub(x).max(1));
            let h = (clip.height.round() as u32).clamp(1, source.height().saturating_sub(y).max(1));
            (
                imageops::crop_imm(source, x, y, w, h).to_image(),
                (f64::from(x), f64::from(y)),
            )
        }
        None => (source.clone(), (0.0, 0.0)),
    };
    apply_filter(&mut working, bitmap.filter);

    let target_w = (f64::from(working.width()) * object.scale_x * factor).round();
    let target_h = (f64::from(working.height()) * object.scale_y * factor).round();
    if target_w < 1.0 || target_h < 1.0 {
        debug!(id = %object.id, "bitmap scaled below one pixel; skipped");
        return Ok(());
    }
    let resized = resize_rgba(&working, target_w as u32, target_h as u32)
        .map_err(EditorError::Render)?;
    let dest_x = ((object.left + offset.0 * object.scale_x) * factor).round() as i64;
    let dest_y = ((object.top + offset.1 * object.scale_y) * factor).round() as i64;
    imageops::overlay(canvas, &resized, dest_x, dest_y);
    Ok(())
}

fn draw_run(
    canvas: &mut RgbaImage,
    object: &SceneObject,
    font: Option<&ab_glyph::FontArc>,
    content: &str,
    color: Rgba<u8>,
    font_size: u32,
    factor: f64,
) {
    let Some(font) = font else {
        debug!(id = %object.id, "no font available; text skipped");
        return;
    };
    let em_px = (f64::from(font_size) * object.scale_y * factor) as f32;
    let drawn = draw_text(
        canvas,
        font,
        content,
        color,
        (object.left * factor) as f32,
        (object.top * factor) as f32,
        em_px,
    );
    if drawn == 0 {
        debug!(id = %object.id, "font has no outlines for content; nothing drawn");
    }
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> anyhow::Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        anyhow::bail!("resize dimensions must be positive");
    }
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for bitmap resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("bitmap resize failed")?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| anyhow!("failed to construct resized RGBA image"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::color::HexColor;
    use crate::processing::filters::FilterKind;
    use crate::scene::{Bitmap, BitmapOrigin, ClipRect};
    use chrono::TimeZone;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Bitmap {
        Bitmap::new(RgbaImage::from_pixel(w, h, Rgba(px)), BitmapOrigin::Local)
    }

    fn bitmap_kind(bitmap: Bitmap) -> ObjectKind {
        ObjectKind::Bitmap(BitmapObject {
            bitmap,
            filter: FilterKind::None,
            clip: None,
        })
    }

    #[test]
    fn file_name_uses_prefix_and_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            export_file_name("Creative-AI-Pro", at),
            "Creative-AI-Pro-1700000000123.png"
        );
    }

    #[test]
    fn multiplier_scales_output_and_positions() {
        let mut scene = Scene::new(10, 10, HexColor([0, 0, 255]));
        scene.add(bitmap_kind(solid(4, 4, [255, 0, 0, 255])), 2.0, 3.0);
        let out = render_scene(&scene, &FontBook::empty(), 2).unwrap();
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(out.get_pixel(4, 6), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(11, 13), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(12, 14), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn clip_keeps_only_centre_region() {
        let mut scene = Scene::new(10, 10, HexColor([0, 0, 0]));
        let id = scene.add(bitmap_kind(solid(10, 10, [255, 255, 255, 255])), 0.0, 0.0);
        if let Some(b) = scene.get_mut(id).and_then(|o| o.as_bitmap_mut()) {
            b.clip = Some(ClipRect::centered(10.0, 10.0, 0.6));
        }
        let out = render_scene(&scene, &FontBook::empty(), 1).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(7, 7), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(8, 8), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn tainted_bitmap_blocks_export() {
        let mut scene = Scene::new(10, 10, HexColor([0, 0, 0]));
        let tainted = Bitmap::new(
            RgbaImage::from_pixel(2, 2, Rgba([1, 1, 1, 255])),
            BitmapOrigin::Remote {
                url: "https://elsewhere.example/a.png".into(),
                cors_approved: false,
            },
        );
        scene.add(bitmap_kind(tainted), 0.0, 0.0);
        let err = render_scene(&scene, &FontBook::empty(), 1).unwrap_err();
        assert!(matches!(err, EditorError::TaintedExport));
    }

    #[test]
    fn oversized_multiplier_is_refused() {
        let scene = Scene::new(1080, 1080, HexColor([0, 0, 0]));
        for multiplier in [4_000_000, 16] {
            let err = render_scene(&scene, &FontBook::empty(), multiplier).unwrap_err();
            assert!(
                matches!(err, EditorError::ExportTooLarge { multiplier: m } if m == multiplier),
                "multiplier {multiplier}: {err:?}"
            );
        }
        let small = Scene::new(8, 8, HexColor([0, 0, 0]));
        assert_eq!(
            export_size(&small, 2048),
            Some((MAX_EXPORT_SIDE, MAX_EXPORT_SIDE))
        );
        assert_eq!(export_size(&small, 2049), None);
        assert_eq!(export_size(&small, u32::MAX), None);
    }

    #[test]
    fn png_decodes_back_to_same_size() {
        let scene = Scene::new(6, 4, HexColor([9, 9, 9]));
        let at = Utc.timestamp_millis_opt(5).unwrap();
        let exported = export_scene(&scene, &FontBook::empty(), 3, "x", at).unwrap();
        let decoded = image::load_from_memory(&exported.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (18, 12));
        assert_eq!(exported.file_name, "x-5.png");
    }
}
