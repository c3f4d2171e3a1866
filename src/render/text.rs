use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont, point};
use fontdb::{Database, Family, Query, Weight};
use image::{Rgba, RgbaImage};
use tracing::debug;

const FALLBACK_FAMILIES: [&str; 4] = ["Inter", "Noto Sans", "DejaVu Sans", "Noto Color Emoji"];

/// Resolves font families to loaded faces, caching each lookup.
pub struct FontBook {
    db: Option<Database>,
    cache: Mutex<HashMap<(String, u16), Option<FontArc>>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.db.as_ref().map(|db| db.len()).unwrap_or(0))
            .finish()
    }
}

impl FontBook {
    /// No faces at all; text objects are skipped at export.
    pub fn empty() -> Self {
        Self {
            db: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn system() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "loaded system fonts");
        Self {
            db: Some(db),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, family: &str, weight: u16) -> Option<FontArc> {
        let db = self.db.as_ref()?;
        let key = (family.to_string(), weight);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(&key) {
            return hit.clone();
        }

        let mut families = vec![Family::Name(family)];
        families.extend(FALLBACK_FAMILIES.iter().map(|f| Family::Name(*f)));
        families.push(Family::SansSerif);
        let font = families.into_iter().find_map(|fam| {
            let id = db.query(&Query {
                families: &[fam],
                weight: Weight(weight),
                ..Default::default()
            })?;
            db.with_face_data(id, |data, index| {
                FontVec::try_from_vec_and_index(data.to_vec(), index).ok()
            })
            .flatten()
            .map(FontArc::new)
        });
        if font.is_none() {
            debug!(family, weight, "no usable font face");
        }
        cache.insert(key, font.clone());
        font
    }
}

/// Draws a single line of text with its em box starting at `(left, top)`.
/// Returns the number of glyphs that produced an outline.
pub fn draw_text(
    canvas: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    color: Rgba<u8>,
    left: f32,
    top: f32,
    em_px: f32,
) -> usize {
    let em_to_height = font
        .units_per_em()
        .map(|upem| font.height_unscaled() / upem)
        .unwrap_or(1.0);
    let scaled = font.as_scaled(PxScale::from(em_px * em_to_height));
    let baseline = top + scaled.ascent();
    let mut cursor_x = left;
    let mut previous = None;
    let mut drawn = 0;
    for ch in text.chars() {
        let glyph = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            cursor_x += scaled.kern(prev, glyph);
        }
        let advance = scaled.h_advance(glyph);
        let mut positioned = scaled.scaled_glyph(ch);
        positioned.position = point(cursor_x, baseline);
        if let Some(outline) = font.outline_glyph(positioned) {
            let bounds = outline.px_bounds();
            outline.draw(|x, y, coverage| {
                blend_pixel(
                    canvas,
                    bounds.min.x as i64 + x as i64,
                    bounds.min.y as i64 + y as i64,
                    color,
                    coverage,
                );
            });
            drawn += 1;
        }
        cursor_x += advance;
        previous = Some(glyph);
    }
    drawn
}

fn blend_pixel(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
        return;
    }
    let a = (coverage.clamp(0.0, 1.0) * f32::from(color[3]) / 255.0).clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = a + dst_a * (1.0 - a);
    for c in 0..3 {
        let src = f32::from(color[c]) * a;
        let under = f32::from(dst[c]) * dst_a * (1.0 - a);
        let value = if out_a > 0.0 { (src + under) / out_a } else { 0.0 };
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
