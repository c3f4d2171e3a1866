//! Explicitly owned scene model: background colour plus an ordered list of
//! placed objects. Index 0 is the bottom of the stack.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::processing::color::HexColor;
use crate::processing::filters::FilterKind;
use crate::processing::layout::{Placement, center_origin};

/// Line height used for text bounds, in ems.
const LINE_HEIGHT_EM: f64 = 1.16;
const NARROW_ADVANCE_EM: f64 = 0.6;
const WIDE_ADVANCE_EM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a bitmap's pixels came from, which decides whether they may be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitmapOrigin {
    /// Local file, generated bytes or data URL.
    Local,
    /// Fetched over HTTP; `cors_approved` is false when loaded without
    /// anonymous cross-origin mode.
    Remote { url: String, cors_approved: bool },
}

impl BitmapOrigin {
    pub fn is_tainted(&self) -> bool {
        matches!(
            self,
            BitmapOrigin::Remote {
                cors_approved: false,
                ..
            }
        )
    }
}

/// A fully decoded image ready to be placed.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub pixels: Arc<RgbaImage>,
    pub origin: BitmapOrigin,
}

impl Bitmap {
    pub fn new(pixels: RgbaImage, origin: BitmapOrigin) -> Self {
        Self {
            pixels: Arc::new(pixels),
            origin,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Rectangle in an object's intrinsic pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    /// A rectangle of `fraction` of the given size, centred on it.
    pub fn centered(width: f64, height: f64, fraction: f64) -> Self {
        let w = width * fraction;
        let h = height * fraction;
        let (x, y) = center_origin(w, h, width, height);
        Self {
            x,
            y,
            width: w,
            height: h,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BitmapObject {
    pub bitmap: Bitmap,
    pub filter: FilterKind,
    pub clip: Option<ClipRect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub content: String,
    pub font_family: String,
    pub font_size: u32,
    pub font_weight: u16,
    pub fill: HexColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampGlyph {
    pub glyph: String,
    pub font_size: u32,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Bitmap(BitmapObject),
    Text(TextRun),
    Stamp(StampGlyph),
}

impl ObjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Bitmap(_) => "image",
            ObjectKind::Text(_) => "text",
            ObjectKind::Stamp(_) => "stamp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub left: f64,
    pub top: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl SceneObject {
    /// Intrinsic (unscaled) size in logical pixels.
    pub fn intrinsic_size(&self) -> (f64, f64) {
        match &self.kind {
            ObjectKind::Bitmap(b) => {
                let (w, h) = b.bitmap.dimensions();
                (f64::from(w), f64::from(h))
            }
            ObjectKind::Text(t) => estimate_text_size(&t.content, t.font_size),
            ObjectKind::Stamp(s) => estimate_text_size(&s.glyph, s.font_size),
        }
    }

    /// Scaled bounding box `(left, top, width, height)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (w, h) = self.intrinsic_size();
        (self.left, self.top, w * self.scale_x, h * self.scale_y)
    }

    pub fn center(&self) -> (f64, f64) {
        let (l, t, w, h) = self.bounds();
        (l + w / 2.0, t + h / 2.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (l, t, w, h) = self.bounds();
        x >= l && x <= l + w && y >= t && y <= t + h
    }

    pub fn apply_placement(&mut self, placement: &Placement) {
        self.scale_x = placement.scale_x;
        self.scale_y = placement.scale_y;
        self.left = placement.left;
        self.top = placement.top;
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextRun> {
        match &mut self.kind {
            ObjectKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_bitmap_mut(&mut self) -> Option<&mut BitmapObject> {
        match &mut self.kind {
            ObjectKind::Bitmap(b) => Some(b),
            _ => None,
        }
    }
}

/// Rough layout box for a single line of text.
pub fn estimate_text_size(content: &str, font_size: u32) -> (f64, f64) {
    let em = f64::from(font_size);
    let width: f64 = content
        .chars()
        .map(|c| {
            if c.is_ascii() {
                NARROW_ADVANCE_EM
            } else {
                WIDE_ADVANCE_EM
            }
        })
        .sum::<f64>()
        * em;
    (width, em * LINE_HEIGHT_EM)
}

#[derive(Debug, Clone)]
pub struct Scene {
    width: u32,
    height: u32,
    background: HexColor,
    objects: Vec<SceneObject>,
    next_id: u64,
    revision: u64,
}

impl Scene {
    pub fn new(width: u32, height: u32, background: HexColor) -> Self {
        Self {
            width,
            height,
            background,
            objects: Vec::new(),
            next_id: 1,
            revision: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> HexColor {
        self.background
    }

    pub fn set_background(&mut self, color: HexColor) {
        self.background = color;
        self.request_render();
    }

    /// Monotonic counter bumped whenever the scene needs a redraw.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn request_render(&mut self) {
        self.revision += 1;
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Adds an object on top of the stack at the given position with unit scale.
    pub fn add(&mut self, kind: ObjectKind, left: f64, top: f64) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push(SceneObject {
            id,
            kind,
            left,
            top,
            scale_x: 1.0,
            scale_y: 1.0,
        });
        self.request_render();
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let idx = self.index_of(id)?;
        let removed = self.objects.remove(idx);
        self.request_render();
        Some(removed)
    }

    pub fn clear(&mut self) -> usize {
        let count = self.objects.len();
        self.objects.clear();
        self.request_render();
        count
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Moves the object one step up. Returns false when already on top or unknown.
    pub fn bring_forward(&mut self, id: ObjectId) -> bool {
        match self.index_of(id) {
            Some(idx) if idx + 1 < self.objects.len() => {
                self.objects.swap(idx, idx + 1);
                self.request_render();
                true
            }
            _ => false,
        }
    }

    /// Moves the object one step down. Returns false when already at the bottom or unknown.
    pub fn send_backward(&mut self, id: ObjectId) -> bool {
        match self.index_of(id) {
            Some(idx) if idx > 0 => {
                self.objects.swap(idx, idx - 1);
                self.request_render();
                true
            }
            _ => false,
        }
    }

    /// Top-most object under a logical-pixel point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<ObjectId> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.contains(x, y))
            .map(|o| o.id)
    }

    pub fn center_object(&mut self, id: ObjectId) -> bool {
        let (cw, ch) = (f64::from(self.width), f64::from(self.height));
        let Some(obj) = self.get_mut(id) else {
            return false;
        };
        let (_, _, w, h) = obj.bounds();
        let (left, top) = center_origin(w, h, cw, ch);
        obj.left = left;
        obj.top = top;
        self.request_render();
        true
    }
}
