use serde::Deserialize;

use crate::error::{EditorError, Result};

/// How a bitmap is sized against the canvas when it is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Fully contained, no cropping.
    #[default]
    Fit,
    /// Fully covers the canvas, overflow is cropped by the canvas edge.
    Cover,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlacementPolicy {
    pub mode: FitMode,
    /// Extra factor applied in fit mode to leave a margin (1.0 = edge to edge).
    pub shrink: f64,
}

impl PlacementPolicy {
    pub const fn fit(shrink: f64) -> Self {
        Self {
            mode: FitMode::Fit,
            shrink,
        }
    }

    pub const fn cover() -> Self {
        Self {
            mode: FitMode::Cover,
            shrink: 1.0,
        }
    }
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self::fit(1.0)
    }
}

/// Uniform scale and top-left position for an object, in logical canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale_x: f64,
    pub scale_y: f64,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Display scale that fits the logical canvas into its container.
///
/// Object coordinates stay in logical pixels; only the display wrapper is scaled.
pub fn compute_scale(
    container_w: f64,
    container_h: f64,
    canvas_w: f64,
    canvas_h: f64,
    padding: f64,
) -> f64 {
    let cw = canvas_w.max(1.0);
    let ch = canvas_h.max(1.0);
    let scale = ((container_w - padding) / cw).min((container_h - padding) / ch);
    if scale.is_finite() { scale.max(0.0) } else { 0.0 }
}

pub fn compute_placement(
    obj_w: u32,
    obj_h: u32,
    canvas_w: u32,
    canvas_h: u32,
    policy: PlacementPolicy,
) -> Result<Placement> {
    if obj_w == 0 || obj_h == 0 {
        return Err(EditorError::InvalidAsset(format!(
            "object has zero dimension ({obj_w}x{obj_h})"
        )));
    }
    let ow = f64::from(obj_w);
    let oh = f64::from(obj_h);
    let cw = f64::from(canvas_w);
    let ch = f64::from(canvas_h);
    let scale = match policy.mode {
        FitMode::Fit => (cw / ow).min(ch / oh) * policy.shrink,
        FitMode::Cover => (cw / ow).max(ch / oh),
    };
    let width = ow * scale;
    let height = oh * scale;
    let (left, top) = center_origin(width, height, cw, ch);
    Ok(Placement {
        scale_x: scale,
        scale_y: scale,
        left,
        top,
        width,
        height,
    })
}

/// Top-left corner that aligns an inner box's centre with the outer box's centre.
/// Negative when the inner box overflows.
pub fn center_origin(inner_w: f64, inner_h: f64, outer_w: f64, outer_h: f64) -> (f64, f64) {
    ((outer_w - inner_w) / 2.0, (outer_h - inner_h) / 2.0)
}

/// Container-driven display state, recomputed on every resize signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub container_w: f64,
    pub container_h: f64,
    pub padding: f64,
    canvas_w: f64,
    canvas_h: f64,
    scale: f64,
}

impl Viewport {
    pub fn new(canvas_w: u32, canvas_h: u32, padding: f64) -> Self {
        Self {
            container_w: 0.0,
            container_h: 0.0,
            padding,
            canvas_w: f64::from(canvas_w),
            canvas_h: f64::from(canvas_h),
            scale: 0.0,
        }
    }

    // TODO: coalesce bursts of resize signals once a frame clock is available.
    pub fn resize(&mut self, container_w: f64, container_h: f64) -> f64 {
        self.container_w = container_w;
        self.container_h = container_h;
        self.scale = compute_scale(
            container_w,
            container_h,
            self.canvas_w,
            self.canvas_h,
            self.padding,
        );
        self.scale
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Size of the canvas as it appears inside the container.
    pub fn displayed_size(&self) -> (f64, f64) {
        (self.canvas_w * self.scale, self.canvas_h * self.scale)
    }

    /// Maps a container-space point back to logical canvas pixels.
    pub fn to_logical(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if self.scale <= 0.0 {
            return None;
        }
        let (dw, dh) = self.displayed_size();
        let (ox, oy) = center_origin(dw, dh, self.container_w, self.container_h);
        Some(((x - ox) / self.scale, (y - oy) / self.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_hits_one_bound_exactly() {
        for (w, h) in [(500.0, 2000.0), (3000.0, 700.0), (1000.0, 1000.0)] {
            let s = compute_scale(w, h, 1080.0, 1080.0, 40.0);
            let fx = 1080.0 * s <= w - 40.0 + 1e-9;
            let fy = 1080.0 * s <= h - 40.0 + 1e-9;
            assert!(fx && fy);
            let tight = ((1080.0 * s) - (w - 40.0)).abs() < 1e-9
                || ((1080.0 * s) - (h - 40.0)).abs() < 1e-9;
            assert!(tight, "no axis at its bound for {w}x{h}");
        }
    }

    #[test]
    fn tiny_container_clamps_to_zero() {
        assert_eq!(compute_scale(20.0, 20.0, 1080.0, 1080.0, 64.0), 0.0);
    }

    #[test]
    fn zero_dimension_is_invalid() {
        let err = compute_placement(0, 10, 1080, 1080, PlacementPolicy::default()).unwrap_err();
        assert!(matches!(err, EditorError::InvalidAsset(_)));
        assert!(compute_placement(10, 0, 1080, 1080, PlacementPolicy::cover()).is_err());
    }

    #[test]
    fn viewport_maps_container_points_back() {
        let mut vp = Viewport::new(1000, 1000, 0.0);
        vp.resize(600.0, 500.0);
        assert!((vp.scale() - 0.5).abs() < 1e-12);
        let (x, y) = vp.to_logical(300.0, 250.0).unwrap();
        assert!((x - 500.0).abs() < 1e-9 && (y - 500.0).abs() < 1e-9);
    }
}
