use image::{Rgba, RgbaImage};
use serde::Deserialize;

/// Pixel filters selectable for a bitmap. Only one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    #[default]
    None,
    Grayscale,
    Sepia,
    Invert,
    Vintage,
    Kodachrome,
    Polaroid,
    Brownie,
}

// Row-major 4x5 colour matrices: rows produce r, g, b, a from (r, g, b, a, 1).
type ColorMatrix = [f32; 20];

const SEPIA: ColorMatrix = [
    0.393, 0.769, 0.189, 0.0, 0.0, //
    0.349, 0.686, 0.168, 0.0, 0.0, //
    0.272, 0.534, 0.131, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

const VINTAGE: ColorMatrix = [
    0.62793, 0.32021, -0.03965, 0.0, 0.03784, //
    0.02578, 0.64411, 0.03259, 0.0, 0.02926, //
    0.04660, -0.08512, 0.52416, 0.0, 0.02023, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

const KODACHROME: ColorMatrix = [
    1.12855, -0.39673, -0.03992, 0.0, 0.24991, //
    -0.16404, 1.08352, -0.05498, 0.0, 0.09698, //
    -0.16786, -0.56034, 1.60148, 0.0, 0.13972, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

const POLAROID: ColorMatrix = [
    1.438, -0.062, -0.062, 0.0, 0.0, //
    -0.122, 1.378, -0.122, 0.0, 0.0, //
    -0.016, -0.016, 1.483, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

const BROWNIE: ColorMatrix = [
    0.59970, 0.34553, -0.27082, 0.0, 0.186, //
    -0.03770, 0.86095, 0.15059, 0.0, -0.1449, //
    0.24113, -0.07441, 0.44972, 0.0, -0.02965, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

pub fn apply_filter(image: &mut RgbaImage, filter: FilterKind) {
    if image.width() == 0 || image.height() == 0 {
        return;
    }
    match filter {
        FilterKind::None => {}
        FilterKind::Grayscale => map_pixels(image, grayscale),
        FilterKind::Invert => map_pixels(image, invert),
        FilterKind::Sepia => apply_matrix(image, &SEPIA),
        FilterKind::Vintage => apply_matrix(image, &VINTAGE),
        FilterKind::Kodachrome => apply_matrix(image, &KODACHROME),
        FilterKind::Polaroid => apply_matrix(image, &POLAROID),
        FilterKind::Brownie => apply_matrix(image, &BROWNIE),
    }
}

fn map_pixels(image: &mut RgbaImage, f: impl Fn([f32; 3]) -> [f32; 3]) {
    for pixel in image.pixels_mut() {
        let (rgb, alpha) = pixel_to_rgb_alpha(pixel);
        *pixel = rgb_alpha_to_pixel(f(rgb), alpha);
    }
}

fn grayscale(rgb: [f32; 3]) -> [f32; 3] {
    let avg = (rgb[0] + rgb[1] + rgb[2]) / 3.0;
    [avg; 3]
}

fn invert(rgb: [f32; 3]) -> [f32; 3] {
    rgb.map(|c| 1.0 - c)
}

fn apply_matrix(image: &mut RgbaImage, m: &ColorMatrix) {
    for pixel in image.pixels_mut() {
        let (rgb, alpha) = pixel_to_rgb_alpha(pixel);
        let src = [rgb[0], rgb[1], rgb[2], alpha];
        let row = |r: usize| {
            let base = r * 5;
            m[base] * src[0]
                + m[base + 1] * src[1]
                + m[base + 2] * src[2]
                + m[base + 3] * src[3]
                + m[base + 4]
        };
        *pixel = rgb_alpha_to_pixel([row(0), row(1), row(2)], row(3));
    }
}

fn pixel_to_rgb_alpha(pixel: &Rgba<u8>) -> ([f32; 3], f32) {
    let r = (pixel[0] as f32) / 255.0;
    let g = (pixel[1] as f32) / 255.0;
    let b = (pixel[2] as f32) / 255.0;
    let a = (pixel[3] as f32) / 255.0;
    ([r, g, b], a)
}

fn rgb_alpha_to_pixel(rgb: [f32; 3], alpha: f32) -> Rgba<u8> {
    let mut out = [0u8; 4];
    for (i, channel) in rgb.iter().enumerate() {
        out[i] = (channel.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    }
    out[3] = (alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    Rgba(out)
}
