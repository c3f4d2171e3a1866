use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use image::RgbaImage;
use reqwest::Url;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
use thiserror::Error;
use tracing::debug;

use crate::config::{CrossOrigin, LoaderSettings};
use crate::scene::{Bitmap, BitmapOrigin};

/// Where an image's bytes come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    File(PathBuf),
    Url(Url),
    Bytes(Vec<u8>),
    DataUrl(String),
}

impl ImageSource {
    pub fn describe(&self) -> String {
        match self {
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Url(url) => url.to_string(),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            ImageSource::DataUrl(_) => "<data url>".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetch failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("server responded with status {status}")]
    Status { status: u16 },

    #[error("cross-origin load of {url} was not allowed by the server")]
    CorsRejected { url: String },

    #[error("malformed data url")]
    MalformedDataUrl,

    #[error("undecodable or empty image: {0}")]
    InvalidAsset(String),

    #[error("image load did not finish within {0:?}")]
    Timeout(Duration),
}

/// Fetches and fully decodes images before anything is placed.
///
/// One attempt per call, bounded by `loader.timeout`. Anonymous cross-origin
/// mode mirrors the browser's CORS check so remote bitmaps stay exportable.
#[derive(Debug, Clone)]
pub struct Loader {
    client: reqwest::Client,
    settings: LoaderSettings,
}

impl Loader {
    pub fn new(settings: LoaderSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, settings })
    }

    pub async fn load(&self, source: ImageSource) -> Result<Bitmap, LoadError> {
        let limit = self.settings.timeout;
        debug!(source = %source.describe(), "loading image");
        tokio::time::timeout(limit, self.load_unbounded(source))
            .await
            .map_err(|_| LoadError::Timeout(limit))?
    }

    async fn load_unbounded(&self, source: ImageSource) -> Result<Bitmap, LoadError> {
        let (bytes, origin) = match source {
            ImageSource::File(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|source| LoadError::Io { path, source })?;
                (bytes, BitmapOrigin::Local)
            }
            ImageSource::Bytes(bytes) => (bytes, BitmapOrigin::Local),
            ImageSource::DataUrl(url) => (decode_data_url(&url)?, BitmapOrigin::Local),
            ImageSource::Url(url) => self.fetch_remote(url).await?,
        };
        let pixels = tokio::task::spawn_blocking(move || decode_rgba8_apply_exif(&bytes))
            .await
            .map_err(|err| LoadError::InvalidAsset(format!("decoder task failed: {err}")))??;
        Ok(Bitmap::new(pixels, origin))
    }

    async fn fetch_remote(&self, url: Url) -> Result<(Vec<u8>, BitmapOrigin), LoadError> {
        let anonymous = self.settings.cross_origin == CrossOrigin::Anonymous;
        let same_origin = url.origin().ascii_serialization() == self.settings.origin;
        let mut request = self.client.get(url.clone());
        if anonymous {
            request = request.header(ORIGIN, &self.settings.origin);
        }
        let response = request.send().await.map_err(LoadError::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                status: status.as_u16(),
            });
        }

        let cors_approved = if same_origin {
            true
        } else if anonymous {
            let allowed = response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == "*" || v == self.settings.origin)
                .unwrap_or(false);
            if !allowed {
                return Err(LoadError::CorsRejected {
                    url: url.to_string(),
                });
            }
            true
        } else {
            false
        };

        let bytes = response.bytes().await.map_err(LoadError::Network)?;
        debug!(%url, len = bytes.len(), cors_approved, "fetched remote image");
        Ok((
            bytes.to_vec(),
            BitmapOrigin::Remote {
                url: url.to_string(),
                cors_approved,
            },
        ))
    }
}

/// Accepts `data:<mime>;base64,<payload>`.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, LoadError> {
    let rest = url.strip_prefix("data:").ok_or(LoadError::MalformedDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(LoadError::MalformedDataUrl)?;
    if !meta.ends_with(";base64") {
        return Err(LoadError::MalformedDataUrl);
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| LoadError::MalformedDataUrl)
}

// Decodes an image to RGBA8 and applies EXIF orientation if available.
fn decode_rgba8_apply_exif(bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| LoadError::InvalidAsset(err.to_string()))?
        .decode()
        .map_err(|err| LoadError::InvalidAsset(err.to_string()))?;
    let mut img = img.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(LoadError::InvalidAsset(format!(
            "zero-sized image ({}x{})",
            img.width(),
            img.height()
        )));
    }

    let orientation: u16 = read_orientation(bytes).unwrap_or(1);
    match orientation {
        1 => {}
        2 => {
            img = image::imageops::flip_horizontal(&img);
        }
        3 => {
            img = image::imageops::rotate180(&img);
        }
        4 => {
            img = image::imageops::flip_vertical(&img);
        }
        5 => {
            img = image::imageops::rotate90(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        6 => {
            img = image::imageops::rotate90(&img);
        }
        7 => {
            img = image::imageops::rotate270(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        8 => {
            img = image::imageops::rotate270(&img);
        }
        _ => {}
    }

    Ok(img)
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!("exif orientation {}", o);
    Some(o)
}

#[cfg(test)]
mod tests {
    use super::*;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, image::Rgba([1, 2, 3, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn loader() -> Loader {
        Loader::new(LoaderSettings::default()).unwrap()
    }

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let img = decode_rgba8_apply_exif(&bytes).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn data_url_requires_base64_payload() {
        assert_eq!(decode_data_url("data:image/png;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            decode_data_url("data:text/plain,hello"),
            Err(LoadError::MalformedDataUrl)
        ));
        assert!(matches!(
            decode_data_url("image/png;base64,AQID"),
            Err(LoadError::MalformedDataUrl)
        ));
    }

    #[tokio::test]
    async fn local_sources_are_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, png_bytes(4, 3)).unwrap();

        let bitmap = loader().load(ImageSource::File(path)).await.unwrap();
        assert_eq!(bitmap.dimensions(), (4, 3));
        assert_eq!(bitmap.origin, BitmapOrigin::Local);

        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(2, 2));
        let bitmap = loader()
            .load(ImageSource::DataUrl(format!("data:image/png;base64,{encoded}")))
            .await
            .unwrap();
        assert_eq!(bitmap.dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn garbage_bytes_are_invalid_assets() {
        let err = loader()
            .load(ImageSource::Bytes(b"definitely not an image".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidAsset(_)));
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = loader()
            .load(ImageSource::File(PathBuf::from("/nonexistent/x.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
