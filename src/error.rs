use thiserror::Error;

use crate::tasks::loader::LoadError;

/// Input a command needs before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Prompt,
    ApiKey,
}

impl std::fmt::Display for MissingField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingField::Prompt => f.write_str("prompt"),
            MissingField::ApiKey => f.write_str("api key"),
        }
    }
}

/// Library error type for editor operations.
///
/// Every variant is recoverable: the editor stays usable after any of them.
#[derive(Debug, Error)]
pub enum EditorError {
    /// A required input (prompt, API key) was empty.
    #[error("missing {0}")]
    MissingInput(MissingField),

    /// The request never produced an HTTP response.
    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),

    /// The request did not finish within the configured bound.
    #[error("request timed out")]
    Timeout,

    /// The provider answered with a non-2xx status or an empty payload.
    #[error("provider rejected the request (status {status}): {body}")]
    ProviderRejection { status: u16, body: String },

    /// A configured provider endpoint could not be turned into a URL.
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    /// Zero-sized or undecodable image content.
    #[error("invalid image asset: {0}")]
    InvalidAsset(String),

    /// A bitmap loaded without cross-origin approval blocks pixel export.
    #[error("canvas contains a tainted cross-origin bitmap; export blocked")]
    TaintedExport,

    /// The requested export would exceed the output size limit.
    #[error("export at {multiplier}x exceeds the output size limit")]
    ExportTooLarge { multiplier: u32 },

    /// The image loader failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("render error: {0}")]
    Render(anyhow::Error),
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
