//! Error types for the cooking coach

use thiserror::Error;

/// Result type alias for coach operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cooking coach
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, bad setting)
    #[error("configuration error: {0}")]
    Config(String),

    /// Camera device or permission error
    #[error("camera error: {0}")]
    Camera(String),

    /// Frame capture error
    #[error("capture error: {0}")]
    Capture(#[from] crate::camera::CaptureError),

    /// Vision API error
    #[error("vision error: {0}")]
    Vision(String),

    /// Voice agent session error
    #[error("voice error: {0}")]
    Voice(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Recipe catalog error
    #[error("recipe error: {0}")]
    Recipe(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Image decoding or encoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
