//! Single-frame capture from a live stream

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;

use super::VideoStream;

/// JPEG quality used for snapshots
pub const JPEG_QUALITY: u8 = 80;

/// Why a frame could not be captured
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// Stream has no dimensions yet (not attached or not playing)
    #[error("camera not ready")]
    NotReady,

    /// No frame available to draw
    #[error("no frame available")]
    NoSurface,

    /// JPEG encoding failed
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

/// An encoded still frame
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Raw JPEG bytes
    pub jpeg: Vec<u8>,
    /// Base64 of the JPEG bytes, no prefix
    pub base64: String,
    /// `data:image/jpeg;base64,...` form for thumbnails
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// Capture the stream's current frame as a JPEG snapshot
///
/// # Errors
///
/// Returns `NotReady` when the stream reports zero dimensions, `NoSurface`
/// when there is no frame to draw and `Encode` when JPEG encoding fails
pub fn capture(stream: &dyn VideoStream) -> Result<Snapshot, CaptureError> {
    let (width, height) = stream.dimensions();
    if width == 0 || height == 0 {
        return Err(CaptureError::NotReady);
    }

    let frame = stream.current_frame().ok_or(CaptureError::NoSurface)?;
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CaptureError::NoSurface);
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&frame)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    let base64 = base64::engine::general_purpose::STANDARD.encode(&jpeg);
    let data_url = format!("data:image/jpeg;base64,{base64}");

    tracing::debug!(
        width = frame.width(),
        height = frame.height(),
        bytes = jpeg.len(),
        "captured frame"
    );

    Ok(Snapshot {
        width: frame.width(),
        height: frame.height(),
        jpeg,
        base64,
        data_url,
    })
}
