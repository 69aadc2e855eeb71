//! Camera source
//!
//! Owns the live video stream shown behind the step pill. The device itself
//! sits behind [`CameraDevice`]: a browser peer streaming frames over a
//! WebSocket ([`RemoteCamera`]) or a still image on disk ([`StillCamera`]).

mod frames;
mod remote;
mod still;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

pub use frames::{CaptureError, JPEG_QUALITY, Snapshot, capture};
pub use remote::{PeerCommand, PeerConnection, RemoteCamera};
pub use still::StillCamera;

use crate::Result;

/// Message shown when a device rejects without a usable reason
pub const GENERIC_DEVICE_ERROR: &str = "Camera permission/device error.";

/// Which camera to prefer on devices with several
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user
    User,
    /// Rear camera, facing the work surface
    #[default]
    Environment,
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Environment => write!(f, "environment"),
        }
    }
}

impl FromStr for FacingMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "front" => Ok(Self::User),
            "environment" | "rear" | "back" => Ok(Self::Environment),
            other => Err(crate::Error::Config(format!("unknown facing mode: {other}"))),
        }
    }
}

/// Constraints passed to the device when opening a stream
///
/// The facing mode is a preference; devices may satisfy it loosely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    pub facing_mode: FacingMode,
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            audio: false,
        }
    }
}

impl StreamConstraints {
    #[must_use]
    pub const fn with_facing_mode(facing_mode: FacingMode) -> Self {
        Self {
            facing_mode,
            audio: false,
        }
    }
}

/// A live video stream attached to the output surface
pub trait VideoStream: Send + Sync {
    /// Intrinsic frame size; `(0, 0)` until the first frame arrives
    fn dimensions(&self) -> (u32, u32);

    /// The frame currently displayed, if any
    fn current_frame(&self) -> Option<RgbImage>;

    /// Stop all tracks
    fn stop(&self);
}

/// Camera device API
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Open a stream honoring `constraints`
    ///
    /// # Errors
    ///
    /// Returns `Error::Camera` when permission is denied or no device exists
    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>>;

    /// Whether `open` can be expected to succeed right now
    fn is_ready(&self) -> bool {
        true
    }
}

/// Camera lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum CameraStatus {
    Idle,
    On,
    Error(String),
}

impl CameraStatus {
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Error text to show under the controls
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// The camera feed for one cook session
///
/// Holds at most one attached stream. Dropping the source stops it.
pub struct CameraSource {
    device: Arc<dyn CameraDevice>,
    constraints: StreamConstraints,
    status: CameraStatus,
    stream: Option<Box<dyn VideoStream>>,
}

impl CameraSource {
    #[must_use]
    pub fn new(device: Arc<dyn CameraDevice>, constraints: StreamConstraints) -> Self {
        Self {
            device,
            constraints,
            status: CameraStatus::Idle,
            stream: None,
        }
    }

    /// Request a stream from the device and attach it
    ///
    /// Failures land in [`CameraStatus::Error`]; call again to retry.
    pub async fn acquire(&mut self) -> &CameraStatus {
        if self.status.is_on() {
            return &self.status;
        }

        match self.device.open(&self.constraints).await {
            Ok(stream) => {
                let (width, height) = stream.dimensions();
                tracing::info!(
                    facing_mode = %self.constraints.facing_mode,
                    width,
                    height,
                    "camera started"
                );
                self.stream = Some(stream);
                self.status = CameraStatus::On;
            }
            Err(e) => {
                let message = match e {
                    crate::Error::Camera(message) if !message.is_empty() => message,
                    crate::Error::Camera(_) => GENERIC_DEVICE_ERROR.to_string(),
                    other => other.to_string(),
                };
                tracing::warn!(error = %message, "camera unavailable");
                self.status = CameraStatus::Error(message);
            }
        }

        &self.status
    }

    /// Stop all tracks and detach the stream
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            tracing::info!("camera stopped");
        }
        self.status = CameraStatus::Idle;
    }

    #[must_use]
    pub const fn status(&self) -> &CameraStatus {
        &self.status
    }

    #[must_use]
    pub const fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    /// The attached stream while the camera is on
    #[must_use]
    pub fn stream(&self) -> Option<&dyn VideoStream> {
        self.stream.as_deref()
    }

    /// Capture the current frame
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::NotReady` when no stream is attached, otherwise
    /// whatever the frame capture reports
    pub fn snapshot(&self) -> std::result::Result<Snapshot, CaptureError> {
        let stream = self.stream().ok_or(CaptureError::NotReady)?;
        capture(stream)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
