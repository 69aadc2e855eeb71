//! Still image camera for headless hosts and demos

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use image::RgbImage;

use super::{CameraDevice, StreamConstraints, VideoStream};
use crate::{Error, Result};

/// Serves one image file as a frozen camera feed
#[derive(Debug, Clone)]
pub struct StillCamera {
    path: PathBuf,
}

impl StillCamera {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Decode the image as a single RGB frame
    ///
    /// # Errors
    ///
    /// Returns `Error::Camera` if the file cannot be read or decoded
    pub async fn load_frame(&self) -> Result<RgbImage> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Camera(format!("cannot open {}: {e}", self.path.display())))?;

        let frame = image::load_from_memory(&bytes)
            .map_err(|e| Error::Camera(format!("cannot decode {}: {e}", self.path.display())))?
            .to_rgb8();

        Ok(frame)
    }
}

#[async_trait]
impl CameraDevice for StillCamera {
    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>> {
        let frame = self.load_frame().await?;
        tracing::debug!(
            path = %self.path.display(),
            facing_mode = %constraints.facing_mode,
            "still camera opened"
        );
        Ok(Box::new(StillStream {
            frame,
            stopped: AtomicBool::new(false),
        }))
    }
}

struct StillStream {
    frame: RgbImage,
    stopped: AtomicBool,
}

impl VideoStream for StillStream {
    fn dimensions(&self) -> (u32, u32) {
        if self.stopped.load(Ordering::SeqCst) {
            (0, 0)
        } else {
            self.frame.dimensions()
        }
    }

    fn current_frame(&self) -> Option<RgbImage> {
        (!self.stopped.load(Ordering::SeqCst)).then(|| self.frame.clone())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
