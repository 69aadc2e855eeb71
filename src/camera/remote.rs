//! Browser camera peer
//!
//! A page connected to `/ws/camera` acts as the camera device. Opening the
//! device asks the peer to start streaming with the given constraints; the
//! peer answers with binary JPEG or PNG frames which replace the latest-frame
//! slot. Stopping tells the peer to release its tracks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::RgbImage;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::{CameraDevice, StreamConstraints, VideoStream};
use crate::{Error, Result};

/// Command sent to the connected peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerCommand {
    /// Start streaming frames
    Start {
        #[serde(flatten)]
        constraints: StreamConstraints,
    },
    /// Stop tracks and stop sending frames
    Stop,
}

/// Handle held by the WebSocket task serving one peer
pub struct PeerConnection {
    pub id: u64,
    pub commands: mpsc::UnboundedReceiver<PeerCommand>,
}

struct Peer {
    id: u64,
    tx: mpsc::UnboundedSender<PeerCommand>,
}

struct Inner {
    peer: Mutex<Option<Peer>>,
    next_peer_id: AtomicU64,
    streaming: AtomicBool,
    constraints: Mutex<StreamConstraints>,
    frame: watch::Sender<Option<RgbImage>>,
}

impl Inner {
    fn send(&self, command: PeerCommand) -> bool {
        self.peer
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|peer| peer.tx.send(command).is_ok()))
            .unwrap_or(false)
    }

    fn stop(&self) {
        if self.streaming.swap(false, Ordering::SeqCst) {
            self.send(PeerCommand::Stop);
        }
        self.frame.send_replace(None);
    }
}

/// Camera device backed by a remote browser peer
#[derive(Clone)]
pub struct RemoteCamera {
    inner: Arc<Inner>,
}

impl Default for RemoteCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteCamera {
    #[must_use]
    pub fn new() -> Self {
        let (frame, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                peer: Mutex::new(None),
                next_peer_id: AtomicU64::new(1),
                streaming: AtomicBool::new(false),
                constraints: Mutex::new(StreamConstraints::default()),
                frame,
            }),
        }
    }

    /// Register a newly connected peer, replacing any previous one
    ///
    /// If a stream is already open the new peer is asked to start right away.
    pub fn connect_peer(&self) -> PeerConnection {
        let id = self.inner.next_peer_id.fetch_add(1, Ordering::SeqCst);
        let (tx, commands) = mpsc::unbounded_channel();

        if self.inner.streaming.load(Ordering::SeqCst) {
            let constraints = self
                .inner
                .constraints
                .lock()
                .map(|c| *c)
                .unwrap_or_default();
            let _ = tx.send(PeerCommand::Start { constraints });
        }

        if let Ok(mut guard) = self.inner.peer.lock() {
            if guard.replace(Peer { id, tx }).is_some() {
                tracing::info!(peer_id = id, "camera peer replaced");
            } else {
                tracing::info!(peer_id = id, "camera peer connected");
            }
        }

        PeerConnection { id, commands }
    }

    /// Forget a peer; ignored when a newer peer has taken its place
    pub fn disconnect_peer(&self, id: u64) {
        let removed = self
            .inner
            .peer
            .lock()
            .map(|mut guard| {
                if guard.as_ref().is_some_and(|peer| peer.id == id) {
                    guard.take();
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);

        if removed {
            self.inner.frame.send_replace(None);
            tracing::info!(peer_id = id, "camera peer disconnected");
        }
    }

    /// Whether a peer is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner
            .peer
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Whether a stream is currently open
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::SeqCst)
    }

    /// Decode a frame from the peer into the latest-frame slot
    ///
    /// Frames arriving while no stream is open are dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a decodable image
    pub fn push_frame(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_streaming() {
            return Ok(());
        }

        let frame = image::load_from_memory(bytes)?.to_rgb8();
        tracing::trace!(width = frame.width(), height = frame.height(), "camera frame");
        self.inner.frame.send_replace(Some(frame));
        Ok(())
    }
}

#[async_trait]
impl CameraDevice for RemoteCamera {
    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>> {
        if let Ok(mut guard) = self.inner.constraints.lock() {
            *guard = *constraints;
        }

        self.inner.streaming.store(true, Ordering::SeqCst);
        if !self.inner.send(PeerCommand::Start {
            constraints: *constraints,
        }) {
            self.inner.streaming.store(false, Ordering::SeqCst);
            return Err(Error::Camera(
                "No camera connected. Open the camera page on a device with a camera.".to_string(),
            ));
        }

        Ok(Box::new(RemoteStream {
            inner: Arc::clone(&self.inner),
            frame: self.inner.frame.subscribe(),
        }))
    }

    fn is_ready(&self) -> bool {
        self.is_connected()
    }
}

struct RemoteStream {
    inner: Arc<Inner>,
    frame: watch::Receiver<Option<RgbImage>>,
}

impl VideoStream for RemoteStream {
    fn dimensions(&self) -> (u32, u32) {
        self.frame
            .borrow()
            .as_ref()
            .map_or((0, 0), RgbImage::dimensions)
    }

    fn current_frame(&self) -> Option<RgbImage> {
        self.frame.borrow().clone()
    }

    fn stop(&self) {
        self.inner.stop();
    }
}
