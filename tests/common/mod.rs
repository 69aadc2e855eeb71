//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cook_coach::camera::{CameraDevice, CameraSource, StreamConstraints, VideoStream};
use cook_coach::recipes::{Recipe, RecipeCatalog, Step};
use cook_coach::vision::{Assessment, VisionAssessor};
use cook_coach::voice::{AgentChannel, AgentEvent, ClientMessage, SessionConfig, VoiceConnector};
use cook_coach::{CookSession, Error, Result};
use image::{Rgb, RgbImage};
use tokio::sync::{Mutex, Notify, mpsc};

/// Three-step recipe used across tests
#[must_use]
pub fn test_recipe() -> Arc<Recipe> {
    Arc::new(Recipe {
        id: "test-salad".to_string(),
        title: "Test Salad".to_string(),
        description: "Crunchy and quick".to_string(),
        image: "/images/salad.jpg".to_string(),
        steps: vec![
            Step {
                id: 1,
                text: "Wash the cucumber under cold water and pat it dry.".to_string(),
                prompt: None,
            },
            Step {
                id: 2,
                text: "Slice the cucumber into thin rounds about 3 mm thick.".to_string(),
                prompt: Some("Slice thin rounds".to_string()),
            },
            Step {
                id: 3,
                text: "Toss with salt and vinegar.".to_string(),
                prompt: None,
            },
        ],
    })
}

#[must_use]
pub fn test_catalog() -> RecipeCatalog {
    RecipeCatalog::new(vec![(*test_recipe()).clone()]).expect("valid test catalog")
}

/// Stream that always shows a solid frame
pub struct SolidStream;

impl VideoStream for SolidStream {
    fn dimensions(&self) -> (u32, u32) {
        (16, 12)
    }

    fn current_frame(&self) -> Option<RgbImage> {
        Some(RgbImage::from_pixel(16, 12, Rgb([90, 160, 60])))
    }

    fn stop(&self) {}
}

/// Stream attached but not yet playing
pub struct BlankStream;

impl VideoStream for BlankStream {
    fn dimensions(&self) -> (u32, u32) {
        (0, 0)
    }

    fn current_frame(&self) -> Option<RgbImage> {
        None
    }

    fn stop(&self) {}
}

/// Camera device handing out [`SolidStream`]s, or rejecting
pub struct FakeCamera {
    pub deny: bool,
    pub blank: bool,
    pub opened: AtomicUsize,
}

impl FakeCamera {
    #[must_use]
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            deny: false,
            blank: false,
            opened: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn denied() -> Arc<Self> {
        Arc::new(Self {
            deny: true,
            blank: false,
            opened: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn blank() -> Arc<Self> {
        Arc::new(Self {
            deny: false,
            blank: true,
            opened: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn open(&self, _: &StreamConstraints) -> Result<Box<dyn VideoStream>> {
        if self.deny {
            return Err(Error::Camera("Permission denied".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.blank {
            Ok(Box::new(BlankStream))
        } else {
            Ok(Box::new(SolidStream))
        }
    }
}

/// Vision assessor with a scripted answer
///
/// With `gate` set, each call waits for a notification before answering.
pub struct FakeVision {
    pub answer: std::result::Result<Assessment, String>,
    pub calls: AtomicUsize,
    pub contexts: std::sync::Mutex<Vec<(String, String)>>,
    pub gate: Option<Arc<Notify>>,
}

impl FakeVision {
    #[must_use]
    pub fn answering(feedback: &str, passed: bool) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(Assessment {
                feedback: feedback.to_string(),
                passed,
            }),
            calls: AtomicUsize::new(0),
            contexts: std::sync::Mutex::new(Vec::new()),
            gate: None,
        })
    }

    #[must_use]
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            contexts: std::sync::Mutex::new(Vec::new()),
            gate: None,
        })
    }

    #[must_use]
    pub fn gated(feedback: &str, passed: bool, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(Assessment {
                feedback: feedback.to_string(),
                passed,
            }),
            calls: AtomicUsize::new(0),
            contexts: std::sync::Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionAssessor for FakeVision {
    async fn assess(
        &self,
        image_base64: &str,
        question: &str,
        step_context: &str,
    ) -> Result<Assessment> {
        assert!(!image_base64.is_empty(), "assessor called without an image");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts
            .lock()
            .expect("contexts lock")
            .push((question.to_string(), step_context.to_string()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.answer.clone().map_err(Error::Vision)
    }
}

/// Far end of a fake conversation
pub struct FakePeer {
    pub events: mpsc::Sender<AgentEvent>,
    pub outgoing: mpsc::Receiver<ClientMessage>,
}

/// Voice connector that hands each conversation to the test
#[derive(Default)]
pub struct FakeConnector {
    pub peer: Mutex<Option<FakePeer>>,
}

impl FakeConnector {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the peer of the conversation opened last
    pub async fn take_peer(&self) -> FakePeer {
        self.peer.lock().await.take().expect("no conversation opened")
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(&self, _: &SessionConfig) -> Result<AgentChannel> {
        let (event_tx, events) = mpsc::channel(16);
        let (outgoing, outgoing_rx) = mpsc::channel(16);
        *self.peer.lock().await = Some(FakePeer {
            events: event_tx,
            outgoing: outgoing_rx,
        });
        Ok(AgentChannel { events, outgoing })
    }
}

/// Build and open a cook session over the fakes
pub async fn open_session(
    camera: Arc<FakeCamera>,
    vision: Arc<FakeVision>,
    voice: Option<Arc<FakeConnector>>,
) -> Arc<CookSession> {
    let source = CameraSource::new(camera, StreamConstraints::default());
    let mut builder = CookSession::builder(test_recipe(), source, vision);
    if let Some(connector) = voice {
        builder = builder.voice(SessionConfig::new("agent_test"), connector);
    }
    let session = builder.build();
    session.open().await;
    session
}

/// Wait up to a second for `condition`
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
