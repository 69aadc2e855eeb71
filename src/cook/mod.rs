//! Cook session
//!
//! One active cooking run: the recipe being followed, the current step, the
//! camera feed, the debug log and the optional voice conversation. The voice
//! agent reaches back into the session through [`AskQuestionTool`], which
//! snapshots the camera, asks the vision model about the current step and
//! advances when the step is judged complete.

pub mod debug_log;
pub mod navigator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

pub use debug_log::{DEBUG_LOG_CAPACITY, DebugEntry, DebugKind, DebugRecorder};
pub use navigator::StepNavigator;

use crate::camera::{CameraSource, CameraStatus};
use crate::recipes::{Recipe, Step};
use crate::vision::VisionAssessor;
use crate::voice::{
    ClientTool, ConnectionState, SessionConfig, ToolRegistry, VoiceConnector, VoiceSession,
};
use crate::{Error, Result};

/// Name the voice agent invokes the question tool by
pub const ASK_QUESTION_TOOL: &str = "asks_question";

/// Question used when the agent sends none
pub const DEFAULT_QUESTION: &str = "How does my dish look?";

/// Reply when no frame could be captured
pub const CAMERA_APOLOGY: &str =
    "Sorry, I couldn't get a look through the camera just now. Make sure it's on and pointed at your cooking, then ask again.";

/// Reply when the vision request fails
pub const GENERIC_APOLOGY: &str = "Sorry, I had trouble checking that. Please try asking again.";

/// Reply to a question that arrives while another is being assessed
pub const BUSY_REPLY: &str = "I'm still looking at your last photo. Give me a moment.";

/// Resets the in-flight flag when the question handler returns
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State of one cooking run
///
/// Created by the cook route and shared as `Arc`. [`close`](Self::close)
/// tears everything down; work that finishes afterwards is discarded.
pub struct CookSession {
    id: Uuid,
    recipe: Arc<Recipe>,
    navigator: Mutex<StepNavigator>,
    debug: Mutex<DebugRecorder>,
    camera: Mutex<CameraSource>,
    vision: Arc<dyn VisionAssessor>,
    voice: Option<VoiceSession>,
    in_flight: AtomicBool,
    active: AtomicBool,
}

/// Builder for [`CookSession`]
pub struct CookSessionBuilder {
    recipe: Arc<Recipe>,
    camera: CameraSource,
    vision: Arc<dyn VisionAssessor>,
    voice: Option<(SessionConfig, Arc<dyn VoiceConnector>)>,
}

impl CookSessionBuilder {
    /// Attach a voice agent; without one the session has no talk control
    #[must_use]
    pub fn voice(mut self, config: SessionConfig, connector: Arc<dyn VoiceConnector>) -> Self {
        self.voice = Some((config, connector));
        self
    }

    /// Build the session; nothing is acquired until [`CookSession::open`]
    #[must_use]
    pub fn build(self) -> Arc<CookSession> {
        let Self {
            recipe,
            camera,
            vision,
            voice,
        } = self;

        Arc::new_cyclic(|session: &Weak<CookSession>| {
            let voice = voice.map(|(config, connector)| {
                let tools = ToolRegistry::new().with(Arc::new(AskQuestionTool {
                    session: session.clone(),
                }));
                VoiceSession::new(config, connector, tools)
            });

            CookSession {
                id: Uuid::new_v4(),
                navigator: Mutex::new(StepNavigator::new(recipe.steps.len())),
                recipe,
                debug: Mutex::new(DebugRecorder::new()),
                camera: Mutex::new(camera),
                vision,
                voice,
                in_flight: AtomicBool::new(false),
                active: AtomicBool::new(false),
            }
        })
    }
}

impl CookSession {
    #[must_use]
    pub fn builder(
        recipe: Arc<Recipe>,
        camera: CameraSource,
        vision: Arc<dyn VisionAssessor>,
    ) -> CookSessionBuilder {
        CookSessionBuilder {
            recipe,
            camera,
            vision,
            voice: None,
        }
    }

    /// Activate the session and start the camera
    pub async fn open(&self) -> CameraStatus {
        self.active.store(true, Ordering::Release);
        tracing::info!(session_id = %self.id, recipe = %self.recipe.id, "cook session opened");
        self.start_camera().await
    }

    /// End the voice session, release the camera and clear the debug log
    ///
    /// Safe to call at any time, including while a question is in flight.
    pub async fn close(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(voice) = &self.voice {
            voice.end().await;
        }
        self.camera.lock().await.release();
        self.debug.lock().await.clear();

        tracing::info!(session_id = %self.id, recipe = %self.recipe.id, "cook session closed");
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn recipe(&self) -> &Arc<Recipe> {
        &self.recipe
    }

    /// Zero-based index of the current step
    pub async fn step_index(&self) -> usize {
        self.navigator.lock().await.index()
    }

    pub async fn navigator(&self) -> StepNavigator {
        *self.navigator.lock().await
    }

    /// The step currently shown; `None` for a recipe without steps
    pub async fn current_step(&self) -> Option<&Step> {
        let index = self.step_index().await;
        self.recipe.steps.get(index)
    }

    pub async fn prev_step(&self) -> usize {
        self.navigator.lock().await.prev()
    }

    pub async fn next_step(&self) -> usize {
        self.navigator.lock().await.next()
    }

    pub async fn jump_to_step(&self, index: usize) -> usize {
        self.navigator.lock().await.jump_to(index)
    }

    /// Acquire the camera; a no-op when it is already on
    pub async fn start_camera(&self) -> CameraStatus {
        self.camera.lock().await.acquire().await.clone()
    }

    pub async fn stop_camera(&self) -> CameraStatus {
        let mut camera = self.camera.lock().await;
        camera.release();
        camera.status().clone()
    }

    pub async fn camera_status(&self) -> CameraStatus {
        self.camera.lock().await.status().clone()
    }

    /// Voice session, present when an agent is configured
    #[must_use]
    pub const fn voice(&self) -> Option<&VoiceSession> {
        self.voice.as_ref()
    }

    #[must_use]
    pub fn voice_state(&self) -> Option<ConnectionState> {
        self.voice.as_ref().map(VoiceSession::state)
    }

    /// Start or end the voice conversation
    ///
    /// Returns `None` when no agent is configured.
    pub async fn toggle_voice(&self) -> Option<ConnectionState> {
        match &self.voice {
            Some(voice) => Some(voice.toggle().await),
            None => None,
        }
    }

    /// Whether a question is being assessed right now
    #[must_use]
    pub fn question_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn debug_entries(&self) -> Vec<DebugEntry> {
        self.debug.lock().await.snapshot()
    }

    /// Id of the newest debug entry, for auto-scroll
    pub async fn newest_debug_id(&self) -> Option<u64> {
        self.debug.lock().await.newest_id()
    }

    pub async fn clear_debug(&self) {
        self.debug.lock().await.clear();
    }

    pub async fn subscribe_debug(&self) -> broadcast::Receiver<DebugEntry> {
        self.debug.lock().await.subscribe()
    }

    async fn record(&self, kind: DebugKind, message: String) {
        self.record_with_thumbnail(kind, message, None).await;
    }

    async fn record_with_thumbnail(
        &self,
        kind: DebugKind,
        message: String,
        thumbnail: Option<String>,
    ) {
        if !self.is_active() {
            return;
        }
        self.debug
            .lock()
            .await
            .append_with_thumbnail(kind, message, thumbnail);
    }

    /// Answer a question about the cooking in front of the camera
    ///
    /// Reads the current step at call time. Only one question is assessed
    /// at a time; a question arriving meanwhile gets [`BUSY_REPLY`].
    ///
    /// # Errors
    ///
    /// Returns error if the session was closed before the answer arrived
    pub async fn ask_question(&self, question: Option<&str>) -> Result<String> {
        let question = question
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_QUESTION);

        if !self.is_active() {
            return Err(Error::NotFound("cook session is closed".to_string()));
        }

        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.record(
                DebugKind::Error,
                format!("Ignored \"{question}\" while another question is in progress"),
            )
            .await;
            return Ok(BUSY_REPLY.to_string());
        }
        let _in_flight = InFlight(&self.in_flight);

        self.record(DebugKind::ToolCall, format!("{ASK_QUESTION_TOOL}: \"{question}\""))
            .await;

        let snapshot = self.camera.lock().await.snapshot();
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record(DebugKind::Error, format!("Snapshot failed: {e}"))
                    .await;
                return Ok(CAMERA_APOLOGY.to_string());
            }
        };

        self.record_with_thumbnail(
            DebugKind::Snapshot,
            format!(
                "Captured {}x{} frame ({} KB)",
                snapshot.width,
                snapshot.height,
                snapshot.jpeg.len().div_ceil(1024)
            ),
            Some(snapshot.data_url.clone()),
        )
        .await;

        let step = self.current_step().await;
        let request = match step {
            Some(step) => format!("Asking vision model about step {}: \"{question}\"", step.id),
            None => format!("Asking vision model: \"{question}\""),
        };
        self.record(DebugKind::VisionRequest, request).await;

        let step_context = step.map_or("", |step| step.text.as_str());
        let result = self
            .vision
            .assess(&snapshot.base64, question, step_context)
            .await;

        if !self.is_active() {
            tracing::debug!("dropping vision result for closed cook session");
            return Err(Error::NotFound("cook session is closed".to_string()));
        }

        match result {
            Ok(assessment) => {
                self.record(
                    DebugKind::VisionResponse,
                    format!("{} (passed: {})", assessment.feedback, assessment.passed),
                )
                .await;

                if assessment.passed {
                    let index = self.next_step().await;
                    tracing::info!(step = index + 1, "step passed, advancing");
                }

                Ok(assessment.feedback)
            }
            Err(e) => {
                self.record(DebugKind::Error, format!("Vision request failed: {e}"))
                    .await;
                Ok(GENERIC_APOLOGY.to_string())
            }
        }
    }
}

/// The `asks_question` client tool
///
/// Holds only a weak reference so a live conversation never keeps a closed
/// session alive.
pub struct AskQuestionTool {
    session: Weak<CookSession>,
}

#[async_trait]
impl ClientTool for AskQuestionTool {
    fn name(&self) -> &str {
        ASK_QUESTION_TOOL
    }

    async fn call(&self, parameters: Value) -> Result<String> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| Error::NotFound("cook session is closed".to_string()))?;

        let question = parameters.get("question").and_then(Value::as_str);
        session.ask_question(question).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use image::{Rgb, RgbImage};

    use super::*;
    use crate::camera::{CameraDevice, StreamConstraints, VideoStream};
    use crate::vision::Assessment;

    struct Frame;

    impl VideoStream for Frame {
        fn dimensions(&self) -> (u32, u32) {
            (8, 8)
        }

        fn current_frame(&self) -> Option<RgbImage> {
            Some(RgbImage::from_pixel(8, 8, Rgb([200, 120, 40])))
        }

        fn stop(&self) {}
    }

    struct Device;

    #[async_trait]
    impl CameraDevice for Device {
        async fn open(&self, _: &StreamConstraints) -> Result<Box<dyn VideoStream>> {
            Ok(Box::new(Frame))
        }
    }

    struct Judge {
        passed: bool,
        calls: AtomicUsize,
        contexts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VisionAssessor for Judge {
        async fn assess(&self, image: &str, _: &str, step_context: &str) -> Result<Assessment> {
            assert!(!image.is_empty());
            self.contexts
                .lock()
                .unwrap()
                .push(step_context.to_string());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Assessment {
                feedback: "Nicely diced.".to_string(),
                passed: self.passed,
            })
        }
    }

    fn recipe() -> Arc<Recipe> {
        let steps = (1..=3)
            .map(|id| Step {
                id,
                text: format!("Do step number {id} carefully."),
                prompt: None,
            })
            .collect();
        Arc::new(Recipe {
            id: "test".to_string(),
            title: "Test".to_string(),
            description: "A test recipe".to_string(),
            image: String::new(),
            steps,
        })
    }

    fn session_for(recipe: Arc<Recipe>, passed: bool) -> (Arc<CookSession>, Arc<Judge>) {
        let judge = Arc::new(Judge {
            passed,
            calls: AtomicUsize::new(0),
            contexts: std::sync::Mutex::new(Vec::new()),
        });
        let camera = CameraSource::new(Arc::new(Device), StreamConstraints::default());
        let session = CookSession::builder(recipe, camera, judge.clone()).build();
        (session, judge)
    }

    fn session(passed: bool) -> (Arc<CookSession>, Arc<Judge>) {
        session_for(recipe(), passed)
    }

    #[tokio::test]
    async fn open_acquires_camera_and_close_releases() {
        let (session, _) = session(false);
        assert!(session.open().await.is_on());
        assert!(session.is_active());

        session.close().await;
        assert_eq!(session.camera_status().await, CameraStatus::Idle);
        assert!(!session.is_active());

        // idempotent
        session.close().await;
    }

    #[tokio::test]
    async fn passed_assessment_advances_one_step() {
        let (session, judge) = session(true);
        session.open().await;

        let reply = session.ask_question(Some("Is it done?")).await.unwrap();
        assert_eq!(reply, "Nicely diced.");
        assert_eq!(session.step_index().await, 1);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 1);

        let kinds: Vec<DebugKind> = session.debug_entries().await.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DebugKind::ToolCall,
                DebugKind::Snapshot,
                DebugKind::VisionRequest,
                DebugKind::VisionResponse
            ]
        );
    }

    #[tokio::test]
    async fn recipe_without_steps_is_inert() {
        let empty = Arc::new(Recipe {
            steps: Vec::new(),
            ..(*recipe()).clone()
        });
        let (session, judge) = session_for(empty, true);
        session.open().await;

        assert!(session.current_step().await.is_none());
        assert_eq!(session.next_step().await, 0);
        assert_eq!(session.jump_to_step(5).await, 0);

        let reply = session.ask_question(Some("Does this look right?")).await.unwrap();
        assert_eq!(reply, "Nicely diced.");
        assert_eq!(session.step_index().await, 0);
        assert_eq!(*judge.contexts.lock().unwrap(), vec![String::new()]);
    }

    #[tokio::test]
    async fn failed_assessment_stays_on_step() {
        let (session, _) = session(false);
        session.open().await;
        session.ask_question(None).await.unwrap();
        assert_eq!(session.step_index().await, 0);
    }

    #[tokio::test]
    async fn camera_off_apologizes() {
        let (session, judge) = session(true);
        session.open().await;
        session.stop_camera().await;

        let reply = session.ask_question(Some("Look?")).await.unwrap();
        assert_eq!(reply, CAMERA_APOLOGY);
        assert_eq!(session.step_index().await, 0);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);

        let entries = session.debug_entries().await;
        assert_eq!(entries.last().map(|e| e.kind), Some(DebugKind::Error));
    }

    #[tokio::test]
    async fn closed_session_rejects_questions() {
        let (session, _) = session(true);
        session.open().await;
        session.close().await;
        assert!(session.ask_question(None).await.is_err());
        assert!(session.debug_entries().await.is_empty());
    }

    #[tokio::test]
    async fn tool_reads_question_parameter() {
        let (session, _) = session(true);
        session.open().await;
        let tool = AskQuestionTool {
            session: Arc::downgrade(&session),
        };
        assert_eq!(tool.name(), "asks_question");

        let reply = tool
            .call(serde_json::json!({ "question": "  Ready?  " }))
            .await
            .unwrap();
        assert_eq!(reply, "Nicely diced.");

        let first = session.debug_entries().await.remove(0);
        assert_eq!(first.message, "asks_question: \"Ready?\"");
    }

    #[tokio::test]
    async fn tool_fails_after_session_dropped() {
        let (session, _) = session(true);
        let tool = AskQuestionTool {
            session: Arc::downgrade(&session),
        };
        drop(session);
        assert!(tool.call(Value::Null).await.is_err());
    }
}
