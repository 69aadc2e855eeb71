//! Cook screen: view model and actions
//!
//! `GET /cook/{recipe_id}` opens the session and returns the whole screen.
//! Everything under `/api/cook` acts on the session already open.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::camera::CameraStatus;
use crate::cook::{CookSession, DebugEntry};
use crate::recipes::Step;
use crate::voice::ConnectionState;

/// Overlay badge on the camera feed
pub const CAMERA_BADGE: &str = "AI Coach";

/// Framing hint on the camera feed
pub const CAMERA_HINT: &str = "Keep the cutting board in frame";

/// Placeholder shown while the debug log is empty
pub const DEBUG_EMPTY: &str = "Waiting for tool calls...";

/// Build cook screen router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/cook/{recipe_id}", get(enter))
        .with_state(state)
}

/// Build cook action router
pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(view))
        .route("/steps/prev", post(prev_step))
        .route("/steps/next", post(next_step))
        .route("/steps/jump", post(jump_step))
        .route("/camera/start", post(start_camera))
        .route("/camera/stop", post(stop_camera))
        .route("/voice/toggle", post(toggle_voice))
        .route("/debug", get(debug_log).delete(clear_debug))
        .with_state(state)
}

/// Optional panels
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    /// Include the full step list
    #[serde(default)]
    pub steps: bool,
    /// Include the debug panel
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub index: usize,
}

/// Step pill over the camera feed
#[derive(Debug, Serialize)]
pub struct StepPill {
    /// One-based
    pub number: usize,
    pub total: usize,
    /// `"Step n"`
    pub label: String,
    pub prompt: String,
    pub text: String,
    pub can_prev: bool,
    pub can_next: bool,
}

#[derive(Debug, Serialize)]
pub struct StepItem {
    pub number: usize,
    pub prompt: String,
    pub text: String,
    pub current: bool,
}

#[derive(Debug, Serialize)]
pub struct CameraView {
    #[serde(flatten)]
    pub status: CameraStatus,
    pub badge: &'static str,
    pub hint: &'static str,
}

/// Floating talk button
#[derive(Debug, Serialize)]
pub struct TalkControl {
    #[serde(flatten)]
    pub state: ConnectionState,
    pub label: &'static str,
    pub icon: &'static str,
    pub disabled: bool,
    /// Present while a visual question is being answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator: Option<Indicator>,
}

#[derive(Debug, Serialize)]
pub struct Indicator {
    pub icon: &'static str,
    pub label: &'static str,
}

impl Indicator {
    const QUESTION: Self = Self {
        icon: "❓",
        label: "Question detected",
    };
}

impl TalkControl {
    fn new(state: ConnectionState, question_pending: bool) -> Self {
        Self {
            state,
            label: state.label(),
            icon: state.icon(),
            disabled: state == ConnectionState::Connecting,
            indicator: question_pending.then_some(Indicator::QUESTION),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DebugPanel {
    pub entries: Vec<DebugEntry>,
    /// Newest entry id; the panel keeps it in view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_to: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty: Option<&'static str>,
}

impl DebugPanel {
    async fn from_session(session: &CookSession) -> Self {
        let entries = session.debug_entries().await;
        let scroll_to = entries.last().map(|entry| entry.id);
        let empty = entries.is_empty().then_some(DEBUG_EMPTY);
        Self {
            entries,
            scroll_to,
            empty,
        }
    }
}

/// Everything the cook screen renders
#[derive(Debug, Serialize)]
pub struct CookView {
    pub session_id: Uuid,
    pub recipe_id: String,
    pub title: String,
    pub step: StepPill,
    pub camera: CameraView,
    /// Absent when no voice agent is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talk: Option<TalkControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugPanel>,
}

impl CookView {
    /// Render the current state of `session`
    pub async fn build(session: &CookSession, query: &ViewQuery) -> Self {
        let recipe = session.recipe();
        let navigator = session.navigator().await;
        let index = navigator.index();
        let current = session.current_step().await;

        let step = StepPill {
            number: index + 1,
            total: navigator.len(),
            label: format!("Step {}", index + 1),
            prompt: current.map(Step::display_prompt).unwrap_or_default(),
            text: current.map(|step| step.text.clone()).unwrap_or_default(),
            can_prev: !navigator.is_first(),
            can_next: !navigator.is_last(),
        };

        let steps = query.steps.then(|| {
            recipe
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| StepItem {
                    number: i + 1,
                    prompt: step.display_prompt(),
                    text: step.text.clone(),
                    current: i == index,
                })
                .collect()
        });

        let debug = if query.debug {
            Some(DebugPanel::from_session(session).await)
        } else {
            None
        };

        Self {
            session_id: session.id(),
            recipe_id: recipe.id.clone(),
            title: recipe.title.clone(),
            step,
            camera: CameraView {
                status: session.camera_status().await,
                badge: CAMERA_BADGE,
                hint: CAMERA_HINT,
            },
            talk: session
                .voice_state()
                .map(|state| TalkControl::new(state, session.question_pending())),
            steps,
            debug,
        }
    }
}

async fn active(state: &ApiState) -> Result<Arc<CookSession>, ApiError> {
    state.active_session().await.ok_or(ApiError::NoSession)
}

/// Open (or re-enter) the cook session for a recipe
///
/// Unknown ids fall back to the first recipe.
async fn enter(
    State(state): State<Arc<ApiState>>,
    Path(recipe_id): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Json<CookView> {
    let recipe = state.catalog.resolve(&recipe_id);
    let session = state.enter_session(recipe).await;
    Json(CookView::build(&session, &query).await)
}

async fn view(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<CookView>, ApiError> {
    let session = active(&state).await?;
    Ok(Json(CookView::build(&session, &query).await))
}

async fn prev_step(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<CookView>, ApiError> {
    let session = active(&state).await?;
    session.prev_step().await;
    Ok(Json(CookView::build(&session, &query).await))
}

async fn next_step(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<CookView>, ApiError> {
    let session = active(&state).await?;
    session.next_step().await;
    Ok(Json(CookView::build(&session, &query).await))
}

async fn jump_step(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ViewQuery>,
    Json(req): Json<JumpRequest>,
) -> Result<Json<CookView>, ApiError> {
    let session = active(&state).await?;
    session.jump_to_step(req.index).await;
    Ok(Json(CookView::build(&session, &query).await))
}

async fn start_camera(State(state): State<Arc<ApiState>>) -> Result<Json<CameraView>, ApiError> {
    let session = active(&state).await?;
    Ok(Json(CameraView {
        status: session.start_camera().await,
        badge: CAMERA_BADGE,
        hint: CAMERA_HINT,
    }))
}

async fn stop_camera(State(state): State<Arc<ApiState>>) -> Result<Json<CameraView>, ApiError> {
    let session = active(&state).await?;
    Ok(Json(CameraView {
        status: session.stop_camera().await,
        badge: CAMERA_BADGE,
        hint: CAMERA_HINT,
    }))
}

async fn toggle_voice(State(state): State<Arc<ApiState>>) -> Result<Json<TalkControl>, ApiError> {
    let session = active(&state).await?;
    let voice_state = session
        .toggle_voice()
        .await
        .ok_or(ApiError::VoiceUnavailable)?;
    Ok(Json(TalkControl::new(voice_state, session.question_pending())))
}

async fn debug_log(State(state): State<Arc<ApiState>>) -> Result<Json<DebugPanel>, ApiError> {
    let session = active(&state).await?;
    Ok(Json(DebugPanel::from_session(&session).await))
}

async fn clear_debug(State(state): State<Arc<ApiState>>) -> Result<StatusCode, ApiError> {
    let session = active(&state).await?;
    session.clear_debug().await;
    Ok(StatusCode::NO_CONTENT)
}
