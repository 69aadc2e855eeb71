//! HTTP API server for the cooking coach

pub mod camera;
pub mod cook;
pub mod debug;
pub mod health;
pub mod recipes;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::camera::{CameraDevice, CameraSource, RemoteCamera, StillCamera, StreamConstraints};
use crate::config::Config;
use crate::cook::CookSession;
use crate::recipes::{Recipe, RecipeCatalog};
use crate::vision::{VisionAssessor, VisionFeedbackClient};
use crate::voice::{ElevenLabsConnector, SessionConfig, VoiceConnector};
use crate::Result;

/// Voice agent wiring handed to each cook session
#[derive(Clone)]
pub struct VoiceSetup {
    pub config: SessionConfig,
    pub connector: Arc<dyn VoiceConnector>,
}

/// Shared state for API handlers
pub struct ApiState {
    pub catalog: RecipeCatalog,
    /// Browser camera peer endpoint, always available at `/ws/camera`
    pub remote_camera: RemoteCamera,
    /// Device each cook session opens its camera on
    pub camera_device: Arc<dyn CameraDevice>,
    pub constraints: StreamConstraints,
    pub vision: Arc<dyn VisionAssessor>,
    /// Absent when no agent is configured; the talk control is hidden
    pub voice: Option<VoiceSetup>,
    session: Mutex<Option<Arc<CookSession>>>,
}

impl ApiState {
    /// The open cook session, if any
    pub async fn active_session(&self) -> Option<Arc<CookSession>> {
        self.session.lock().await.clone()
    }

    /// Open a cook session for `recipe`, or re-enter the one already open
    ///
    /// Any session for a different recipe is closed first.
    pub async fn enter_session(&self, recipe: Arc<Recipe>) -> Arc<CookSession> {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref() {
            if session.recipe().id == recipe.id && session.is_active() {
                return Arc::clone(session);
            }
        }

        if let Some(previous) = slot.take() {
            previous.close().await;
        }

        let camera = CameraSource::new(Arc::clone(&self.camera_device), self.constraints);
        let mut builder = CookSession::builder(recipe, camera, Arc::clone(&self.vision));
        if let Some(voice) = &self.voice {
            builder = builder.voice(voice.config.clone(), Arc::clone(&voice.connector));
        }

        let session = builder.build();
        session.open().await;
        *slot = Some(Arc::clone(&session));
        session
    }

    /// Close and forget the open cook session
    pub async fn close_session(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.close().await;
        }
    }
}

/// JSON error body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Handler failures
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    NoSession,
    VoiceUnavailable,
    BadRequest(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::VoiceUnavailable => StatusCode::NOT_FOUND,
            Self::NoSession => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NoSession => "no_session",
            Self::VoiceUnavailable => "voice_unavailable",
            Self::BadRequest(_) => "bad_request",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotFound(message) | Self::BadRequest(message) => message.clone(),
            Self::NoSession => "no cook session is open".to_string(),
            Self::VoiceUnavailable => "voice agent is not configured".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.message(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    catalog: RecipeCatalog,
    port: u16,
    static_dir: Option<PathBuf>,
    remote_camera: RemoteCamera,
    camera_device: Option<Arc<dyn CameraDevice>>,
    constraints: StreamConstraints,
    vision: Option<Arc<dyn VisionAssessor>>,
    voice: Option<VoiceSetup>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(catalog: RecipeCatalog, port: u16) -> Self {
        Self {
            catalog,
            port,
            static_dir: None,
            remote_camera: RemoteCamera::new(),
            camera_device: None,
            constraints: StreamConstraints::default(),
            vision: None,
            voice: None,
        }
    }

    /// Wire devices and remote services from configuration
    #[must_use]
    pub fn from_config(config: &Config, catalog: RecipeCatalog) -> Self {
        let mut builder = Self::new(catalog, config.server.port)
            .static_dir(config.server.static_dir.clone())
            .constraints(StreamConstraints::with_facing_mode(config.camera.facing_mode))
            .vision(Arc::new(VisionFeedbackClient::from_config(&config.vision)));

        if let Some(path) = &config.camera.file {
            tracing::info!(path = %path.display(), "using still image as camera");
            builder = builder.camera_device(Arc::new(StillCamera::new(path)));
        }

        if let Some(agent_id) = &config.voice.agent_id {
            builder = builder.voice(
                SessionConfig::new(agent_id.clone()).with_base_url(config.voice.base_url.clone()),
                Arc::new(ElevenLabsConnector::from_config(&config.voice)),
            );
        }

        builder
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Use `device` instead of the browser peer
    #[must_use]
    pub fn camera_device(mut self, device: Arc<dyn CameraDevice>) -> Self {
        self.camera_device = Some(device);
        self
    }

    #[must_use]
    pub const fn constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn vision(mut self, vision: Arc<dyn VisionAssessor>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Enable the voice agent
    #[must_use]
    pub fn voice(mut self, config: SessionConfig, connector: Arc<dyn VoiceConnector>) -> Self {
        self.voice = Some(VoiceSetup { config, connector });
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let camera_device = self
            .camera_device
            .unwrap_or_else(|| Arc::new(self.remote_camera.clone()));
        let vision = self
            .vision
            .unwrap_or_else(|| Arc::new(VisionFeedbackClient::new(None)));

        let state = Arc::new(ApiState {
            catalog: self.catalog,
            remote_camera: self.remote_camera,
            camera_device,
            constraints: self.constraints,
            vision,
            voice: self.voice,
            session: Mutex::new(None),
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(recipes::router(self.state.clone()))
            .merge(cook::router(self.state.clone()))
            .nest("/api/cook", cook::api_router(self.state.clone()))
            .nest("/ws/camera", camera::router(self.state.clone()))
            .nest("/ws/debug", debug::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        // Serve static files if configured, otherwise send strays home
        let router = if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            tracing::info!(path = %static_dir.display(), "serving static files");
            router.fallback_service(serve_dir)
        } else {
            router.fallback(|| async { Redirect::to("/") })
        };

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run_until(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        self.state.close_session().await;
        Ok(())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
