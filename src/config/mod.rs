//! Configuration management for the cooking coach
//!
//! Precedence is environment, then the TOML file, then defaults. Missing
//! credentials never fail loading; the features that need them stay off.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::camera::FacingMode;
use crate::vision;
use crate::voice::DEFAULT_VOICE_URL;

pub use file::{CoachConfigFile, config_file_path, load_config_file, load_config_file_from};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5180;

/// Cooking coach configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Voice agent configuration
    pub voice: VoiceConfig,

    /// Vision model configuration
    pub vision: VisionConfig,

    /// Camera configuration
    pub camera: CameraConfig,

    /// HTTP API server configuration
    pub server: ServerConfig,

    /// External recipe catalog, embedded catalog when unset
    pub recipes_path: Option<PathBuf>,
}

/// Voice agent configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Agent id; the talk control is hidden without one
    pub agent_id: Option<String>,

    /// Key for fetching signed URLs of private agents
    pub api_key: Option<SecretString>,

    /// Agent WebSocket base URL
    pub base_url: String,

    /// Bridge the local microphone and speaker
    pub audio: bool,
}

impl VoiceConfig {
    /// Whether a voice session can be started at all
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.agent_id.is_some()
    }
}

/// Vision model configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: vision::DEFAULT_MODEL.to_string(),
            base_url: vision::DEFAULT_BASE_URL.to_string(),
            timeout: vision::DEFAULT_TIMEOUT,
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, Default)]
pub struct CameraConfig {
    /// Serve this still image instead of waiting for a browser peer
    pub file: Option<PathBuf>,

    /// Preferred camera
    pub facing_mode: FacingMode,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    #[must_use]
    pub fn load() -> Self {
        Self::load_with_options(false)
    }

    /// Load configuration with an explicit audio bridge override
    #[must_use]
    pub fn load_with_options(disable_audio: bool) -> Self {
        let fc = load_config_file();
        let config = Self::resolve(fc, |key| std::env::var(key).ok(), disable_audio);

        tracing::debug!(
            voice = config.voice.is_configured(),
            vision = config.vision.api_key.is_some(),
            port = config.server.port,
            "configuration loaded"
        );

        config
    }

    /// Merge a parsed config file with environment values
    ///
    /// `env` returns the value of an environment variable; empty values count
    /// as unset.
    pub fn resolve(
        fc: CoachConfigFile,
        env: impl Fn(&str) -> Option<String>,
        disable_audio: bool,
    ) -> Self {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // Voice config (env > toml > default)
        let audio_disabled =
            disable_audio || var("COACH_DISABLE_AUDIO").is_some_and(|v| is_truthy(&v));
        let voice = VoiceConfig {
            agent_id: var("COACH_AGENT_ID")
                .or_else(|| var("ELEVENLABS_AGENT_ID"))
                .or(fc.voice.agent_id),
            api_key: var("ELEVENLABS_API_KEY")
                .or(fc.voice.api_key)
                .map(SecretString::from),
            base_url: var("COACH_VOICE_URL")
                .or(fc.voice.base_url)
                .unwrap_or_else(|| DEFAULT_VOICE_URL.to_string()),
            audio: !audio_disabled && fc.voice.audio.unwrap_or(true),
        };

        if voice.agent_id.is_none() {
            tracing::info!("no voice agent configured, talk control disabled");
        }
        if disable_audio {
            tracing::info!("local audio explicitly disabled via --no-audio");
        }

        // Vision config (env > toml > default)
        let timeout_secs = var("COACH_VISION_TIMEOUT_SECS")
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        tracing::warn!(value = %s, error = %e, "invalid vision timeout, ignoring");
                    })
                    .ok()
            })
            .or(fc.vision.timeout_secs);
        let vision = VisionConfig {
            api_key: var("GEMINI_API_KEY")
                .or_else(|| var("GOOGLE_AI_API_KEY"))
                .or(fc.vision.api_key)
                .map(SecretString::from),
            model: var("COACH_VISION_MODEL")
                .or(fc.vision.model)
                .unwrap_or_else(|| vision::DEFAULT_MODEL.to_string()),
            base_url: var("COACH_VISION_URL")
                .or(fc.vision.base_url)
                .unwrap_or_else(|| vision::DEFAULT_BASE_URL.to_string()),
            timeout: timeout_secs.map_or(vision::DEFAULT_TIMEOUT, Duration::from_secs),
        };

        if vision.api_key.is_none() {
            tracing::info!("no vision API key configured, visual questions will fail");
        }

        // Camera config
        let facing_mode = var("COACH_FACING_MODE")
            .or(fc.camera.facing_mode)
            .and_then(|s| {
                s.parse::<FacingMode>()
                    .map_err(|e| tracing::warn!(error = %e, "ignoring facing mode"))
                    .ok()
            })
            .unwrap_or_default();
        let camera = CameraConfig {
            file: var("COACH_CAMERA_FILE")
                .or(fc.camera.file)
                .map(PathBuf::from),
            facing_mode,
        };

        // API server config (env > toml > default)
        let port = var("COACH_PORT")
            .or_else(|| var("PORT"))
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);
        let server = ServerConfig {
            port,
            static_dir: var("COACH_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        let recipes_path = var("COACH_RECIPES").or(fc.recipes.path).map(PathBuf::from);

        Self {
            voice,
            vision,
            camera,
            server,
            recipes_path,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
