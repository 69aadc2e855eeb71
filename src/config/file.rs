//! TOML configuration file loading
//!
//! Supports `~/.config/cook-coach/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CoachConfigFile {
    /// Voice agent configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Vision model configuration
    #[serde(default)]
    pub vision: VisionFileConfig,

    /// Camera configuration
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Recipe catalog configuration
    #[serde(default)]
    pub recipes: RecipesFileConfig,
}

/// Voice agent configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Conversational agent id
    pub agent_id: Option<String>,

    /// API key used to sign private agent URLs
    pub api_key: Option<String>,

    /// Agent WebSocket base URL
    pub base_url: Option<String>,

    /// Bridge the local microphone and speaker
    pub audio: Option<bool>,
}

/// Vision model configuration
#[derive(Debug, Default, Deserialize)]
pub struct VisionFileConfig {
    pub api_key: Option<String>,

    /// Model identifier (e.g. "gemini-2.5-flash")
    pub model: Option<String>,

    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    /// Still image served as the camera feed
    pub file: Option<String>,

    /// "environment" or "user"
    pub facing_mode: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Path to static files directory (web UI)
    pub static_dir: Option<String>,
}

/// Recipe catalog configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecipesFileConfig {
    /// External JSON catalog replacing the embedded one
    pub path: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CoachConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CoachConfigFile {
    config_file_path().map_or_else(CoachConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Returns `CoachConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> CoachConfigFile {
    if !path.exists() {
        return CoachConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CoachConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CoachConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/cook-coach/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("cook-coach").join("config.toml"))
}
