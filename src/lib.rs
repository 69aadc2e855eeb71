//! Cook Coach - camera and voice cooking coach gateway
//!
//! This library provides the core functionality of the coach:
//! - Recipe catalog and step prompts
//! - Camera feed and single-frame snapshots
//! - Visual step assessment via a hosted multimodal model
//! - Voice agent sessions with client tool calls
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │   Cook screen  │  Camera peer  │  Debug feed  │ CLI  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Cook Session                       │
//! │   Steps  │  Camera  │  Debug log  │  asks_question   │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼──────────┐       ┌──────────▼────────────┐
//! │  Voice agent (WS)   │       │  Vision model (HTTP)  │
//! └─────────────────────┘       └───────────────────────┘
//! ```

pub mod api;
pub mod camera;
pub mod config;
pub mod cook;
pub mod error;
pub mod recipes;
pub mod vision;
pub mod voice;

pub use api::{ApiServer, ApiServerBuilder, ApiState};
pub use camera::{CameraSource, CameraStatus, FacingMode, RemoteCamera, Snapshot, StillCamera};
pub use config::Config;
pub use cook::{AskQuestionTool, CookSession, DebugEntry, DebugKind, StepNavigator};
pub use error::{Error, Result};
pub use recipes::{Recipe, RecipeCatalog, Step, derive_prompt};
pub use vision::{Assessment, VisionAssessor, VisionFeedbackClient};
pub use voice::{ConnectionState, ElevenLabsConnector, VoiceSession};
