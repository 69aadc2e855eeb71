//! Vision feedback client
//!
//! Sends one camera frame, the user's question and the current step to a
//! Gemini model and asks it to answer through the `submit_feedback`
//! function, which yields the spoken reply plus a pass/fail verdict for the
//! step.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::VisionConfig;
use crate::{Error, Result};

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Name of the structured result function
pub const FEEDBACK_FUNCTION: &str = "submit_feedback";

/// Reply used when the model returns nothing usable
pub const FALLBACK_FEEDBACK: &str = "Looks good, keep going!";

/// Result of one visual assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// One or two spoken sentences
    pub feedback: String,
    /// The user asked whether the step is done and the frame shows it is
    pub passed: bool,
}

/// Judges a camera frame against the current step
#[async_trait]
pub trait VisionAssessor: Send + Sync {
    /// Assess a base64 JPEG frame
    ///
    /// # Errors
    ///
    /// Returns error if the assessor is not configured or the remote call fails
    async fn assess(
        &self,
        image_base64: &str,
        question: &str,
        step_context: &str,
    ) -> Result<Assessment>;

    /// Whether assessments can succeed at all
    fn is_available(&self) -> bool {
        true
    }
}

/// Gemini `generateContent` client
pub struct VisionFeedbackClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl VisionFeedbackClient {
    /// Create a client; a missing key only fails at call time
    #[must_use]
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn from_config(config: &VisionConfig) -> Self {
        Self::new(config.api_key.clone())
            .with_model(config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.timeout)
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a credential is present
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl VisionAssessor for VisionFeedbackClient {
    fn is_available(&self) -> bool {
        self.is_configured()
    }

    async fn assess(
        &self,
        image_base64: &str,
        question: &str,
        step_context: &str,
    ) -> Result<Assessment> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            Error::Config("vision API key not configured (set GEMINI_API_KEY)".to_string())
        })?;

        let system = system_instruction(step_context);
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text { text: &system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: image_base64,
                        },
                    },
                    Part::Text { text: question },
                ],
            }],
            tools: vec![Tool {
                function_declarations: vec![feedback_declaration()],
            }],
            tool_config: ToolConfig {
                function_calling_config: FunctionCallingConfig { mode: "AUTO" },
            },
        };

        tracing::debug!(model = %self.model, question, "sending vision request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose_secret())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("API error {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("failed to parse response: {e}")))?;

        let assessment = extract_assessment(&body);
        tracing::debug!(
            passed = assessment.passed,
            feedback = %assessment.feedback,
            "vision assessment"
        );

        Ok(assessment)
    }
}

/// System instruction binding the model to the current step
#[must_use]
pub fn system_instruction(step_context: &str) -> String {
    format!(
        "You are a friendly cooking coach watching the user's kitchen through their camera. \
         The user is on this recipe step: \"{step_context}\". \
         Look at the photo and answer the user's question about this step in one or two short \
         sentences that sound natural when spoken aloud. \
         If the question has nothing to do with the step or the cooking in front of you, \
         politely decline and steer back to the step. \
         Always answer by calling {FEEDBACK_FUNCTION}."
    )
}

fn feedback_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: FEEDBACK_FUNCTION,
        description: "Give spoken feedback on the user's progress for the current step.",
        parameters: json!({
            "type": "object",
            "properties": {
                "feedback": {
                    "type": "string",
                    "description": "One or two sentences of spoken feedback for the user."
                },
                "passed": {
                    "type": "boolean",
                    "description": "True only if the user asked whether the step is complete or good enough \
                                    AND the photo shows it is. Any negative assessment must be false."
                }
            },
            "required": ["feedback", "passed"]
        }),
    }
}

/// Pull an [`Assessment`] out of a `generateContent` response body
///
/// Prefers a `submit_feedback` call in the first candidate; otherwise the
/// candidate's text becomes the feedback with `passed = false`. Missing or
/// mistyped fields fall back to defaults.
#[must_use]
pub fn extract_assessment(body: &Value) -> Assessment {
    let response = GenerateResponse::deserialize(body).unwrap_or_default();
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let call = parts.iter().find_map(|part| {
        part.function_call
            .as_ref()
            .filter(|call| call.name == FEEDBACK_FUNCTION)
    });

    if let Some(call) = call {
        let feedback = call
            .args
            .get("feedback")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_FEEDBACK)
            .to_string();
        let passed = call
            .args
            .get("passed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        return Assessment { feedback, passed };
    }

    let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    let text = text.trim();

    Assessment {
        feedback: if text.is_empty() {
            FALLBACK_FEEDBACK.to_string()
        } else {
            text.to_string()
        },
        passed: false,
    }
}

// Request types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    tools: Vec<Tool>,
    tool_config: ToolConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Serialize)]
struct FunctionCallingConfig {
    mode: &'static str,
}

// Response types

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}
