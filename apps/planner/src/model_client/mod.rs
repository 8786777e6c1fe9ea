/// Model client — the single point of entry for all generative-model calls.
///
/// ARCHITECTURAL RULE: No other module may call the model service directly.
/// Selection and narrative code depend on the `ModelService` trait only, so
/// they can run against a deterministic stub in tests.
///
/// Calls are made once, without retry. Callers that need retries (the corpus
/// builder) wrap them explicitly.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub mod stub;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_GENERATIVE_MODEL: &str = "gemini-1.0-pro";
/// Task type sent with every embedding request.
const EMBEDDING_TASK_TYPE: &str = "CLASSIFICATION";
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Model returned empty content")]
    EmptyContent,

    #[error("Model returned an empty embedding")]
    EmptyEmbedding,
}

impl ModelError {
    /// The transient upstream condition the corpus builder retries on.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ModelError::DeadlineExceeded(_))
    }
}

/// Narrow capability interface over the external model service.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Embeds arbitrary text (classification task type).
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ModelError>;

    /// Generates natural-language text for a composed prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateResponse {
    /// Concatenates the text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    status: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Google Generative Language API client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    embedding_model: String,
    generative_model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        embedding_model: String,
        generative_model: String,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            embedding_model: model_path(&embedding_model),
            generative_model: model_path(&generative_model),
        })
    }

    pub fn generative_model(&self) -> &str {
        &self.generative_model
    }

    async fn post<B, R>(&self, method: &str, model: &str, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{API_BASE_URL}/{model}:{method}");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::DeadlineExceeded(e.to_string())
                } else {
                    ModelError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ModelService for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, ModelError> {
        let request = EmbedRequest {
            model: &self.embedding_model,
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
            task_type: EMBEDDING_TASK_TYPE,
        };

        let response: EmbedResponse = self
            .post("embedContent", &self.embedding_model, &request)
            .await?;

        if response.embedding.values.is_empty() {
            return Err(ModelError::EmptyEmbedding);
        }

        debug!(
            "Embedding call succeeded: dimension={}",
            response.embedding.values.len()
        );
        Ok(response.embedding.values)
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        };

        let response: GenerateResponse = self
            .post("generateContent", &self.generative_model, &request)
            .await?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Generation call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        response.text().ok_or(ModelError::EmptyContent)
    }
}

/// Normalises a model name to the `models/<name>` resource form.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Maps a non-success response to a `ModelError`. HTTP 504 and an API status
/// of `DEADLINE_EXCEEDED` both count as a deadline.
fn classify_error(status: StatusCode, body: &str) -> ModelError {
    let parsed = serde_json::from_str::<ApiError>(body).ok();

    let deadline = status == StatusCode::GATEWAY_TIMEOUT
        || parsed
            .as_ref()
            .is_some_and(|e| e.error.status == "DEADLINE_EXCEEDED");

    let message = parsed
        .map(|e| e.error.message)
        .unwrap_or_else(|| body.to_string());

    if deadline {
        ModelError::DeadlineExceeded(message)
    } else {
        ModelError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_prefixes_bare_names() {
        assert_eq!(model_path("gemini-1.0-pro"), "models/gemini-1.0-pro");
        assert_eq!(model_path("models/embedding-001"), "models/embedding-001");
    }

    #[test]
    fn test_embed_request_shape() {
        let request = EmbedRequest {
            model: "models/embedding-001",
            content: Content {
                role: None,
                parts: vec![Part { text: "Rust" }],
            },
            task_type: EMBEDDING_TASK_TYPE,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "models/embedding-001",
                "content": {"parts": [{"text": "Rust"}]},
                "taskType": "CLASSIFICATION"
            })
        );
    }

    #[test]
    fn test_generate_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [
                    {"content": {"parts": [{"text": "Olá, "}, {"text": "mundo"}], "role": "model"}},
                    {"content": {"parts": [{"text": "ignored"}]}}
                ],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
            }"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Olá, mundo"));
        assert_eq!(response.usage_metadata.unwrap().prompt_token_count, 12);
    }

    #[test]
    fn test_generate_response_without_candidates_has_no_text() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(response.text().is_none());

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(blocked.text().is_none());
    }

    #[test]
    fn test_gateway_timeout_is_deadline() {
        let err = classify_error(StatusCode::GATEWAY_TIMEOUT, "upstream timed out");
        assert!(err.is_deadline_exceeded());
    }

    #[test]
    fn test_deadline_status_in_body_is_deadline() {
        let body = r#"{"error": {"code": 500, "message": "Deadline expired", "status": "DEADLINE_EXCEEDED"}}"#;
        let err = classify_error(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(err.is_deadline_exceeded());
        assert_eq!(err.to_string(), "Deadline exceeded: Deadline expired");
    }

    #[test]
    fn test_other_errors_keep_status_and_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let err = classify_error(StatusCode::BAD_REQUEST, body);
        assert!(!err.is_deadline_exceeded());
        assert!(
            matches!(&err, ModelError::Api { status: 400, message } if message == "API key not valid"),
            "got {err:?}"
        );
    }
}
