//! OpenAI Responses API client used as the rewrite backend.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::BackendError;
use crate::utils::truncate_chars;

/// Maximum number of characters of a response body kept in errors and logs.
const BODY_SNIPPET_CHARS: usize = 4000;

const SMOKE_TEST_INSTRUCTIONS: &str = "Respond with the single word OK.";

/// Text transformation backend.
#[async_trait]
pub trait BackendTransform: Send + Sync {
    /// Transforms `input` following the preset `instructions`.
    async fn transform(
        &self,
        credential: &str,
        instructions: &str,
        input: &str,
    ) -> Result<String, BackendError>;
}

/// Wraps preset instructions in the fixed rewrite contract.
pub fn rewrite_instructions(preset_instructions: &str) -> String {
    format!(
        "You rewrite user-provided text.\n\n\
         Follow these preset instructions:\n\
         {preset_instructions}\n\n\
         Constraints:\n\
         - preserve the original meaning\n\
         - do not add new facts\n\
         - return only the rewritten text (no markdown, no surrounding quotes)"
    )
}

#[derive(Serialize)]
struct CreateResponseRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: [InputMessage<'a>; 1],
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CreateResponseResponse {
    output_text: Option<String>,
    output: Option<Vec<OutputItem>>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: Option<String>,
    role: Option<String>,
    content: Option<Vec<ContentPart>>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

impl CreateResponseResponse {
    /// `output_text` when present, else the text parts of assistant messages.
    fn text(self) -> Option<String> {
        if let Some(text) = self.output_text.filter(|t| !t.trim().is_empty()) {
            return Some(text);
        }

        let joined: String = self
            .output
            .unwrap_or_default()
            .into_iter()
            .filter(|item| item.kind.as_deref() == Some("message"))
            .filter(|item| item.role.as_deref() == Some("assistant"))
            .flat_map(|item| item.content.unwrap_or_default())
            .filter(|part| part.kind.as_deref() == Some("output_text"))
            .filter_map(|part| part.text)
            .collect();

        (!joined.trim().is_empty()).then_some(joined)
    }
}

pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Sends a trivial request to validate the key and connectivity.
    pub async fn smoke_test(&self, credential: &str) -> Result<String, BackendError> {
        self.create_response(credential, SMOKE_TEST_INSTRUCTIONS, "OK")
            .await
    }

    async fn create_response(
        &self,
        credential: &str,
        instructions: &str,
        input: &str,
    ) -> Result<String, BackendError> {
        let body = CreateResponseRequest {
            model: &self.model,
            instructions,
            input: [InputMessage {
                role: "user",
                content: input,
            }],
        };

        debug!(model = %self.model, input_len = input.chars().count(), "Sending response request");

        let response = self
            .http_client
            .post(format!("{}/v1/responses", self.base_url))
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let raw = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let snippet = truncate_chars(&raw, BODY_SNIPPET_CHARS).to_string();

        info!(
            status = status.as_u16(),
            request_id = request_id.as_deref().unwrap_or("-"),
            body_len = raw.len(),
            "Backend responded"
        );

        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: snippet,
            });
        }

        serde_json::from_str::<CreateResponseResponse>(&raw)
            .ok()
            .and_then(CreateResponseResponse::text)
            .ok_or(BackendError::UnparseableResponse { snippet })
    }
}

#[async_trait]
impl BackendTransform for OpenAiClient {
    async fn transform(
        &self,
        credential: &str,
        instructions: &str,
        input: &str,
    ) -> Result<String, BackendError> {
        let instructions = rewrite_instructions(instructions);
        self.create_response(credential, &instructions, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> OpenAiClient {
        OpenAiClient::new(&server.url(), "gpt-5.2", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_transform_sends_wrapped_instructions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/responses")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-5.2",
                "instructions": rewrite_instructions("uppercase"),
                "input": [{"role": "user", "content": "hello"}],
            })))
            .with_status(200)
            .with_header("x-request-id", "req_123")
            .with_body(json!({"output_text": "HELLO"}).to_string())
            .create_async()
            .await;

        let text = client(&server)
            .transform("sk-test", "uppercase", "hello")
            .await
            .unwrap();

        assert_eq!(text, "HELLO");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_falls_back_to_assistant_message_parts() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "output_text": "  ",
            "output": [
                {"type": "reasoning", "content": [{"type": "output_text", "text": "nope"}]},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "HEL"},
                    {"type": "refusal", "text": "ignored"},
                    {"type": "output_text", "text": "LO"}
                ]}
            ]
        });
        server
            .mock("POST", "/v1/responses")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let text = client(&server).transform("k", "x", "hello").await.unwrap();

        assert_eq!(text, "HELLO");
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/responses")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let err = client(&server).transform("bad", "x", "hello").await.unwrap_err();

        assert_eq!(
            err,
            BackendError::Http {
                status: 401,
                body: r#"{"error":{"message":"Incorrect API key provided"}}"#.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_error_body_is_truncated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/responses")
            .with_status(500)
            .with_body("x".repeat(10_000))
            .create_async()
            .await;

        let err = client(&server).transform("k", "x", "hello").await.unwrap_err();

        match err {
            BackendError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), BODY_SNIPPET_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_response_without_text_is_unparseable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/responses")
            .with_status(200)
            .with_body(r#"{"output": []}"#)
            .create_async()
            .await;

        let err = client(&server).transform("k", "x", "hello").await.unwrap_err();

        assert_eq!(
            err,
            BackendError::UnparseableResponse {
                snippet: r#"{"output": []}"#.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_smoke_test_uses_plain_instructions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/responses")
            .match_body(Matcher::PartialJson(json!({
                "instructions": "Respond with the single word OK.",
                "input": [{"role": "user", "content": "OK"}],
            })))
            .with_status(200)
            .with_body(json!({"output_text": "OK"}).to_string())
            .create_async()
            .await;

        assert_eq!(client(&server).smoke_test("k").await.unwrap(), "OK");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let client =
            OpenAiClient::new("http://127.0.0.1:1", "gpt-5.2", Duration::from_secs(2)).unwrap();
        let err = client.transform("k", "x", "hello").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
