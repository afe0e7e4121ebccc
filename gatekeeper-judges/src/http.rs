// gatekeeper-judges/src/http.rs
// ============================================================================
// Module: HTTP Judge Client
// Description: JudgeClient implementation over OpenAI-compatible
//              chat-completion endpoints.
// Purpose: Give the Quorum, Threat Sentinel, and Policy Arbiter stages a
//          single concrete way to call an LLM, bounded in concurrency and
//          wall-clock time per call.
// Dependencies: reqwest::blocking, serde, serde_json, gatekeeper-core
// ============================================================================

//! ## Overview
//! One [`HttpJudgeClient`] instance is constructed per configured endpoint
//! (voters may share an endpoint or use distinct ones; the pipeline crate
//! decides that wiring). Every call is synchronous and bounded by the
//! caller-supplied `timeout_ms`, which is always the shorter of the stage's
//! own deadline and the evaluation's remaining overall deadline (spec §5) —
//! this module has no notion of the overall deadline itself.
//!
//! Concurrency to a single endpoint is bounded by a hand-rolled counting
//! semaphore ([`crate::limiter::ConcurrencyLimiter`]), not a dedicated crate
//! and not `tokio::sync::Semaphore`: the judge-calling path commits to
//! `reqwest::blocking` end to end, so no async runtime is introduced here.

use std::sync::Arc;
use std::time::Duration;

use gatekeeper_core::JudgeClient;
use gatekeeper_core::JudgeError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::limiter::ConcurrencyLimiter;

/// Fixed low temperature; judge calls must be as deterministic as the
/// upstream model allows (spec §4.6, §4.8, §4.9).
const JUDGE_TEMPERATURE: f32 = 0.1;

/// A chat message in the OpenAI-compatible wire format.
#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    /// `"system"` or `"user"`.
    role: &'static str,
    /// The message text.
    content: String,
}

/// Requested response format, forcing a bare JSON object back.
#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    /// Always `"json_object"`.
    #[serde(rename = "type")]
    kind: &'static str,
}

/// A chat-completion request body.
#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    /// Model identifier.
    model: String,
    /// System and user messages, in order.
    messages: Vec<ChatMessage>,
    /// Sampling temperature; fixed at [`JUDGE_TEMPERATURE`].
    temperature: f32,
    /// Upper bound on generated tokens.
    max_tokens: u32,
    /// Forces the response content to be a bare JSON object.
    response_format: ResponseFormat,
}

/// A single returned choice.
#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    /// The choice's message body.
    message: ChatChoiceMessage,
}

/// The message body of a returned choice.
#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    /// Raw content string, expected to parse as a JSON object.
    content: String,
}

/// A chat-completion response body; only the first choice is used.
#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    /// Returned choices; the first is used, the rest are ignored.
    choices: Vec<ChatChoice>,
}

/// An HTTP-backed [`JudgeClient`] talking to an OpenAI-compatible
/// chat-completions endpoint.
pub struct HttpJudgeClient {
    /// Underlying blocking HTTP client. `reqwest::blocking::Client` is
    /// itself cheap to clone and safe to share across threads.
    client: reqwest::blocking::Client,
    /// Full URL of the `chat/completions` endpoint.
    endpoint: String,
    /// Model identifier sent with every request.
    model: String,
    /// Optional bearer token for authenticating to the endpoint.
    api_key: Option<String>,
    /// Upper bound on generated tokens per call.
    max_tokens: u32,
    /// Bounds concurrent in-flight requests to this endpoint.
    limiter: Arc<ConcurrencyLimiter>,
}

impl HttpJudgeClient {
    /// Builds a client for the given endpoint.
    ///
    /// `max_inflight` bounds concurrent requests to this endpoint across all
    /// callers sharing this instance (spec §5, resource model).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>, max_tokens: u32, max_inflight: usize) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            max_tokens,
            limiter: Arc::new(ConcurrencyLimiter::new(max_inflight)),
        }
    }
}

impl JudgeClient for HttpJudgeClient {
    fn send(&self, system_prompt: &str, user_prompt: &str, timeout_ms: u64) -> Result<Value, JudgeError> {
        let _permit = self.limiter.acquire();

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_owned(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_owned(),
                },
            ],
            temperature: JUDGE_TEMPERATURE,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(Duration::from_millis(timeout_ms))
            .json(&body);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().map_err(|err| {
            if err.is_timeout() {
                JudgeError::Timeout
            } else {
                JudgeError::Request(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(JudgeError::Request(format!("endpoint returned status {status}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|err| JudgeError::MalformedResponse(err.to_string()))?;

        let content = parsed
            .choices
            .first()
            .ok_or_else(|| JudgeError::MalformedResponse("no choices in response".to_owned()))?
            .message
            .content
            .clone();

        let value: Value = serde_json::from_str(&content).map_err(|err| JudgeError::MalformedResponse(err.to_string()))?;

        if value.is_object() {
            Ok(value)
        } else {
            Err(JudgeError::MalformedResponse("judge response content was not a json object".to_owned()))
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only setup and panic-based assertions are permitted."
)]
mod tests {
    use std::thread;

    use serde_json::json;
    use tiny_http::Response;
    use tiny_http::Server;

    use gatekeeper_core::JudgeClient as _;

    use super::HttpJudgeClient;

    /// Spawns a local test server bound to an ephemeral port.
    fn spawn_server() -> (Server, String) {
        let server = Server::http("127.0.0.1:0").expect("server binds");
        let addr = server.server_addr().to_ip().expect("ip socket address");
        let url = format!("http://{addr}/v1/chat/completions");
        (server, url)
    }

    #[test]
    fn parses_json_object_content_from_first_choice() {
        let (server, url) = spawn_server();
        let handle = thread::spawn(move || {
            let request = server.recv().expect("receives request");
            let payload = json!({
                "choices": [
                    { "message": { "content": "{\"verdict\":\"allow\"}" } }
                ]
            });
            request
                .respond(Response::from_string(payload.to_string()))
                .expect("responds");
        });

        let client = HttpJudgeClient::new(url, "test-model", None, 256, 4);
        let result = client.send("system", "user", 5_000).expect("send succeeds");
        assert_eq!(result["verdict"], "allow");

        handle.join().expect("server thread completes");
    }

    #[test]
    fn rejects_non_object_content() {
        let (server, url) = spawn_server();
        let handle = thread::spawn(move || {
            let request = server.recv().expect("receives request");
            let payload = json!({
                "choices": [
                    { "message": { "content": "\"just a string\"" } }
                ]
            });
            request
                .respond(Response::from_string(payload.to_string()))
                .expect("responds");
        });

        let client = HttpJudgeClient::new(url, "test-model", None, 256, 4);
        let result = client.send("system", "user", 5_000);
        assert!(result.is_err());

        handle.join().expect("server thread completes");
    }
}
