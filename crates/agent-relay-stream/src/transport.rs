//! Streaming transport for the remote agent-execution service.
//!
//! Owns the network exchange: builds the run request, classifies the
//! response, performs the single thinking-downgrade retry, decodes the SSE
//! body lazily into [`UpdateEvent`]s, and propagates cancellation to the
//! remote side via the task DELETE side-channel.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use agent_relay_core::config::RelayConfig;
use agent_relay_core::message::latest_user_text;
use agent_relay_core::{ChatMessage, RelayError, Result, UpdateEvent, WireMessage};

use crate::sse::data_frames;

/// The only rejection code eligible for an automatic retry.
pub const THINKING_LEVEL_INVALID: &str = "THINKING_LEVEL_INVALID";

/// In-band notice for a frame that failed to parse. A malformed frame is
/// fatal to the turn, not skipped.
const MALFORMED_FRAME_TEXT: &str = "Received an unreadable update from the agent stream";

/// Desired output shape of the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputShape {
    #[default]
    Text,
    JsonSchema { schema: serde_json::Value },
}

/// Thinking directive sent with the run. `Level` may be rejected by the
/// remote side, in which case the transport downgrades to `Off` and retries
/// once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThinkingDirective {
    Off,
    Level { level: String },
}

/// Mutable per-send options. The thinking directive is overwritten in place
/// when the downgrade retry fires, so the caller observes what was actually
/// sent.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub output: OutputShape,
    pub max_credits: Option<f64>,
    pub thinking: Option<ThinkingDirective>,
}

/// Wire body of a streaming run request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest<'a> {
    api_key_id: &'a str,
    messages: &'a [WireMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    output: &'a OutputShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_credits: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<&'a ThinkingDirective>,
}

/// Structured rejection body. Non-JSON bodies fall back to the raw text as
/// `detail`.
#[derive(Debug, Clone, Deserialize)]
struct ProblemDetail {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    code: String,
    #[serde(default)]
    detail: String,
}

async fn read_problem(response: reqwest::Response) -> ProblemDetail {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ProblemDetail>(&body) {
        Ok(mut problem) => {
            if problem.status == 0 {
                problem.status = status;
            }
            problem
        }
        Err(_) => ProblemDetail {
            status,
            code: String::new(),
            detail: body,
        },
    }
}

/// A cancellable, pull-based sequence of canonical update events. Failures
/// after streaming begins arrive in-band as [`UpdateEvent::Error`].
pub type UpdateStream = Pin<Box<dyn Stream<Item = UpdateEvent> + Send>>;

/// Handler invoked when the thinking directive is downgraded; receives the
/// model id the run was issued with.
pub type DowngradeHandler = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// The inbound contract consumed by the rendering layer.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open one streaming turn. Raises `AuthenticationMissing`,
    /// `EmptyPrompt`, `RequestRejected`, or `EmptyResponseBody`; once a
    /// stream is returned it terminates exactly once, by `finish`, an
    /// in-band `error`, or cancellation.
    async fn send_messages(
        &self,
        messages: &[ChatMessage],
        options: &mut SendOptions,
        cancel: CancellationToken,
    ) -> Result<UpdateStream>;

    /// Resume a previous turn. Turns are not resumable across restarts, so
    /// this always declines.
    async fn reconnect_to_stream(&self, task_id: &str) -> Result<Option<UpdateStream>>;
}

/// HTTP client for the remote agent-execution service.
pub struct StreamClient {
    config: RelayConfig,
    http: reqwest::Client,
    on_thinking_downgrade: Option<DowngradeHandler>,
}

impl StreamClient {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            on_thinking_downgrade: None,
        }
    }

    /// Install a notification hook for the thinking-downgrade retry.
    pub fn with_downgrade_handler(
        mut self,
        handler: impl Fn(Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.on_thinking_downgrade = Some(Arc::new(handler));
        self
    }

    /// Best-effort remote task cancellation.
    pub async fn cancel_task(&self, task_id: &str, api_key: &str) -> Result<()> {
        self.http
            .delete(self.config.task_url(task_id))
            .query(&[("apiKeyId", self.config.api_key_id.as_str())])
            .header("authorization", format!("Bearer {api_key}"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn attempt(&self, api_key: &str, body: &RunRequest<'_>) -> Result<reqwest::Response> {
        trace!(url = %self.config.run_url(), "Issuing streaming run request");
        let response = self
            .http
            .post(self.config.run_url())
            .header("authorization", format!("Bearer {api_key}"))
            .header("accept", "text/event-stream")
            .json(body)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for StreamClient {
    async fn send_messages(
        &self,
        messages: &[ChatMessage],
        options: &mut SendOptions,
        cancel: CancellationToken,
    ) -> Result<UpdateStream> {
        // Preconditions fail before any network cost is paid.
        let api_key = match options.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(RelayError::AuthenticationMissing),
        };
        if latest_user_text(messages).is_none() {
            return Err(RelayError::EmptyPrompt);
        }

        let wire_messages: Vec<WireMessage> = messages.iter().map(WireMessage::from).collect();

        debug!(model = ?options.model, "Starting streaming turn");
        let first = {
            let body = RunRequest {
                api_key_id: &self.config.api_key_id,
                messages: &wire_messages,
                model: options.model.as_deref(),
                output: &options.output,
                max_credits: options.max_credits,
                thinking: options.thinking.as_ref(),
            };
            self.attempt(&api_key, &body).await?
        };

        let response = if first.status().is_success() {
            first
        } else {
            // The first attempt's body is fully consumed here, before any
            // retry is issued.
            let problem = read_problem(first).await;
            let downgradable = problem.code == THINKING_LEVEL_INVALID
                && matches!(options.thinking, Some(ThinkingDirective::Level { .. }));
            if !downgradable {
                return Err(RelayError::RequestRejected {
                    status: problem.status,
                    code: problem.code,
                    detail: problem.detail,
                });
            }

            // One retry, with the thinking directive forced off. Never more.
            debug!(model = ?options.model, "Thinking level rejected; retrying with thinking off");
            options.thinking = Some(ThinkingDirective::Off);
            if let Some(handler) = &self.on_thinking_downgrade {
                handler(options.model.as_deref());
            }

            let retry = {
                let body = RunRequest {
                    api_key_id: &self.config.api_key_id,
                    messages: &wire_messages,
                    model: options.model.as_deref(),
                    output: &options.output,
                    max_credits: options.max_credits,
                    thinking: options.thinking.as_ref(),
                };
                self.attempt(&api_key, &body).await?
            };
            if !retry.status().is_success() {
                let problem = read_problem(retry).await;
                return Err(RelayError::RequestRejected {
                    status: problem.status,
                    code: problem.code,
                    detail: problem.detail,
                });
            }
            retry
        };

        if response.content_length() == Some(0) {
            return Err(RelayError::EmptyResponseBody);
        }

        let state = DecodeState {
            frames: Box::pin(data_frames(response)),
            cancel,
            canceller: TaskCanceller {
                http: self.http.clone(),
                config: self.config.clone(),
                api_key,
            },
            task_id: None,
            done: false,
        };
        Ok(Box::pin(futures::stream::unfold(state, advance).fuse()))
    }

    async fn reconnect_to_stream(&self, task_id: &str) -> Result<Option<UpdateStream>> {
        trace!(task_id, "Stream resumption requested; turns are not resumable");
        Ok(None)
    }
}

/// Everything the abort path needs to issue the remote DELETE.
struct TaskCanceller {
    http: reqwest::Client,
    config: RelayConfig,
    api_key: String,
}

impl TaskCanceller {
    /// Fire-and-forget semantics: a failed remote cancel never masks the
    /// abort outcome.
    async fn fire(&self, task_id: &str) {
        let result = self
            .http
            .delete(self.config.task_url(task_id))
            .query(&[("apiKeyId", self.config.api_key_id.as_str())])
            .header("authorization", format!("Bearer {}", self.api_key))
            .send()
            .await;
        match result {
            Ok(response) => {
                debug!(task_id, status = %response.status(), "Remote task cancel issued")
            }
            Err(e) => debug!(task_id, %e, "Remote task cancel failed (ignored)"),
        }
    }
}

struct DecodeState {
    frames: Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>,
    cancel: CancellationToken,
    canceller: TaskCanceller,
    task_id: Option<String>,
    done: bool,
}

impl DecodeState {
    /// Drop the response reader. Replacing the stream closes the underlying
    /// connection immediately rather than waiting for the state to unwind.
    fn release_reader(&mut self) {
        self.done = true;
        self.frames = Box::pin(futures::stream::empty());
    }
}

/// One pull of the output sequence. The cancel branch is biased so an abort
/// takes effect before the next frame is yielded.
async fn advance(mut state: DecodeState) -> Option<(UpdateEvent, DecodeState)> {
    if state.done {
        return None;
    }
    tokio::select! {
        biased;

        _ = state.cancel.cancelled() => {
            state.release_reader();
            if let Some(task_id) = state.task_id.take() {
                state.canceller.fire(&task_id).await;
            }
            None
        }

        frame = state.frames.next() => match frame {
            Some(Ok(payload)) => match serde_json::from_str::<UpdateEvent>(&payload) {
                Ok(event) => {
                    if let UpdateEvent::Start { message_id } = &event {
                        // Only the first start names the remote task.
                        if state.task_id.is_none() {
                            state.task_id = Some(message_id.clone());
                        }
                    }
                    if matches!(event, UpdateEvent::Finish { .. }) {
                        state.release_reader();
                    }
                    Some((event, state))
                }
                Err(e) => {
                    warn!(%e, "Dropping turn on malformed stream frame");
                    state.release_reader();
                    Some((
                        UpdateEvent::Error {
                            error_text: MALFORMED_FRAME_TEXT.into(),
                        },
                        state,
                    ))
                }
            },
            Some(Err(e)) => {
                warn!(%e, "Stream read failed mid-turn");
                state.release_reader();
                Some((
                    UpdateEvent::Error {
                        error_text: e.to_string(),
                    },
                    state,
                ))
            }
            None => {
                state.done = true;
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_request_wire_shape() {
        let messages = vec![WireMessage {
            role: agent_relay_core::Role::User,
            content: "Hello".into(),
        }];
        let body = RunRequest {
            api_key_id: "key_1",
            messages: &messages,
            model: Some("agent-large"),
            output: &OutputShape::Text,
            max_credits: Some(50.0),
            thinking: Some(&ThinkingDirective::Level { level: "high".into() }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["apiKeyId"], "key_1");
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "Hello"}));
        assert_eq!(value["model"], "agent-large");
        assert_eq!(value["output"], json!({"type": "text"}));
        assert_eq!(value["maxCredits"], 50.0);
        assert_eq!(value["thinking"], json!({"mode": "level", "level": "high"}));
    }

    #[test]
    fn test_run_request_omits_absent_fields() {
        let body = RunRequest {
            api_key_id: "key_1",
            messages: &[],
            model: None,
            output: &OutputShape::JsonSchema { schema: json!({"type": "object"}) },
            max_credits: None,
            thinking: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("model").is_none());
        assert!(value.get("maxCredits").is_none());
        assert!(value.get("thinking").is_none());
        assert_eq!(
            value["output"],
            json!({"type": "json_schema", "schema": {"type": "object"}})
        );
    }

    #[test]
    fn test_problem_detail_lenient_parse() {
        let problem: ProblemDetail =
            serde_json::from_str(r#"{"status":400,"code":"VALIDATION_ERROR","detail":"bad"}"#)
                .unwrap();
        assert_eq!(problem.status, 400);
        assert_eq!(problem.code, "VALIDATION_ERROR");
        assert_eq!(problem.detail, "bad");

        let problem: ProblemDetail = serde_json::from_str(r#"{"detail":"partial"}"#).unwrap();
        assert_eq!(problem.status, 0);
        assert!(problem.code.is_empty());
    }

    #[test]
    fn test_thinking_directive_wire_shape() {
        assert_eq!(
            serde_json::to_value(ThinkingDirective::Off).unwrap(),
            json!({"mode": "off"})
        );
        assert_eq!(
            serde_json::to_value(ThinkingDirective::Level { level: "medium".into() }).unwrap(),
            json!({"mode": "level", "level": "medium"})
        );
    }
}
