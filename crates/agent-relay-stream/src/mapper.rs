//! Raw-event chunk mapper.
//!
//! The legacy inbound channel emits coarse [`TaskEvent`]s. This module
//! translates them, one at a time, into canonical [`UpdateEvent`]s while
//! tracking the open/close lifecycle of the turn's two segments (narrative
//! text and reasoning) in a caller-owned [`TurnState`].

use agent_relay_core::{TaskEvent, UpdateEvent};

/// Per-turn segment bookkeeping. One instance per assistant turn, owned by
/// the call site driving that turn, discarded when the turn completes.
///
/// The `*_ended` flags are one-way: once a segment closes, no later event
/// reopens it.
#[derive(Debug, Clone)]
pub struct TurnState {
    pub message_id: String,
    pub reasoning_id: String,
    pub text_started: bool,
    pub text_ended: bool,
    pub reasoning_started: bool,
    pub reasoning_ended: bool,
}

impl TurnState {
    pub fn new(message_id: impl Into<String>) -> Self {
        let message_id = message_id.into();
        let reasoning_id = format!("{message_id}-reasoning");
        Self {
            message_id,
            reasoning_id,
            text_started: false,
            text_ended: false,
            reasoning_started: false,
            reasoning_ended: false,
        }
    }

    /// Mint a fresh turn with a generated message id.
    pub fn generate() -> Self {
        Self::new(format!("msg_{}", uuid::Uuid::new_v4()))
    }

    /// `text-start` if the text segment has never been opened this turn.
    fn ensure_text(&mut self) -> Option<UpdateEvent> {
        if self.text_started || self.text_ended {
            return None;
        }
        self.text_started = true;
        Some(UpdateEvent::TextStart {
            id: self.message_id.clone(),
        })
    }

    /// `reasoning-start` if the reasoning segment has never been opened.
    fn ensure_reasoning(&mut self) -> Option<UpdateEvent> {
        if self.reasoning_started || self.reasoning_ended {
            return None;
        }
        self.reasoning_started = true;
        Some(UpdateEvent::ReasoningStart {
            id: self.reasoning_id.clone(),
        })
    }

    /// `reasoning-end` if the reasoning segment is open and not yet closed.
    fn close_reasoning(&mut self) -> Option<UpdateEvent> {
        if !self.reasoning_started || self.reasoning_ended {
            return None;
        }
        self.reasoning_ended = true;
        Some(UpdateEvent::ReasoningEnd {
            id: self.reasoning_id.clone(),
        })
    }

    /// `text-end` if the text segment is open and not yet closed.
    fn close_text(&mut self) -> Option<UpdateEvent> {
        if !self.text_started || self.text_ended {
            return None;
        }
        self.text_ended = true;
        Some(UpdateEvent::TextEnd {
            id: self.message_id.clone(),
        })
    }
}

/// `"Progress: {message} · Step {step}/{totalSteps}"`, with the step clause
/// dropped when `step` is absent and the `/{totalSteps}` suffix dropped when
/// `total_steps` is absent.
fn format_progress(message: &str, step: Option<u32>, total_steps: Option<u32>) -> String {
    let message = message.trim();
    if message.is_empty() && step.is_none() {
        return String::new();
    }
    let mut line = format!("Progress: {message}");
    if let Some(step) = step {
        line.push_str(&format!(" · Step {step}"));
        if let Some(total) = total_steps {
            line.push_str(&format!("/{total}"));
        }
    }
    line
}

/// Render a `complete` payload for display: strings pass through, anything
/// else pretty-prints, with plain coercion as the fallback.
fn display_payload(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Translate one raw task event into zero or more canonical update events,
/// advancing the turn's segment state. Never panics; unrecognized events
/// map to nothing.
pub fn map_task_event(event: &TaskEvent, state: &mut TurnState) -> Vec<UpdateEvent> {
    let mut out = Vec::new();

    match event {
        TaskEvent::Thinking { content } => {
            let content = content.trim();
            if content.is_empty() {
                return out;
            }
            out.extend(state.ensure_reasoning());
            out.push(UpdateEvent::ReasoningDelta {
                id: state.reasoning_id.clone(),
                delta: content.to_string(),
            });
        }

        TaskEvent::Progress {
            message,
            step,
            total_steps,
        } => {
            let mut line = format_progress(message, *step, *total_steps);
            if line.is_empty() {
                return out;
            }
            if !line.ends_with('\n') {
                line.push('\n');
            }
            out.extend(state.ensure_reasoning());
            out.push(UpdateEvent::ReasoningDelta {
                id: state.reasoning_id.clone(),
                delta: line,
            });
        }

        TaskEvent::ToolCall { call_id, tool, args } => {
            out.extend(state.ensure_text());
            out.push(UpdateEvent::ToolInputAvailable {
                tool_call_id: call_id.clone(),
                tool_name: tool.clone(),
                input: args.clone(),
            });
        }

        TaskEvent::ToolResult {
            call_id,
            result,
            error,
            ..
        } => {
            out.extend(state.ensure_text());
            out.push(match error {
                Some(error) => UpdateEvent::ToolOutputError {
                    tool_call_id: call_id.clone(),
                    error_text: error.clone(),
                },
                None => UpdateEvent::ToolOutputAvailable {
                    tool_call_id: call_id.clone(),
                    output: result.clone(),
                },
            });
        }

        TaskEvent::Complete { data, .. } => {
            // Reasoning always closes before the text segment is touched.
            out.extend(state.close_reasoning());
            out.extend(state.ensure_text());
            let payload = display_payload(data);
            if !payload.is_empty() {
                out.push(UpdateEvent::TextDelta {
                    id: state.message_id.clone(),
                    delta: payload,
                });
            }
            out.extend(state.close_text());
        }

        TaskEvent::Failed { error } => {
            out.extend(state.close_reasoning());
            out.extend(state.ensure_text());
            out.push(UpdateEvent::TextDelta {
                id: state.message_id.clone(),
                delta: format!("Error: {error}"),
            });
            out.extend(state.close_text());
            out.push(UpdateEvent::Error {
                error_text: error.clone(),
            });
        }

        TaskEvent::Unknown => {}
    }

    out
}
