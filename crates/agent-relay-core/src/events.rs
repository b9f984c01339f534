//! Wire vocabularies for the streaming adapter.
//!
//! [`UpdateEvent`] is the canonical outbound shape: the only thing the
//! rendering layer consumes, whether events arrive pre-chunked over SSE or
//! are produced by the raw-event mapper. [`TaskEvent`] is the coarser shape
//! emitted by the legacy inbound channel.
//!
//! Field names on both enums are part of the wire contract and must not be
//! renamed.

use serde::{Deserialize, Serialize};

/// A canonical update event, as streamed to the rendering layer.
///
/// Ordering invariant: for any `id`, a `-delta` or `-end` event never
/// precedes its `-start`; at most one `-end` is emitted per `-start`; a
/// closed segment is never reopened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateEvent {
    /// First event of a turn. `message_id` doubles as the remote task id
    /// used for best-effort cancellation.
    #[serde(rename = "start")]
    Start {
        #[serde(rename = "messageId")]
        message_id: String,
    },

    #[serde(rename = "text-start")]
    TextStart { id: String },

    #[serde(rename = "text-delta")]
    TextDelta { id: String, delta: String },

    #[serde(rename = "text-end")]
    TextEnd { id: String },

    #[serde(rename = "reasoning-start")]
    ReasoningStart { id: String },

    #[serde(rename = "reasoning-delta")]
    ReasoningDelta { id: String, delta: String },

    #[serde(rename = "reasoning-end")]
    ReasoningEnd { id: String },

    #[serde(rename = "tool-input-available")]
    ToolInputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool-output-available")]
    ToolOutputAvailable {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        output: serde_json::Value,
    },

    #[serde(rename = "tool-output-error")]
    ToolOutputError {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "errorText")]
        error_text: String,
    },

    /// Terminal event of a successful turn.
    #[serde(rename = "finish")]
    Finish {
        #[serde(rename = "finishReason")]
        finish_reason: String,
    },

    /// In-band failure notice. Terminal when produced by the transport.
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "errorText")]
        error_text: String,
    },
}

impl UpdateEvent {
    /// Segment id for `-start`/`-delta`/`-end` events, `None` otherwise.
    pub fn segment_id(&self) -> Option<&str> {
        match self {
            UpdateEvent::TextStart { id }
            | UpdateEvent::TextDelta { id, .. }
            | UpdateEvent::TextEnd { id }
            | UpdateEvent::ReasoningStart { id }
            | UpdateEvent::ReasoningDelta { id, .. }
            | UpdateEvent::ReasoningEnd { id } => Some(id),
            _ => None,
        }
    }
}

/// A raw domain event from the legacy channel, consumed exactly once by the
/// chunk mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    #[serde(rename = "thinking")]
    Thinking { content: String },

    #[serde(rename = "progress")]
    Progress {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
        #[serde(rename = "totalSteps", skip_serializing_if = "Option::is_none")]
        total_steps: Option<u32>,
    },

    #[serde(rename = "tool_call")]
    ToolCall {
        #[serde(rename = "callId")]
        call_id: String,
        tool: String,
        args: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(rename = "callId")]
        call_id: String,
        tool: String,
        result: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "complete")]
    Complete {
        data: serde_json::Value,
        #[serde(rename = "creditsUsed", default, skip_serializing_if = "Option::is_none")]
        credits_used: Option<f64>,
    },

    #[serde(rename = "failed")]
    Failed { error: String },

    /// Event kinds this build does not know about. The mapper emits nothing
    /// for them, so wire evolution never breaks a turn.
    #[serde(other)]
    Unknown,
}
