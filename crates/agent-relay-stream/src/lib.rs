//! Agent response streaming adapter.
//!
//! Normalizes a remote agent's incremental output into one strictly-ordered
//! sequence of canonical update events, from either of two inbound shapes:
//! a pre-chunked SSE stream (handled by [`transport::StreamClient`]) or the
//! legacy raw-event channel (handled by [`mapper::map_task_event`]).

pub mod mapper;
pub mod sse;
pub mod transport;

pub use mapper::{TurnState, map_task_event};
pub use transport::{
    ChatTransport, OutputShape, SendOptions, StreamClient, THINKING_LEVEL_INVALID,
    ThinkingDirective, UpdateStream,
};
