//! Shared vocabulary for the agent-relay streaming adapter: canonical update
//! events, raw task events, the conversation message model, errors, and
//! client configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod message;

pub use error::{RelayError, Result};
pub use events::{TaskEvent, UpdateEvent};
pub use message::{ChatMessage, MessagePart, Role, WireMessage};
