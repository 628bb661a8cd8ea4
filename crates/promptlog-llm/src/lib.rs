//! Provider-agnostic execution adapter for recorded LLM calls.
//!
//! Wraps a provider client behind a closed set of client shapes, runs
//! rendered prompts against it with an optional deadline, and records the
//! full call lifecycle through `promptlog-core`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod executor;
pub mod mock;
pub mod rendered;

pub use client::{
    ChatClient, ChatMessage, ChatOptions, ChatReply, ClientHandle, NormalizedResponse,
    StructuredClient,
};
pub use error::{Error, Result};
pub use executor::{
    default_model, user_message, ExecuteOptions, ExecutionAdapter, ExecutionOutcome,
    ExecutorConfig,
};
pub use rendered::RenderedPrompt;
