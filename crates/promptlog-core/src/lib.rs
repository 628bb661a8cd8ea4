//! Observability and cost accounting for LLM prompt usage.
//!
//! Records every prompt render as an append-only [`types::Usage`] row,
//! tracks the lifecycle of the resulting provider call in a
//! [`types::Execution`] record (pending → success | error | timeout),
//! prices completed calls against time-versioned cost configs, and serves
//! aggregated statistics through [`analytics::Analytics`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analytics;
pub mod error;
pub mod pricing;
pub mod recorder;
pub mod store;
pub mod types;

pub use analytics::{Analytics, CostGroupBy, ErrorAnalysis, PromptPerformance, UsageStats};
pub use error::{Error, Result};
pub use recorder::{Recorder, RenderEvent, TrackingOptions};
pub use store::UsageStore;
pub use types::{
    CompletionUpdate, CostConfig, DateRange, Execution, ExecutionStatus, Message, MessageRole,
    Usage,
};
