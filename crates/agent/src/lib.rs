//! Language-model side of leadbridge.
//!
//! - `llm`: the completion client trait, the Anthropic implementation and fakes
//! - `assistant`: prompted completions (questions, action interpretation,
//!   lead summaries and suggestions) with failures rendered as text
//! - `planner`: natural-language bulk updates, dry run by default
//! - `guardrails`: checks a generated plan must pass before any backend call
//! - `toolkit`: the context object every surface calls into
//!
//! The model only proposes. Searches and writes are issued by the planner
//! after the plan has been parsed and checked.

pub mod assistant;
pub mod guardrails;
pub mod llm;
pub mod planner;
pub mod toolkit;

pub use assistant::{Assistant, CompletionResult};
pub use llm::{AnthropicClient, CompletionError, LlmClient, ScriptedLlmClient, UnconfiguredLlm};
pub use planner::{
    BulkUpdatePlan, BulkUpdatePlanner, BulkUpdateReport, BulkUpdateRequest, BulkUpdateStatus,
    PlannerError,
};
pub use toolkit::{ConnectionReport, HealthReport, ServiceCheck, Toolkit};
