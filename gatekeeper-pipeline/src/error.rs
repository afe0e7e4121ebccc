// gatekeeper-pipeline/src/error.rs
// ============================================================================
// Module: Pipeline Error
// Description: Top-level error composing every stage's failure kinds.
// Purpose: Give the Orchestrator's public entry point a single error type,
//          even though almost every per-stage failure is absorbed into a
//          decision rather than propagated (spec §7).
// Dependencies: thiserror, gatekeeper-core
// ============================================================================

//! ## Overview
//! Most stage failures never reach this type: the spec's error-handling
//! design (§7) routes validation, resolution, judge, and policy failures
//! into a `Decision` with a reason code, not a propagated `Result::Err`.
//! `PipelineError` exists only for the failures the Orchestrator itself
//! cannot recover from: a misconfigured pipeline or an impossible internal
//! state. Both map to `E_internal` at the RPC boundary.

use thiserror::Error;

/// Errors the Orchestrator surfaces instead of completing an evaluation.
///
/// # Invariants
/// - Every other stage-level failure is absorbed into a `Decision` with a
///   reason code rather than reaching this type (spec §7).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The supplied [`crate::config::PipelineConfig`] failed validation.
    #[error("invalid pipeline configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
    /// An invariant the Orchestrator depends on was violated, e.g. a stage
    /// producing a terminal verdict without a reason code.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}
