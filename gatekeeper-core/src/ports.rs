// gatekeeper-core/src/ports.rs
// ============================================================================
// Module: Pipeline Ports
// Description: The external-collaborator trait boundary the orchestrator
//              depends on: resolution, audit, judges, policy, and the clock.
// Purpose: Keep storage, HTTP, and policy-engine concerns out of the core
//          decision logic; every concrete implementation lives elsewhere
//          (gatekeeper-judges, or test fakes).
// Dependencies: serde_json, thiserror, time, crate::{identifiers, manifest,
//              stage_results, audit}
// ============================================================================

//! ## Overview
//! Per the design notes, ports are defined as traits the orchestrator depends
//! on rather than calling a concrete implementation directly (teacher
//! precedent: `EvidenceProvider`/`Dispatcher`/`RunStateStore`). All three
//! judge roles share one `JudgeClient` capability rather than three
//! subclasses — they differ only in the prompt they compose and the JSON
//! shape they expect back (spec §9, polymorphism note).

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::audit::AuditRecord;
use crate::identifiers::ActionId;
use crate::identifiers::PrincipalId;
use crate::identifiers::SchemaHash;
use crate::identifiers::TenantId;
use crate::manifest::ToolManifest;

/// A point in time, used for deadline arithmetic and audit timestamps.
pub type Timestamp = OffsetDateTime;

/// Injectable time source, so deadline behavior is deterministic in tests
/// (design notes: traits the orchestrator depends on rather than calling
/// `SystemTime` directly).
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        OffsetDateTime::now_utc()
    }
}

/// Failure kinds the Resolver (S1a) can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// The principal has no active toolset binding.
    #[error("principal {0} has no active toolset")]
    PrincipalHasNoToolset(PrincipalId),
    /// The resolved toolset does not contain the requested action.
    #[error("toolset does not contain action {0}")]
    ToolNotInToolset(ActionId),
    /// No manifest could be found for the requested coordinates.
    #[error("no manifest found for action {0}")]
    ToolNotFound(ActionId),
    /// The caller-supplied `schema_hash` did not match the resolved manifest.
    #[error("schema_hash mismatch for action {0}")]
    VersionMismatch(ActionId),
    /// The backing store was unreachable; retryable upstream, surfaces as
    /// `ESCALATE` in the current evaluation (spec §4.3).
    #[error("tool store unavailable: {0}")]
    StorageUnavailable(String),
}

/// Resolves `(tenant, principal?, action_id, version?, schema_hash?)` into a
/// bound `ToolManifest`. [`crate::resolver::InMemoryResolver`] is the
/// concrete, storage-agnostic implementation this crate ships; DynamoDB/S3-
/// backed stores remain external and out of scope (spec §1).
pub trait ResolverPort: Send + Sync {
    /// Resolves a tool manifest per the Resolver's strategy chain (spec §4.3).
    ///
    /// # Errors
    ///
    /// Returns a [`ResolverError`] variant per the failure kinds above.
    fn resolve(
        &self,
        tenant_id: &TenantId,
        principal_id: Option<&PrincipalId>,
        action_id: &ActionId,
        version: Option<&str>,
        schema_hash: Option<&SchemaHash>,
    ) -> Result<ToolManifest, ResolverError>;
}

/// Failure writing an audit record. Never affects the client-visible
/// outcome (spec §7: "Sink — never affects the client-visible outcome").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// The sink is temporarily unavailable; callers should retry with backoff.
    #[error("audit sink temporarily unavailable: {0}")]
    Retryable(String),
    /// The sink failed permanently for this record.
    #[error("audit sink failed: {0}")]
    Fatal(String),
}

/// Writes an immutable audit record. Implementations must be `Send + Sync`;
/// a slow or failing sink must never extend an evaluation's user-visible
/// deadline (spec §5).
pub trait AuditSink: Send + Sync {
    /// Records a completed evaluation's audit record.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] on sink failure; the orchestrator logs but
    /// never propagates this to the client.
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// A no-op audit sink, useful for tests that don't assert on audit output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Failure calling an LLM-backed judge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JudgeError {
    /// The outbound request failed (connection, TLS, or non-2xx response).
    #[error("judge request failed: {0}")]
    Request(String),
    /// The response body was not valid JSON, or not an object.
    #[error("judge response was not a valid json object: {0}")]
    MalformedResponse(String),
    /// The per-voter or overall deadline expired before a response arrived.
    #[error("judge call timed out")]
    Timeout,
}

/// A single capability shared by all three judge roles (alignment voter,
/// threat sentinel, policy arbiter). Callers compose the prompt and parse
/// the stage-specific JSON shape back out of the returned value; this trait
/// knows nothing about any one stage's semantics.
pub trait JudgeClient: Send + Sync {
    /// Sends a chat-completion request and returns the parsed JSON object
    /// from the response content.
    ///
    /// `system_prompt` carries the stage- and (for the quorum) voter-specific
    /// perspective; `user_prompt` carries the evaluation's own data.
    /// `timeout_ms` is the shorter of the stage's own per-call deadline and
    /// the evaluation's remaining overall deadline (spec §5).
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError`] on transport failure, a non-JSON-object
    /// response, or timeout.
    fn send(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        timeout_ms: u64,
    ) -> Result<Value, JudgeError>;
}

/// Coverage status and requested facts from the policy engine pass (S3/S7).
/// Re-exported here (rather than only in `stage_results`) because it is the
/// shape the `PolicyEnginePort` trait itself returns.
pub use crate::stage_results::PolicyStatus;

/// One pass's response from an attached policy engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyGateResponse {
    /// Coverage status for this pass.
    pub status: PolicyStatus,
    /// Identifiers of rules that matched.
    pub matched_rules: Vec<String>,
    /// Fact keys requested for a subsequent arbiter run, when `status` is
    /// `RequiresFacts`.
    pub requires_fact_keys: Vec<String>,
}

/// Optional external collaborator consulted at S3 (pre-quorum) and S7
/// (post-arbiter). When no engine is attached, the gate reports `COVERED`
/// silently (spec §4.7) rather than calling this trait at all.
pub trait PolicyEnginePort: Send + Sync {
    /// Evaluates policy coverage for the call, optionally given derived
    /// facts from a prior Policy Arbiter run (S7's re-invocation).
    fn evaluate(
        &self,
        tenant_id: &TenantId,
        action_id: &ActionId,
        args: &Value,
        derived_facts: &[(String, Value)],
    ) -> PolicyGateResponse;
}
