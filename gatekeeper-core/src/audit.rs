// gatekeeper-core/src/audit.rs
// ============================================================================
// Module: Audit Record
// Description: The immutable record produced for every evaluation.
// Purpose: Authoritative record of a decision; the RPC response is a
//          projection of this, never the other way around (spec §9).
// Dependencies: serde, serde_json, crate::{identifiers, decision, reason,
//              request, stage_results}
// ============================================================================

//! ## Overview
//! Every evaluation that returns to the client produces exactly one
//! `AuditRecord` (spec §8, audit completeness property), including on fatal
//! S0 errors (spec §4.13). Once handed to the `AuditSink`, a record is never
//! mutated again (spec §3, ownership).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::decision::Decision;
use crate::decision::DecisionStage;
use crate::decision::RiskTier;
use crate::identifiers::ActionId;
use crate::identifiers::AuditId;
use crate::identifiers::RequestId;
use crate::identifiers::SchemaHash;
use crate::reason::ReasonCode;
use crate::request::Actor;
use crate::request::BoundedContext;
use crate::request::Environment;
use crate::stage_results::AlignmentResult;
use crate::stage_results::ArbiterFacts;
use crate::stage_results::ConstraintsResult;
use crate::stage_results::PolicyResult;
use crate::stage_results::ThreatResult;

/// Per-stage wall-clock timing, in milliseconds. A stage absent from this
/// map never ran (spec §8, short-circuit monotonicity property).
pub type StageTimings = BTreeMap<String, u64>;

/// The resolved tool coordinates actually evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTool {
    /// Resolved action id.
    pub action_id: ActionId,
    /// Resolved version.
    pub version: String,
    /// Resolved schema hash.
    pub schema_hash: SchemaHash,
}

/// Every stage's structured output, present only for stages that actually ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutputs {
    /// Constraint Evaluator output.
    pub constraints: Option<ConstraintsResult>,
    /// Policy Gate Pass 1 (S3) output.
    pub policy_pass1: Option<PolicyResult>,
    /// Intent Alignment Quorum (S4) output, including per-voter breakdown.
    pub alignment: Option<AlignmentResult>,
    /// Threat Sentinel (S5) output.
    pub threat: Option<ThreatResult>,
    /// Policy Arbiter (S6) output.
    pub arbiter: Option<ArbiterFacts>,
    /// Policy Gate Pass 2 (S7) output.
    pub policy_pass2: Option<PolicyResult>,
}

/// The immutable decision record for a single evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// This audit record's own identifier.
    pub audit_id: AuditId,
    /// The evaluation's request identifier.
    pub request_id: RequestId,
    /// Tenant the evaluation was scoped to.
    pub tenant_id: String,
    /// Optional principal acting on the tenant's behalf.
    pub principal_id: Option<String>,
    /// Actor identity and role as evaluated.
    pub actor: Actor,
    /// Deployment environment as evaluated.
    pub environment: Environment,
    /// The resolved `(action_id, version, schema_hash)`, when resolution succeeded.
    pub resolved_tool: Option<ResolvedTool>,
    /// The post-canonicalization arguments, sufficient to reconstruct exactly
    /// what was evaluated.
    pub args: Value,
    /// User intent as evaluated (post-truncation).
    pub user_intent: String,
    /// Bounded context as evaluated (post-truncation).
    pub bounded_context: BoundedContext,
    /// Risk tier computed by S2, when reached.
    pub risk_tier: Option<RiskTier>,
    /// Every stage's structured output, for stages that ran.
    pub stage_outputs: StageOutputs,
    /// Total evaluation wall-clock time, in milliseconds.
    pub total_ms: u64,
    /// Per-stage wall-clock timings; absent entries mean the stage never ran.
    pub stage_timings: StageTimings,
    /// Final decision.
    pub decision: Decision,
    /// Which stage produced the final decision.
    pub decision_stage: DecisionStage,
    /// Deduplicated reason codes, in first-occurrence order.
    pub reasons: Vec<ReasonCode>,
    /// Timestamp (RFC 3339) at which the evaluation completed.
    pub evaluated_at: String,
}
