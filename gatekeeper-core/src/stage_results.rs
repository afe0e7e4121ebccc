// gatekeeper-core/src/stage_results.rs
// ============================================================================
// Module: Stage Result Vocabulary
// Description: Structured per-stage outputs shared between the pipeline
//              crate's stage implementations and the audit record.
// Purpose: Give every stage's output a serializable shape independent of the
//          stage's own implementation crate, so AuditRecord can embed them.
// Dependencies: serde, serde_json, crate::identifiers, crate::reason
// ============================================================================

//! ## Overview
//! These types are produced by `gatekeeper-pipeline`'s stage implementations
//! but live here so `AuditRecord` (also defined in this crate) can embed them
//! without a circular dependency between the two crates.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::VoterId;
use crate::reason::ReasonCode;

/// A single alignment-quorum voter's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    /// The voter judged the call aligned with the stated intent.
    Safe,
    /// The voter judged the call misaligned.
    Deny,
    /// The voter produced no usable judgment (malformed output, network
    /// error, or per-voter deadline expiry all coerce to this).
    Abstain,
}

/// One voter's structured judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterRecord {
    /// Which of the three fixed voters produced this judgment.
    pub voter_id: VoterId,
    /// The voter's vote.
    pub vote: Vote,
    /// The voter's confidence in `[0, 1]`.
    pub confidence: f64,
    /// Voter-reported reason codes.
    pub reason_codes: Vec<String>,
}

/// Aggregated outcome of the Intent Alignment Quorum (S4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuorumOutcome {
    /// Every voter voted `SAFE`.
    Safe,
    /// Routed to human review per the aggregation table.
    Escalate,
    /// Every voter voted `DENY`; terminal at S4.
    Deny,
}

/// The full result of the Intent Alignment Quorum, including the per-voter
/// breakdown the audit record and response both carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Aggregated outcome per the §4.8 precedence table.
    pub outcome: QuorumOutcome,
    /// Per-voter breakdown, ordered by a fixed voter iteration order
    /// regardless of completion order (spec §5: ordering guarantees).
    pub voters: Vec<VoterRecord>,
}

/// Threat Sentinel (S5) classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLabel {
    /// No threat indicators detected.
    Clear,
    /// Ambiguous or weak threat indicators; raises the minimum outcome to `ESCALATE`.
    Suspicious,
    /// Strong threat indicators; terminal `DENY`.
    Malicious,
}

/// Structured Threat Sentinel output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatResult {
    /// The classifier's label.
    pub label: ThreatLabel,
    /// Threat type tags the classifier reported.
    pub threat_types: Vec<String>,
    /// The classifier's confidence in `[0, 1]`.
    pub confidence: f64,
}

/// A single fact returned by the Policy Arbiter (S6). Advisory only; the
/// arbiter never returns a decision (spec §4.10, §8 arbiter purity property).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFact {
    /// The fact key, matching one of the requested `requires_fact_keys`.
    pub key: String,
    /// The fact's value, of arbiter-determined shape.
    pub value: Value,
    /// The arbiter's confidence in this fact, in `[0, 1]`.
    pub confidence: f64,
    /// Optional free-form source label.
    pub source: Option<String>,
}

/// Structured Policy Arbiter output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbiterFacts {
    /// Facts the arbiter derived, keyed for S7's re-invocation of the policy engine.
    pub derived_facts: Vec<DerivedFact>,
    /// Policy clauses the arbiter consulted, per its own report.
    pub clauses_used: Vec<String>,
    /// The arbiter's overall confidence in `[0, 1]`.
    pub confidence: f64,
    /// True when a `vote`/`decision`-shaped field was present in the raw
    /// judge response and stripped before constructing this record.
    pub decision_stripped: bool,
}

impl ArbiterFacts {
    /// Returns the derived facts as a lookup keyed by fact key, the shape S7
    /// merges into its re-invocation context.
    #[must_use]
    pub fn facts_by_key(&self) -> BTreeMap<&str, &DerivedFact> {
        self.derived_facts.iter().map(|fact| (fact.key.as_str(), fact)).collect()
    }
}

/// Policy-engine coverage status, returned by both policy gate passes (S3, S7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyStatus {
    /// The policy engine denies the call; terminal at its stage.
    Deny,
    /// The policy engine has rules covering the call and allows it.
    #[default]
    Covered,
    /// The policy engine needs additional facts before it can decide.
    RequiresFacts,
    /// No policy rule covers the call.
    Uncovered,
}

/// Structured policy-gate output for one pass (S3 or S7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyResult {
    /// The engine's coverage status for this pass.
    pub status: Option<PolicyStatus>,
    /// Identifiers of rules that matched.
    pub matched_rules: Vec<String>,
    /// Fact keys the engine is requesting, when `status` is `RequiresFacts`.
    pub requires_fact_keys: Vec<String>,
}

impl PolicyResult {
    /// The silent default reported when no policy engine is attached
    /// (spec §4.7: "the gate reports `COVERED` silently").
    #[must_use]
    pub fn no_engine_attached() -> Self {
        Self {
            status: Some(PolicyStatus::Covered),
            matched_rules: Vec::new(),
            requires_fact_keys: Vec::new(),
        }
    }
}

/// Structured Constraint Evaluator output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintsResult {
    /// True when every constraint check passed.
    pub passed: bool,
    /// The first violated check's reason code, when `passed` is false.
    pub violation: Option<ReasonCode>,
}
