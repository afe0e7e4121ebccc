// gatekeeper-pipeline/src/aggregator.rs
// ============================================================================
// Module: Aggregator (S8)
// Description: Combines every non-terminal stage's signal into the final
//              decision, starting from ALLOW and only ever raising.
// Purpose: The single point that turns accumulated ESCALATE-raising signals
//          into the evaluation's outcome when no earlier stage was terminal
//          (spec §4.12).
// Dependencies: gatekeeper-core
// ============================================================================

//! ## Overview
//! Only reached when S0 through S7 produced no terminal result. Starts from
//! `ALLOW` and raises to `ESCALATE` on any of four independent signals; it
//! never raises to `DENY` — that only ever happens at a terminal stage
//! (spec §4.12, decision precedence property). Reason-code deduplication
//! happens here rather than in the orchestrator, since this is the one
//! place that sees the full accumulated reason list before it is frozen
//! into the audit record.

use gatekeeper_core::Decision;
use gatekeeper_core::QuorumOutcome;
use gatekeeper_core::ReasonCode;
use gatekeeper_core::RiskTier;
use gatekeeper_core::ThreatLabel;
use gatekeeper_core::reason::aggregate;

/// Every non-terminal signal the aggregator reduces over.
pub struct AggregatorInput<'a> {
    /// The quorum's aggregated outcome (never `DENY` here; that is terminal at S4).
    pub quorum_outcome: QuorumOutcome,
    /// The threat sentinel's label, if S5 ran.
    pub threat_label: Option<ThreatLabel>,
    /// Whether the last-evaluated policy pass reported `UNCOVERED`.
    pub policy_uncovered: bool,
    /// Whether the last-evaluated policy pass reported `REQUIRES_FACTS` with
    /// fact keys still missing after S6 ran.
    pub policy_facts_missing: bool,
    /// The computed risk tier.
    pub risk_tier: RiskTier,
    /// Whether the resolved manifest requires human approval.
    pub requires_approval: bool,
    /// Every reason code accumulated by earlier stages, in stage order.
    pub reasons: &'a [ReasonCode],
}

/// The aggregator's output: the final decision and the deduplicated reason
/// list, preserving first-occurrence order (spec §4.12).
pub struct AggregatorResult {
    /// Final decision; never `DENY` (that only happens at a terminal stage).
    pub decision: Decision,
    /// Deduplicated reasons, first-occurrence order preserved.
    pub reasons: Vec<ReasonCode>,
}

/// Runs the Aggregator (S8) over the accumulated non-terminal signals.
#[must_use]
pub fn evaluate(input: &AggregatorInput<'_>) -> AggregatorResult {
    let mut decision = Decision::Allow;
    let mut reasons = input.reasons.to_vec();

    if input.quorum_outcome == QuorumOutcome::Escalate {
        decision = decision.most_severe(Decision::Escalate);
    }
    if input.threat_label == Some(ThreatLabel::Suspicious) {
        decision = decision.most_severe(Decision::Escalate);
    }
    if input.policy_uncovered || input.policy_facts_missing {
        decision = decision.most_severe(Decision::Escalate);
    }
    if input.risk_tier.requires_approval_eligible() && input.requires_approval {
        decision = decision.most_severe(Decision::Escalate);
        reasons.push(ReasonCode::new(aggregate::REQUIRES_APPROVAL));
    }

    AggregatorResult { decision, reasons: dedupe_preserving_order(reasons) }
}

/// Deduplicates a reason list, keeping each code's first occurrence and
/// dropping later repeats (spec §4.12: "preserving first-occurrence order").
fn dedupe_preserving_order(reasons: Vec<ReasonCode>) -> Vec<ReasonCode> {
    let mut seen = std::collections::HashSet::new();
    reasons.into_iter().filter(|reason| seen.insert(reason.clone())).collect()
}
