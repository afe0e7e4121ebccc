// gatekeeper-core/src/decision.rs
// ============================================================================
// Module: Decision Vocabulary
// Description: The final verdict, the stage that produced it, and risk tiers.
// Purpose: Shared vocabulary between every pipeline stage and the audit record.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `Decision` is the three-way outcome the whole pipeline exists to produce.
//! `DecisionStage` records which of the eight stages fixed that outcome, so
//! the audit record and the short-circuit-monotonicity property
//! (once a stage is terminal, no later stage runs) can both point at a single
//! tag. `RiskTier` is computed once by the Risk Tierer (S2) and used only for
//! routing later stages; it never appears as a vote in the aggregator.

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;

/// Final verdict for a single evaluation.
///
/// # Invariants
/// - `Deny` never appears in a response unless some stage was terminal
///   (decision precedence, spec §8).
/// - Ordering reflects severity: `Allow < Escalate < Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// The tool call may proceed without human review.
    Allow,
    /// The tool call is routed to human review.
    Escalate,
    /// The tool call is refused.
    Deny,
}

impl Decision {
    /// Numeric severity used to implement `max` across accumulated signals.
    const fn severity(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Escalate => 1,
            Self::Deny => 2,
        }
    }

    /// Returns the more severe of two decisions, per the aggregator's
    /// "raise to" semantics. Never used to raise a decision to `Deny`; S8
    /// itself enforces that by construction (see `gatekeeper_pipeline::aggregator`).
    #[must_use]
    pub fn most_severe(self, other: Self) -> Self {
        if other.severity() > self.severity() { other } else { self }
    }
}

impl PartialOrd for Decision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

/// Identifies which pipeline stage fixed the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStage {
    /// Canonicalizer (S0): fatal field rejection.
    S0Canonicalize,
    /// Resolver (S1a): tool/version/schema-hash resolution.
    S1Resolve,
    /// Schema Validator (S1b): argument schema rejection.
    S1Schema,
    /// Constraint Evaluator: deterministic manifest constraint violation.
    SConstraints,
    /// Policy Gate, Pass 1 (S3): policy engine terminal deny.
    S3PolicyGate,
    /// Intent Alignment Quorum (S4): unanimous voter deny.
    S4Quorum,
    /// Threat Sentinel (S5): malicious label.
    S5Threat,
    /// Policy Gate, Pass 2 (S7): policy engine terminal deny after arbiter facts.
    S7PolicyGate,
    /// Aggregator (S8): no earlier stage was terminal.
    S8Aggregate,
    /// Orchestrator-level overall deadline expiry.
    Deadline,
}

/// Discrete risk classification computed once by the Risk Tierer (S2).
///
/// # Invariants
/// - Purpose is routing only (spec §4.5): it selects whether S5 and S6 run,
///   and never itself votes in the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    /// Low risk; no conditional stages are triggered.
    Low,
    /// Medium risk; triggers the Threat Sentinel and, conditionally, the Arbiter.
    Medium,
    /// High risk; also raises to `ESCALATE` at S8 when `requires_approval` is set.
    High,
    /// Critical risk; same routing as `High`, representing the ceiling of the scale.
    Critical,
}

impl RiskTier {
    /// Returns true once the tier is at least `MEDIUM`, the threshold that
    /// gates the Threat Sentinel (S5) and the Policy Arbiter (S6).
    #[must_use]
    pub const fn at_least_medium(self) -> bool {
        matches!(self, Self::Medium | Self::High | Self::Critical)
    }

    /// Returns true for the tiers (`HIGH`, `CRITICAL`) that combine with a
    /// manifest's `requires_approval` flag to raise the aggregator's default
    /// outcome to `ESCALATE`.
    #[must_use]
    pub const fn requires_approval_eligible(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::Decision;
    use super::RiskTier;

    #[test]
    fn deny_is_the_most_severe_decision() {
        assert_eq!(Decision::Allow.most_severe(Decision::Deny), Decision::Deny);
        assert_eq!(Decision::Deny.most_severe(Decision::Allow), Decision::Deny);
        assert_eq!(Decision::Escalate.most_severe(Decision::Allow), Decision::Escalate);
    }

    #[test]
    fn risk_tier_gates_conditional_stages() {
        assert!(!RiskTier::Low.at_least_medium());
        assert!(RiskTier::Medium.at_least_medium());
        assert!(RiskTier::Critical.requires_approval_eligible());
        assert!(!RiskTier::Medium.requires_approval_eligible());
    }
}
