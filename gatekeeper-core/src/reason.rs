// gatekeeper-core/src/reason.rs
// ============================================================================
// Module: Reason Codes
// Description: Stable short strings classifying a contribution to a decision.
// Purpose: Give the audit record and the response a shared, prefix-namespaced
//          vocabulary for "why" without ever surfacing raw error messages.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Reason codes are the only thing the client ever sees explaining a
//! decision (spec §7: "No error message is ever surfaced verbatim to the
//! client; only stable codes are"). Prefixes are fixed: `E_` orchestrator and
//! infrastructure, `V_` schema validation, `C_` constraint violations, `R_`
//! resolution failures, `A_` alignment quorum, `T_` threat sentinel, `P_`
//! policy gate / arbiter.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A stable, short reason code, e.g. `C_max_amount` or `V_required_missing:/path`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasonCode(String);

impl ReasonCode {
    /// Builds a reason code from a literal or owned string.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Builds a schema-validation reason code carrying a JSON Pointer.
    #[must_use]
    pub fn with_pointer(prefix: &str, pointer: &str) -> Self {
        Self(format!("{prefix}:{pointer}"))
    }

    /// Returns the reason code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReasonCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Orchestrator/infrastructure reason codes (`E_*`).
pub mod orchestrator {
    /// Canonicalization failed on a fatal missing field.
    pub const CANONICALIZE: &str = "E_canonicalize";
    /// Resolver reported a transient storage failure.
    pub const STORE: &str = "E_store";
    /// The overall evaluation deadline expired.
    pub const DEADLINE: &str = "E_deadline";
    /// An impossible-state invariant violation was detected.
    pub const INTERNAL: &str = "E_internal";
    /// The user-visible intent string was truncated to the configured budget.
    pub const INTENT_TRUNCATED: &str = "intent_truncated";
    /// A bounded-context item was truncated to its per-item budget.
    pub const CONTEXT_TRUNCATED: &str = "context_truncated";
    /// The resolved manifest is marked deprecated.
    pub const TOOL_DEPRECATED: &str = "tool_deprecated";
}

/// Schema-validation reason codes (`V_*`).
pub mod validation {
    /// A required argument path was missing; combine with `ReasonCode::with_pointer`.
    pub const REQUIRED_MISSING: &str = "V_required_missing";
    /// The argument value failed schema validation at the given pointer.
    pub const SCHEMA_MISMATCH: &str = "V_schema_mismatch";
}

/// Constraint-evaluator reason codes (`C_*`).
pub mod constraint {
    /// Environment is not in `allowed_envs` or is in `denied_envs`.
    pub const ENV_DENIED: &str = "C_env_denied";
    /// Actor role is not in `allowed_roles` or is in `denied_roles`.
    pub const ROLE_DENIED: &str = "C_role_denied";
    /// An amount-bearing argument exceeded `max_amount`.
    pub const MAX_AMOUNT: &str = "C_max_amount";
    /// A batch-size-bearing argument exceeded `max_batch_size`.
    pub const MAX_BATCH_SIZE: &str = "C_max_batch_size";
    /// A required argument path was missing or null.
    pub const MISSING_REQUIRED: &str = "C_missing_required";
    /// Arguments matched a denied argument pattern.
    pub const DENIED_PATTERN: &str = "C_denied_pattern";
}

/// Resolver reason codes (`R_*`).
pub mod resolution {
    /// The principal has no active toolset binding.
    pub const NO_TOOLSET: &str = "R_no_toolset";
    /// The toolset does not contain the requested tool.
    pub const TOOL_NOT_IN_TOOLSET: &str = "R_tool_not_in_toolset";
    /// No manifest could be found for the requested coordinates.
    pub const TOOL_NOT_FOUND: &str = "R_tool_not_found";
    /// The caller-supplied `schema_hash` did not match the resolved manifest.
    pub const VERSION_MISMATCH: &str = "R_version_mismatch";
}

/// Alignment-quorum reason codes (`A_*`).
pub mod alignment {
    /// All three voters voted `DENY`.
    pub const UNANIMOUS_DENY: &str = "A_unanimous_deny";
    /// At least one voter voted `DENY`.
    pub const VOTER_DENY: &str = "A_voter_deny";
    /// At least one voter abstained (malformed output, network error, or deadline).
    pub const VOTER_ABSTAIN: &str = "A_voter_abstain";
    /// Voters split between `SAFE` and a non-deny outcome.
    pub const SPLIT_VOTE: &str = "A_split_vote";
}

/// Threat-sentinel reason codes (`T_*`).
pub mod threat {
    /// The threat classifier returned `MALICIOUS`.
    pub const MALICIOUS: &str = "T_malicious";
    /// The threat classifier returned `SUSPICIOUS`.
    pub const SUSPICIOUS: &str = "T_suspicious";
}

/// Policy-gate and arbiter reason codes (`P_*`).
pub mod policy {
    /// The policy engine returned a terminal `DENY`.
    pub const DENY: &str = "P_deny";
    /// The policy engine reported `UNCOVERED`.
    pub const UNCOVERED: &str = "P_uncovered";
    /// The policy engine requested facts that remained unresolved.
    pub const FACTS_MISSING: &str = "P_facts_missing";
    /// The arbiter response contained a decision-shaped field that was stripped.
    pub const ARBITER_DECISION_STRIPPED: &str = "arbiter_decision_stripped";
}

/// Aggregator reason codes (no dedicated prefix; descriptive of an S8 raise).
pub mod aggregate {
    /// Tier was `HIGH`/`CRITICAL` and the manifest requires approval.
    pub const REQUIRES_APPROVAL: &str = "requires_approval";
}
