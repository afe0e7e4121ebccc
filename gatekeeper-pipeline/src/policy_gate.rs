// gatekeeper-pipeline/src/policy_gate.rs
// ============================================================================
// Module: Policy Gate (S3, S7)
// Description: Two passes over an optional external policy engine, before
//              and after the Policy Arbiter derives facts.
// Purpose: Give deployments with a real policy engine a terminal DENY seam
//          without forcing one on deployments that have none (spec §4.7,
//          §4.11).
// Dependencies: gatekeeper-core
// ============================================================================

//! ## Overview
//! When no [`PolicyEnginePort`] is attached, both passes report `COVERED`
//! silently without ever constructing a call (spec §4.7: "the gate reports
//! `COVERED` silently"), the same default-no-op-extension convention this
//! workspace uses elsewhere for optional collaborators. When a real engine
//! is attached, its `UNCOVERED` coverage status is not itself terminal: it
//! only raises the minimum S8 outcome to `ESCALATE`; only an explicit `DENY`
//! status is terminal at either pass.

use gatekeeper_core::PolicyEnginePort;
use gatekeeper_core::PolicyResult;
use gatekeeper_core::PolicyStatus;
use gatekeeper_core::ReasonCode;
use gatekeeper_core::identifiers::ActionId;
use gatekeeper_core::identifiers::TenantId;
use gatekeeper_core::reason::policy;
use serde_json::Value;

/// Runs one policy-gate pass (S3 or S7 share this call shape; only the
/// `derived_facts` argument differs between them).
#[must_use]
pub fn evaluate(
    engine: Option<&dyn PolicyEnginePort>,
    tenant_id: &TenantId,
    action_id: &ActionId,
    args: &Value,
    derived_facts: &[(String, Value)],
) -> PolicyResult {
    let Some(engine) = engine else {
        return PolicyResult::no_engine_attached();
    };

    let response = engine.evaluate(tenant_id, action_id, args, derived_facts);
    PolicyResult {
        status: Some(response.status),
        matched_rules: response.matched_rules,
        requires_fact_keys: response.requires_fact_keys,
    }
}

/// Returns the reason code this pass's result contributes, if any. A `DENY`
/// status is reported by the caller as terminal separately; this only
/// covers the non-terminal codes the audit record still needs (spec §7:
/// "engine unavailable is treated as `UNCOVERED`" carries no code of its own
/// beyond the `P_uncovered` tag already attached here).
#[must_use]
pub fn reason_code(result: &PolicyResult) -> Option<ReasonCode> {
    match result.status {
        Some(PolicyStatus::Deny) => Some(ReasonCode::new(policy::DENY)),
        Some(PolicyStatus::Uncovered) => Some(ReasonCode::new(policy::UNCOVERED)),
        Some(PolicyStatus::RequiresFacts) if !result.requires_fact_keys.is_empty() => {
            Some(ReasonCode::new(policy::FACTS_MISSING))
        }
        Some(PolicyStatus::RequiresFacts | PolicyStatus::Covered) | None => None,
    }
}

/// True when this pass's result is terminal `DENY` at its own stage (spec
/// §4.7, §4.11: "A `DENY` here is terminal").
#[must_use]
pub fn is_terminal_deny(result: &PolicyResult) -> bool {
    result.status == Some(PolicyStatus::Deny)
}
