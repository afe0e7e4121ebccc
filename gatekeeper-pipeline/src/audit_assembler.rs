// gatekeeper-pipeline/src/audit_assembler.rs
// ============================================================================
// Module: Audit Assembler
// Description: Builds the single, immutable AuditRecord for one evaluation
//              out of the orchestrator's accumulated stage outputs.
// Purpose: Keep AuditRecord construction in one place so "exactly one audit
//          record per evaluation" (spec §8, audit completeness property) is
//          structurally true rather than merely observed.
// Dependencies: gatekeeper-core
// ============================================================================

//! ## Overview
//! The assembler is a pure function from accumulated evaluation state to an
//! [`AuditRecord`]; it performs no I/O itself (writing the record is the
//! [`gatekeeper_core::AuditSink`]'s job, invoked by the orchestrator). It is
//! called exactly once per evaluation, including the fatal-S0-rejection path
//! (spec §4.13: "Always emits an audit record, including on fatal S0
//! errors"), which is why every field below is either always known or
//! explicitly `Option`-typed for the stages that may not have run.

use gatekeeper_core::AuditRecord;
use gatekeeper_core::Decision;
use gatekeeper_core::DecisionStage;
use gatekeeper_core::ReasonCode;
use gatekeeper_core::RiskTier;
use gatekeeper_core::StageOutputs;
use gatekeeper_core::StageTimings;
use gatekeeper_core::audit::ResolvedTool;
use gatekeeper_core::identifiers::AuditId;
use gatekeeper_core::identifiers::RequestId;
use gatekeeper_core::request::Actor;
use gatekeeper_core::request::BoundedContext;
use gatekeeper_core::request::Environment;
use serde_json::Value;

/// Everything the assembler needs to build one [`AuditRecord`]. Built up by
/// the orchestrator as stages run, then handed here exactly once at the end
/// of an evaluation (success, terminal denial, or deadline expiry alike).
pub struct AuditAssemblerInput {
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
    /// The resolved tool coordinates, when resolution succeeded.
    pub resolved_tool: Option<ResolvedTool>,
    /// The post-canonicalization arguments.
    pub args: Value,
    /// User intent as evaluated (post-truncation).
    pub user_intent: String,
    /// Bounded context as evaluated (post-truncation).
    pub bounded_context: BoundedContext,
    /// Risk tier, when S2 ran.
    pub risk_tier: Option<RiskTier>,
    /// Every stage's structured output, for stages that ran.
    pub stage_outputs: StageOutputs,
    /// Total evaluation wall-clock time, in milliseconds.
    pub total_ms: u64,
    /// Per-stage wall-clock timings.
    pub stage_timings: StageTimings,
    /// Final decision.
    pub decision: Decision,
    /// Which stage produced the final decision.
    pub decision_stage: DecisionStage,
    /// Deduplicated reason codes, in first-occurrence order.
    pub reasons: Vec<ReasonCode>,
    /// RFC 3339 timestamp at which the evaluation completed.
    pub evaluated_at: String,
}

/// Builds the immutable [`AuditRecord`] for one evaluation, assigning a
/// fresh [`AuditId`].
#[must_use]
pub fn assemble(input: AuditAssemblerInput) -> AuditRecord {
    AuditRecord {
        audit_id: AuditId::generate(),
        request_id: input.request_id,
        tenant_id: input.tenant_id,
        principal_id: input.principal_id,
        actor: input.actor,
        environment: input.environment,
        resolved_tool: input.resolved_tool,
        args: input.args,
        user_intent: input.user_intent,
        bounded_context: input.bounded_context,
        risk_tier: input.risk_tier,
        stage_outputs: input.stage_outputs,
        total_ms: input.total_ms,
        stage_timings: input.stage_timings,
        decision: input.decision,
        decision_stage: input.decision_stage,
        reasons: input.reasons,
        evaluated_at: input.evaluated_at,
    }
}

#[cfg(test)]
mod tests {
    use gatekeeper_core::Decision;
    use gatekeeper_core::DecisionStage;
    use gatekeeper_core::StageOutputs;
    use gatekeeper_core::identifiers::RequestId;
    use gatekeeper_core::request::Actor;
    use gatekeeper_core::request::BoundedContext;
    use gatekeeper_core::request::Environment;
    use serde_json::json;

    use super::AuditAssemblerInput;
    use super::assemble;

    fn base_input() -> AuditAssemblerInput {
        AuditAssemblerInput {
            request_id: RequestId::generate(),
            tenant_id: "acme".to_string(),
            principal_id: None,
            actor: Actor { id: "agent-1".to_string(), role: "ops".to_string(), actor_type: "agent".to_string(), tenant: "acme".to_string() },
            environment: Environment::Production,
            resolved_tool: None,
            args: json!({}),
            user_intent: "check the balance".to_string(),
            bounded_context: BoundedContext::default(),
            risk_tier: None,
            stage_outputs: StageOutputs::default(),
            total_ms: 12,
            stage_timings: std::collections::BTreeMap::new(),
            decision: Decision::Deny,
            decision_stage: DecisionStage::S0Canonicalize,
            reasons: vec![],
            evaluated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn assigns_a_fresh_audit_id() {
        let first = assemble(base_input());
        let second = assemble(base_input());
        assert_ne!(first.audit_id, second.audit_id);
    }

    #[test]
    fn carries_through_the_supplied_decision() {
        let record = assemble(base_input());
        assert_eq!(record.decision, Decision::Deny);
        assert_eq!(record.decision_stage, DecisionStage::S0Canonicalize);
    }
}
