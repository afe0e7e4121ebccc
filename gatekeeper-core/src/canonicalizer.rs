// gatekeeper-core/src/canonicalizer.rs
// ============================================================================
// Module: Canonicalizer (S0)
// Description: Normalizes a raw EvaluationRequest into a frozen, validated form.
// Purpose: First pipeline stage; fatal-field rejection and truncation-with-reason.
// Dependencies: crate::{identifiers, reason, request}
// ============================================================================

//! ## Overview
//! The Canonicalizer is idempotent per-operation and produces output that is
//! frozen for the remainder of the evaluation (spec §4.2: "later stages must
//! not mutate"). Two error modes exist: fatal missing-field rejection
//! (`CanonicalizeError`, mapped by the orchestrator to `DENY`/`E_canonicalize`)
//! and non-fatal truncation, which is recorded as a reason code but never
//! fails the request. Request-size capping happens upstream at the HTTP
//! boundary; this stage assumes it already ran (spec §4.2, last bullet).

use thiserror::Error;

use crate::identifiers::RequestId;
use crate::reason::ReasonCode;
use crate::reason::orchestrator as reason_orchestrator;
use crate::request::Actor;
use crate::request::BoundedContext;
use crate::request::Environment;
use crate::request::EvaluationRequest;
use crate::request::ToolCall;

/// Fatal-field rejection for the Canonicalizer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalizeError {
    /// Neither `tenant_id` (nor the legacy `org` alias, absorbed upstream)
    /// was present.
    #[error("tenant is required")]
    MissingTenant,
    /// `tool_call.action_id` was empty.
    #[error("action_id is required")]
    MissingActionId,
    /// `user_intent` was empty.
    #[error("user_intent is required")]
    MissingUserIntent,
}

/// Character budgets applied by the Canonicalizer. Supplied by the caller
/// (the orchestrator's `PipelineConfig`) rather than hard-coded here, so the
/// core crate stays decoupled from the ambient configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalizerLimits {
    /// Maximum character length of `user_intent` after truncation.
    pub intent_char_cap: usize,
    /// Total character budget shared across all bounded-context items.
    pub context_char_cap: usize,
}

/// A frozen, validated request. Once constructed, fields are never mutated;
/// later stages receive only a read-only view.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    /// Request identifier, generated here if the caller omitted one.
    pub request_id: RequestId,
    /// Tenant identifier, guaranteed present.
    pub tenant_id: String,
    /// Optional principal identifier.
    pub principal_id: Option<String>,
    /// Actor identity and role.
    pub actor: Actor,
    /// Deployment environment, defaulted to `development` when absent.
    pub environment: Environment,
    /// User intent, truncated to `intent_char_cap` if needed.
    pub user_intent: String,
    /// The proposed tool invocation, unmodified.
    pub tool_call: ToolCall,
    /// Bounded context, each item truncated to its per-item share of the budget.
    pub bounded_context: BoundedContext,
    /// Fuzzy-context hint, unmodified.
    pub fuzzy_context: bool,
}

/// Runs the Canonicalizer (S0) over a raw request.
///
/// # Errors
///
/// Returns [`CanonicalizeError`] when a fatal required field is missing.
pub fn canonicalize(
    request: EvaluationRequest,
    limits: CanonicalizerLimits,
) -> Result<(NormalizedRequest, Vec<ReasonCode>), CanonicalizeError> {
    let tenant_id = request
        .tenant_id
        .map(|id| id.as_str().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(CanonicalizeError::MissingTenant)?;

    if request.tool_call.action_id.is_empty() {
        return Err(CanonicalizeError::MissingActionId);
    }
    if request.user_intent.trim().is_empty() {
        return Err(CanonicalizeError::MissingUserIntent);
    }

    let mut reasons = Vec::new();

    let request_id = request.request_id.unwrap_or_else(RequestId::generate);
    let environment = request.environment.unwrap_or(Environment::DEFAULT);

    let user_intent = truncate_with_reason(
        request.user_intent,
        limits.intent_char_cap,
        reason_orchestrator::INTENT_TRUNCATED,
        &mut reasons,
    );

    let bounded_context = truncate_bounded_context(request.bounded_context, limits, &mut reasons);

    let normalized = NormalizedRequest {
        request_id,
        tenant_id,
        principal_id: request.principal_id.map(|id| id.as_str().to_string()),
        actor: request.actor,
        environment,
        user_intent,
        tool_call: request.tool_call,
        bounded_context,
        fuzzy_context: request.fuzzy_context,
    };
    Ok((normalized, reasons))
}

/// Truncates a string to `cap` characters, recording a reason code if truncated.
fn truncate_with_reason(
    value: String,
    cap: usize,
    reason: &'static str,
    reasons: &mut Vec<ReasonCode>,
) -> String {
    if value.chars().count() <= cap {
        return value;
    }
    reasons.push(ReasonCode::new(reason));
    value.chars().take(cap).collect()
}

/// Truncates every bounded-context item to `context_char_cap / max(1, |items|)`.
fn truncate_bounded_context(
    context: BoundedContext,
    limits: CanonicalizerLimits,
    reasons: &mut Vec<ReasonCode>,
) -> BoundedContext {
    let item_count = context.prior_utterances.len() + context.document_snippets.len();
    let per_item_cap = limits.context_char_cap / item_count.max(1);

    let prior_utterances = context
        .prior_utterances
        .into_iter()
        .map(|item| {
            truncate_with_reason(item, per_item_cap, reason_orchestrator::CONTEXT_TRUNCATED, reasons)
        })
        .collect();
    let document_snippets = context
        .document_snippets
        .into_iter()
        .map(|item| {
            truncate_with_reason(item, per_item_cap, reason_orchestrator::CONTEXT_TRUNCATED, reasons)
        })
        .collect();
    let state = context
        .state
        .map(|item| truncate_with_reason(item, per_item_cap, reason_orchestrator::CONTEXT_TRUNCATED, reasons));

    BoundedContext {
        prior_utterances,
        document_snippets,
        state,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::CanonicalizeError;
    use super::CanonicalizerLimits;
    use super::canonicalize;
    use crate::identifiers::ActionId;
    use crate::request::Actor;
    use crate::request::BoundedContext;
    use crate::request::EvaluationRequest;
    use crate::request::ToolCall;
    use crate::identifiers::TenantId;

    fn base_request() -> EvaluationRequest {
        EvaluationRequest {
            request_id: None,
            tenant_id: Some(TenantId::new("acme")),
            principal_id: None,
            actor: Actor {
                id: "agent-1".to_string(),
                role: "ops".to_string(),
                actor_type: "agent".to_string(),
                tenant: "acme".to_string(),
            },
            environment: None,
            user_intent: "check the balance".to_string(),
            tool_call: ToolCall {
                action_id: ActionId::new("read_file"),
                version: None,
                schema_hash: None,
                args: json!({"path": "/etc/config"}),
                idempotency_key: None,
            },
            bounded_context: BoundedContext::default(),
            fuzzy_context: false,
        }
    }

    fn limits() -> CanonicalizerLimits {
        CanonicalizerLimits {
            intent_char_cap: 2000,
            context_char_cap: 8000,
        }
    }

    #[test]
    fn assigns_request_id_and_defaults_environment() {
        let (normalized, reasons) = canonicalize(base_request(), limits()).expect("canonicalizes");
        assert!(!normalized.request_id.is_empty());
        assert_eq!(normalized.environment, crate::request::Environment::Development);
        assert!(reasons.is_empty());
    }

    #[test]
    fn rejects_missing_tenant() {
        let mut request = base_request();
        request.tenant_id = None;
        let err = canonicalize(request, limits()).unwrap_err();
        assert_eq!(err, CanonicalizeError::MissingTenant);
    }

    #[test]
    fn rejects_missing_user_intent() {
        let mut request = base_request();
        request.user_intent = "   ".to_string();
        let err = canonicalize(request, limits()).unwrap_err();
        assert_eq!(err, CanonicalizeError::MissingUserIntent);
    }

    #[test]
    fn truncates_oversized_intent_and_records_reason() {
        let mut request = base_request();
        request.user_intent = "x".repeat(10);
        let tight_limits = CanonicalizerLimits {
            intent_char_cap: 5,
            context_char_cap: 8000,
        };
        let (normalized, reasons) = canonicalize(request, tight_limits).expect("canonicalizes");
        assert_eq!(normalized.user_intent.len(), 5);
        assert!(reasons.iter().any(|r| r.as_str() == "intent_truncated"));
    }

    #[test]
    fn divides_context_budget_across_items() {
        let mut request = base_request();
        request.bounded_context = BoundedContext {
            prior_utterances: vec!["a".repeat(20), "b".repeat(20)],
            document_snippets: vec![],
            state: None,
        };
        let tight_limits = CanonicalizerLimits {
            intent_char_cap: 2000,
            context_char_cap: 10,
        };
        let (normalized, reasons) = canonicalize(request, tight_limits).expect("canonicalizes");
        assert_eq!(normalized.bounded_context.prior_utterances[0].len(), 5);
        assert!(reasons.iter().any(|r| r.as_str() == "context_truncated"));
    }
}
