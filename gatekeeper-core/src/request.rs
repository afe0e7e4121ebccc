// gatekeeper-core/src/request.rs
// ============================================================================
// Module: Evaluation Request
// Description: The raw, caller-submitted shape of a tool-call evaluation.
// Purpose: Define the pre-canonicalization wire contract for the Evaluate RPC.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! `EvaluationRequest` is the input the Canonicalizer (S0) consumes and
//! freezes into a `NormalizedRequest`. Fields here may be absent, oversized,
//! or otherwise not yet validated; see `crate::canonicalizer`.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::ActionId;
use crate::identifiers::PrincipalId;
use crate::identifiers::RequestId;
use crate::identifiers::SchemaHash;
use crate::identifiers::TenantId;

/// Deployment environment label carried on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local or sandboxed development.
    Development,
    /// Pre-production staging.
    Staging,
    /// Live production traffic.
    Production,
    /// Automated test execution.
    Test,
}

impl Environment {
    /// The environment the Canonicalizer assigns when the caller omits one.
    pub const DEFAULT: Self = Self::Development;

    /// Returns the lowercase wire label for this environment, matching the
    /// strings used in manifest `allowed_envs`/`denied_envs` lists.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// The identity and role of whoever (or whatever) is invoking the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier.
    pub id: String,
    /// Actor role, checked against manifest `allowed_roles`/`denied_roles`.
    pub role: String,
    /// Actor type label, e.g. `agent` or `service`.
    #[serde(rename = "type")]
    pub actor_type: String,
    /// Tenant the actor is acting on behalf of.
    pub tenant: String,
}

/// The proposed tool invocation itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Stable tool identifier regardless of version.
    pub action_id: ActionId,
    /// Optional explicit version request.
    pub version: Option<String>,
    /// Optional explicit schema-fingerprint request.
    pub schema_hash: Option<SchemaHash>,
    /// Proposed argument object.
    pub args: Value,
    /// Optional idempotency key for the caller's own retry semantics.
    pub idempotency_key: Option<String>,
}

/// Bounded prior context supplied to the alignment quorum and arbiter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundedContext {
    /// Ordered list of short prior utterances, oldest first.
    pub prior_utterances: Vec<String>,
    /// Optional short document snippets relevant to the call.
    pub document_snippets: Vec<String>,
    /// Optional free-form state description.
    pub state: Option<String>,
}

/// Raw, caller-submitted evaluation request, prior to canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Caller-assigned request identifier; generated by the orchestrator if absent.
    pub request_id: Option<RequestId>,
    /// Tenant the evaluation is scoped to.
    pub tenant_id: Option<TenantId>,
    /// Optional principal acting on the tenant's behalf.
    pub principal_id: Option<PrincipalId>,
    /// The actor and environment the call is evaluated under.
    pub actor: Actor,
    /// Deployment environment label; defaults to `development` when absent.
    pub environment: Option<Environment>,
    /// Bounded summary of what the caller intends to accomplish.
    pub user_intent: String,
    /// The proposed tool invocation.
    pub tool_call: ToolCall,
    /// Bounded prior context.
    pub bounded_context: BoundedContext,
    /// Hint that the bounded context is incomplete or noisy, used to decide
    /// whether the Policy Arbiter (S6) runs.
    pub fuzzy_context: bool,
}
