// gatekeeper-pipeline/tests/support/mod.rs
// ============================================================================
// Module: Orchestrator Test Support
// Description: In-memory port implementations shared by the end-to-end suite.
// ============================================================================
//! ## Overview
//! Each of these stands in for a real collaborator the Orchestrator depends
//! on (`ResolverPort`, `AuditSink`, `JudgeClient`), in-memory and
//! deterministic, so the end-to-end scenarios exercise the real stage
//! sequencing without any network or storage dependency.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures are permitted the conveniences production code is not."
)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use gatekeeper_core::Actor;
use gatekeeper_core::AuditError;
use gatekeeper_core::AuditRecord;
use gatekeeper_core::AuditSink;
use gatekeeper_core::Constraints;
use gatekeeper_core::DataClass;
use gatekeeper_core::Environment;
use gatekeeper_core::EvaluationRequest;
use gatekeeper_core::JudgeError;
use gatekeeper_core::ResolverError;
use gatekeeper_core::ResolverPort;
use gatekeeper_core::ResourceScope;
use gatekeeper_core::RiskProfile;
use gatekeeper_core::ToolCall;
use gatekeeper_core::ToolManifest;
use gatekeeper_core::identifiers::ActionId;
use gatekeeper_core::identifiers::PrincipalId;
use gatekeeper_core::identifiers::SchemaHash;
use gatekeeper_core::identifiers::TenantId;
use gatekeeper_core::request::BoundedContext;
use serde_json::Value;
use serde_json::json;

/// A `ResolverPort` backed by an in-memory map, keyed by action id only.
/// Good enough for the end-to-end suite, which never needs more than one
/// tenant or principal's worth of bound manifests at a time and is testing
/// stage sequencing, not resolution itself; the full principal->toolset
/// chain, tenant fallback, and `schema_hash` precedence rule are exercised
/// directly against `gatekeeper_core::InMemoryResolver`'s own tests.
#[derive(Default)]
pub struct InMemoryResolver {
    /// Bound manifests, keyed by their own `action_id`.
    manifests: BTreeMap<String, ToolManifest>,
}

impl InMemoryResolver {
    /// Builds a resolver that serves a single manifest for any lookup of its
    /// own `action_id`.
    pub fn with_manifest(manifest: ToolManifest) -> Self {
        let mut manifests = BTreeMap::new();
        manifests.insert(manifest.action_id.as_str().to_string(), manifest);
        Self { manifests }
    }
}

impl ResolverPort for InMemoryResolver {
    fn resolve(
        &self,
        _tenant_id: &TenantId,
        _principal_id: Option<&PrincipalId>,
        action_id: &ActionId,
        _version: Option<&str>,
        _schema_hash: Option<&SchemaHash>,
    ) -> Result<ToolManifest, ResolverError> {
        self.manifests.get(action_id.as_str()).cloned().ok_or_else(|| ResolverError::ToolNotFound(action_id.clone()))
    }
}

/// An `AuditSink` that records every record it is handed, for assertions
/// on what the Orchestrator actually wrote.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Every record written so far, in write order.
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    /// Returns a clone of every record written so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit sink mutex poisoned").clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().expect("audit sink mutex poisoned").push(record.clone());
        Ok(())
    }
}

/// A `JudgeClient` whose response is entirely driven by the system prompt it
/// receives, so one instance can play all three quorum voters (or the
/// sentinel, or the arbiter) differently depending on perspective.
pub struct ScriptedJudge {
    /// Computes the response for a given system prompt.
    responder: Box<dyn Fn(&str) -> Result<Value, JudgeError> + Send + Sync>,
}

impl ScriptedJudge {
    /// Builds a judge whose response is computed from the system prompt.
    pub fn new(responder: impl Fn(&str) -> Result<Value, JudgeError> + Send + Sync + 'static) -> Self {
        Self { responder: Box::new(responder) }
    }

    /// Builds a judge that returns the same response regardless of prompt.
    pub fn fixed(response: Value) -> Self {
        Self::new(move |_| Ok(response.clone()))
    }
}

impl gatekeeper_core::JudgeClient for ScriptedJudge {
    fn send(&self, system_prompt: &str, _user_prompt: &str, _timeout_ms: u64) -> Result<Value, JudgeError> {
        (self.responder)(system_prompt)
    }
}

/// A `JudgeClient` that sleeps past any reasonable per-voter or evaluation
/// deadline before replying, used to exercise the deadline-expiry path.
pub struct SlowJudge {
    /// How long to sleep before replying.
    pub delay: std::time::Duration,
}

impl gatekeeper_core::JudgeClient for SlowJudge {
    fn send(&self, _system_prompt: &str, _user_prompt: &str, _timeout_ms: u64) -> Result<Value, JudgeError> {
        std::thread::sleep(self.delay);
        Ok(serde_json::json!({"vote": "SAFE", "label": "CLEAR", "confidence": 0.9, "reason_codes": [], "threat_types": [], "derived_facts": [], "clauses_used": []}))
    }
}

/// A read-only, low-risk manifest fixture: no money movement, single-resource
/// scope, public data, no approval required.
pub fn read_file_manifest() -> ToolManifest {
    ToolManifest {
        action_id: ActionId::new("read_file"),
        version: "1".to_string(),
        schema_hash: SchemaHash::new("hash-read-file"),
        name: "Read file".to_string(),
        args_schema: json!({"type": "object", "required": ["path"], "properties": {"path": {"type": "string"}}}),
        risk_profile: RiskProfile {
            base_risk_tier: None,
            money_movement: false,
            privilege_change: false,
            irreversible: false,
            bulk_operation: false,
            resource_scope: ResourceScope::Single,
            data_class: DataClass::Public,
            requires_approval: false,
        },
        constraints: Constraints::default(),
        deprecated: false,
        deprecation_message: None,
    }
}

/// A money-movement manifest fixture: tenant-scoped, confidential, capped at
/// `max_amount` of 5,000, high enough risk signal to clear `RiskTier::Medium`
/// on its own.
pub fn transfer_funds_manifest() -> ToolManifest {
    let mut manifest = read_file_manifest();
    manifest.action_id = ActionId::new("transfer_funds");
    manifest.schema_hash = SchemaHash::new("hash-transfer-funds");
    manifest.name = "Transfer funds".to_string();
    manifest.args_schema = json!({
        "type": "object",
        "required": ["amount", "recipient"],
        "properties": {"amount": {"type": "number"}, "recipient": {"type": "string"}}
    });
    manifest.risk_profile = RiskProfile {
        base_risk_tier: None,
        money_movement: true,
        privilege_change: false,
        irreversible: true,
        bulk_operation: false,
        resource_scope: ResourceScope::Tenant,
        data_class: DataClass::Confidential,
        requires_approval: false,
    };
    manifest.constraints = Constraints { max_amount: Some(5_000.0), ..Constraints::default() };
    manifest
}

/// A bare-bones evaluation request for `action_id`, overridable by the
/// caller for each scenario's particulars.
pub fn base_request(action_id: &str, args: Value) -> EvaluationRequest {
    EvaluationRequest {
        request_id: None,
        tenant_id: Some(TenantId::new("acme")),
        principal_id: None,
        actor: Actor { id: "agent-1".to_string(), role: "ops".to_string(), actor_type: "agent".to_string(), tenant: "acme".to_string() },
        environment: Some(Environment::Production),
        user_intent: "pay the outstanding invoice".to_string(),
        tool_call: ToolCall { action_id: ActionId::new(action_id), version: None, schema_hash: None, args, idempotency_key: None },
        bounded_context: BoundedContext::default(),
        fuzzy_context: false,
    }
}
