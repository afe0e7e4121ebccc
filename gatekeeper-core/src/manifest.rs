// gatekeeper-core/src/manifest.rs
// ============================================================================
// Module: Tool Manifest
// Description: Versioned tool records: argument schema, risk profile, constraints.
// Purpose: The bound artifact the Resolver hands to every downstream stage.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A `ToolManifest` is the unit the Resolver (S1a) produces and every later
//! stage reads. `(action_id, version)` uniquely identifies a manifest;
//! `schema_hash` is the hex SHA-256 of the canonical JSON of `args_schema`
//! and must never drift from it (enforced at manifest-storage write time,
//! see `crate::hashing`, not re-checked here).

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::ActionId;
use crate::identifiers::SchemaHash;

/// A versioned, bound tool record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    /// Stable tool identifier regardless of version.
    pub action_id: ActionId,
    /// Version string for this manifest.
    pub version: String,
    /// Hex SHA-256 fingerprint of the canonical `args_schema`.
    pub schema_hash: SchemaHash,
    /// Human-readable tool name.
    pub name: String,
    /// Draft 2020-12 JSON Schema for the tool's arguments.
    pub args_schema: Value,
    /// Declared risk characteristics used by the Risk Tierer.
    pub risk_profile: RiskProfile,
    /// Deterministic structural constraints enforced by the Constraint Evaluator.
    pub constraints: Constraints,
    /// True when the manifest is deprecated; contributes a non-fatal reason code.
    pub deprecated: bool,
    /// Deprecation message, present only when `deprecated` is true.
    pub deprecation_message: Option<String>,
}

/// Resource scope a tool call can touch, from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// Affects a single resource.
    Single,
    /// Affects resources across an entire tenant.
    Tenant,
    /// Affects resources beyond a single tenant.
    Global,
}

/// Sensitivity classification of data a tool call can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    /// Non-sensitive, publicly shareable data.
    Public,
    /// Internal-only data.
    Internal,
    /// Confidential data requiring elevated handling.
    Confidential,
    /// Restricted data with the strictest handling requirements.
    Restricted,
}

/// Declared risk characteristics of a tool, independent of any single call's
/// arguments. Consumed by the Risk Tierer (S2) alongside additive signals
/// computed from the request itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Authoritative upper bound on the computed tier, when present.
    pub base_risk_tier: Option<crate::decision::RiskTier>,
    /// True when the tool can move money or equivalent value.
    pub money_movement: bool,
    /// True when the tool can change a principal's or tenant's privileges.
    pub privilege_change: bool,
    /// True when the tool's effect cannot be undone.
    pub irreversible: bool,
    /// True when the tool can act on more than one resource per call.
    pub bulk_operation: bool,
    /// Widest resource scope the tool can touch.
    pub resource_scope: ResourceScope,
    /// Most sensitive data class the tool can touch.
    pub data_class: DataClass,
    /// True when `HIGH`/`CRITICAL` tier calls must raise to `ESCALATE` at S8.
    pub requires_approval: bool,
}

/// Deterministic structural constraints from the manifest's constraint block.
/// Evaluated by the Constraint Evaluator as an AND-tree over independent checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Non-empty allow-list of permitted environments.
    pub allowed_envs: Vec<String>,
    /// Deny-list of forbidden environments.
    pub denied_envs: Vec<String>,
    /// Non-empty allow-list of permitted actor roles.
    pub allowed_roles: Vec<String>,
    /// Deny-list of forbidden actor roles.
    pub denied_roles: Vec<String>,
    /// Maximum permitted value for amount-bearing argument fields.
    pub max_amount: Option<f64>,
    /// Maximum permitted value for batch-size-bearing argument fields.
    pub max_batch_size: Option<u64>,
    /// Dot-paths into `args` that must resolve to a non-null leaf.
    pub required_arg_paths: Vec<String>,
    /// Patterns of the form `field=value` or `field:contains:substring` that
    /// must not match any argument.
    pub denied_arg_patterns: Vec<String>,
}
