// gatekeeper-pipeline/src/risk_tier.rs
// ============================================================================
// Module: Risk Tierer (S2)
// Description: Deterministically maps risk profile, arguments, and
//              environment to a discrete RiskTier, for routing only.
// Purpose: Select whether the Threat Sentinel (S5) and Policy Arbiter (S6)
//          run; never itself votes in the final decision (spec §4.5).
// Dependencies: gatekeeper-core, serde_json
// ============================================================================

//! ## Overview
//! Each additive signal contributes a fixed number of points to an integer
//! score; the score is bucketed into tiers by fixed thresholds, then raised
//! to `max(declared, computed)` against the manifest's `base_risk_tier` when
//! present. See `DESIGN.md` for the resolution of the spec's open question
//! (a): the concrete thresholds below are this implementation's choice, not
//! a value recovered from an original source.
//!
//! Field scanning for `amount` and batch-size signals recurses through the
//! full `args` tree rather than only top-level keys, since the spec
//! describes "any amount-bearing field" generically (§4.5); the same
//! recursive walk is reused, not duplicated, by [`crate::constraints`].

use gatekeeper_core::ReasonCode;
use gatekeeper_core::RiskTier;
use gatekeeper_core::manifest::DataClass;
use gatekeeper_core::manifest::ResourceScope;
use gatekeeper_core::manifest::RiskProfile;
use gatekeeper_core::request::Environment;
use serde_json::Value;

/// Points contributed by each additive signal. Fixed thresholds bucket the
/// resulting score into a tier (open question (a): exact numbers are this
/// implementation's choice, recorded in `DESIGN.md`).
mod points {
    /// `risk_profile.money_movement` is set.
    pub const MONEY_MOVEMENT: u32 = 3;
    /// `risk_profile.privilege_change` is set.
    pub const PRIVILEGE_CHANGE: u32 = 3;
    /// `risk_profile.irreversible` is set.
    pub const IRREVERSIBLE: u32 = 2;
    /// `risk_profile.bulk_operation` is set.
    pub const BULK_OPERATION: u32 = 1;
    /// `resource_scope` is `tenant`.
    pub const SCOPE_TENANT: u32 = 1;
    /// `resource_scope` is `global`.
    pub const SCOPE_GLOBAL: u32 = 2;
    /// `data_class` is `confidential`.
    pub const DATA_CONFIDENTIAL: u32 = 1;
    /// `data_class` is `restricted`.
    pub const DATA_RESTRICTED: u32 = 2;
    /// `environment` is `production`.
    pub const PRODUCTION: u32 = 1;
    /// Any amount-bearing field in `args` exceeds [`AMOUNT_THRESHOLD`].
    pub const AMOUNT_OVER_THRESHOLD: u32 = 2;
    /// Any batch-size-bearing field or array in `args` exceeds [`BATCH_THRESHOLD`].
    pub const BATCH_OVER_THRESHOLD: u32 = 1;
}

/// Amount, in the currency-agnostic units the manifest's arguments use,
/// above which the `AMOUNT_OVER_THRESHOLD` signal fires.
const AMOUNT_THRESHOLD: f64 = 10_000.0;
/// Batch size above which the `BATCH_OVER_THRESHOLD` signal fires.
const BATCH_THRESHOLD: u64 = 25;

/// Score boundary at or above which the tier is `MEDIUM`.
const MEDIUM_THRESHOLD: u32 = 2;
/// Score boundary at or above which the tier is `HIGH`.
const HIGH_THRESHOLD: u32 = 5;
/// Score boundary at or above which the tier is `CRITICAL`.
const CRITICAL_THRESHOLD: u32 = 8;

/// Field names recognized as amount-bearing, per spec §4.6 (shared with the
/// Constraint Evaluator's `max_amount` check).
pub const AMOUNT_FIELDS: &[&str] = &["amount", "value", "total", "sum"];
/// Field names recognized as batch-size-bearing, per spec §4.6 (shared with
/// the Constraint Evaluator's `max_batch_size` check).
pub const BATCH_SIZE_FIELDS: &[&str] = &["limit", "batch_size", "count", "size"];

/// The tier plus the reason codes for every signal that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskTierResult {
    /// The computed, routing-only tier.
    pub tier: RiskTier,
    /// One reason code per contributing signal, in evaluation order.
    pub reasons: Vec<ReasonCode>,
}

/// Computes the risk tier for one evaluation (spec §4.5).
#[must_use]
pub fn compute(risk_profile: &RiskProfile, args: &Value, environment: Environment) -> RiskTierResult {
    let mut score = 0u32;
    let mut reasons = Vec::new();

    let mut add = |points: u32, code: &'static str| {
        score += points;
        reasons.push(ReasonCode::new(code));
    };

    if risk_profile.money_movement {
        add(points::MONEY_MOVEMENT, "risk_money_movement");
    }
    if risk_profile.privilege_change {
        add(points::PRIVILEGE_CHANGE, "risk_privilege_change");
    }
    if risk_profile.irreversible {
        add(points::IRREVERSIBLE, "risk_irreversible");
    }
    if risk_profile.bulk_operation {
        add(points::BULK_OPERATION, "risk_bulk_operation");
    }
    match risk_profile.resource_scope {
        ResourceScope::Tenant => add(points::SCOPE_TENANT, "risk_scope_tenant"),
        ResourceScope::Global => add(points::SCOPE_GLOBAL, "risk_scope_global"),
        ResourceScope::Single => {}
    }
    match risk_profile.data_class {
        DataClass::Confidential => add(points::DATA_CONFIDENTIAL, "risk_data_confidential"),
        DataClass::Restricted => add(points::DATA_RESTRICTED, "risk_data_restricted"),
        DataClass::Public | DataClass::Internal => {}
    }
    if environment == Environment::Production {
        add(points::PRODUCTION, "risk_production");
    }
    if max_numeric_field(args, AMOUNT_FIELDS).is_some_and(|value| value > AMOUNT_THRESHOLD) {
        add(points::AMOUNT_OVER_THRESHOLD, "risk_amount_over_threshold");
    }
    if batch_size_over_threshold(args, BATCH_THRESHOLD) {
        add(points::BATCH_OVER_THRESHOLD, "risk_batch_over_threshold");
    }

    let computed = bucket(score);
    let tier = risk_profile.base_risk_tier.map_or(computed, |declared| declared.max(computed));

    RiskTierResult { tier, reasons }
}

/// Buckets an integer score into a discrete tier by fixed thresholds.
const fn bucket(score: u32) -> RiskTier {
    if score >= CRITICAL_THRESHOLD {
        RiskTier::Critical
    } else if score >= HIGH_THRESHOLD {
        RiskTier::High
    } else if score >= MEDIUM_THRESHOLD {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Recursively scans `value` for the largest numeric leaf found under any
/// key in `field_names`, at any depth. Shared with [`crate::constraints`]'s
/// `max_amount` check, which applies the same field-name convention against
/// a manifest-supplied cap instead of the fixed [`AMOUNT_THRESHOLD`].
pub(crate) fn max_numeric_field(value: &Value, field_names: &[&str]) -> Option<f64> {
    let mut best: Option<f64> = None;
    walk_numeric_fields(value, field_names, &mut best);
    best
}

/// Depth-first walk accumulating the maximum matching numeric field value.
fn walk_numeric_fields(value: &Value, field_names: &[&str], best: &mut Option<f64>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if field_names.contains(&key.as_str())
                    && let Some(number) = nested.as_f64()
                {
                    *best = Some(best.map_or(number, |current| current.max(number)));
                }
                walk_numeric_fields(nested, field_names, best);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_numeric_fields(item, field_names, best);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// True when any batch-size-labeled numeric field, or any array found
/// anywhere in `value`, exceeds `threshold` (spec §4.6's "batch-size field
/// ... or array-valued field" reconciled as: check both).
fn batch_size_over_threshold(value: &Value, threshold: u64) -> bool {
    match value {
        Value::Object(map) => map.values().any(|nested| {
            let field_exceeds = map.iter().any(|(key, inner)| {
                BATCH_SIZE_FIELDS.contains(&key.as_str())
                    && inner.as_u64().is_some_and(|count| count > threshold)
            });
            field_exceeds || batch_size_over_threshold(nested, threshold)
        }),
        Value::Array(items) => {
            items.len() as u64 > threshold || items.iter().any(|item| batch_size_over_threshold(item, threshold))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
    }
}
