// gatekeeper-pipeline/src/constraints.rs
// ============================================================================
// Module: Constraint Evaluator
// Description: Deterministic structural checks from the manifest's
//              constraint block, evaluated as an AND-tree of independent
//              checks over gatekeeper-logic's requirement algebra.
// Purpose: Reject calls violating env/role allow-lists, value caps,
//          required fields, or denied argument patterns (spec §4.6).
// Dependencies: gatekeeper-core, gatekeeper-logic, serde_json
// ============================================================================

//! ## Overview
//! Every check in a manifest's `constraints` block becomes one leaf of a
//! [`gatekeeper_logic::Requirement<ConstraintCheck>`] AND-tree, evaluated
//! with [`gatekeeper_logic::KleeneLogic`] via
//! `eval_tristate_with_trace`. Leaves here are two-valued (`True`/`False`;
//! `Unknown` never occurs — every check has enough evidence to decide), but
//! reusing the tri-state evaluator rather than `Requirement::eval` lets a
//! [`FirstFailureTrace`] observe every leaf in deterministic iteration
//! order, which is how "the first violated check's reason code" (spec
//! §4.6) is recovered even though the AND combinator itself does not
//! short-circuit in this evaluation mode.
//!
//! Field scanning for amount and batch-size checks reuses the same
//! recursive walk [`crate::risk_tier`] uses for its own additive signals,
//! rather than restricting to top-level `args` keys, since the spec
//! describes these as "any amount-bearing field" generically (§4.6).

use gatekeeper_core::ConstraintsResult;
use gatekeeper_core::ReasonCode;
use gatekeeper_core::manifest::Constraints;
use gatekeeper_core::reason::constraint;
use gatekeeper_logic::KleeneLogic;
use gatekeeper_logic::Requirement;
use gatekeeper_logic::RequirementTrace;
use gatekeeper_logic::TriStatePredicateEval;
use gatekeeper_logic::TriState;
use serde_json::Value;

use crate::risk_tier::AMOUNT_FIELDS;
use crate::risk_tier::BATCH_SIZE_FIELDS;
use crate::risk_tier::max_numeric_field;

/// One leaf of the constraint AND-tree. Each variant carries everything it
/// needs to evaluate itself against a [`ConstraintContext`] and to name its
/// own reason code on failure.
#[derive(Debug, Clone, PartialEq)]
enum ConstraintCheck {
    /// `environment` must be in this non-empty allow-list.
    EnvAllowed(Vec<String>),
    /// `environment` must not be in this deny-list.
    EnvDenied(Vec<String>),
    /// `actor.role` must be in this non-empty allow-list.
    RoleAllowed(Vec<String>),
    /// `actor.role` must not be in this deny-list.
    RoleDenied(Vec<String>),
    /// No amount-bearing field in `args` may exceed this cap.
    MaxAmount(f64),
    /// No batch-size-bearing field or array in `args` may exceed this cap.
    MaxBatchSize(u64),
    /// This dot-path into `args` must resolve to a non-null leaf.
    RequiredArgPath(String),
    /// This `field=value` or `field:contains:substring` pattern must not match.
    DeniedArgPattern(String),
}

impl ConstraintCheck {
    /// The reason code recorded when this check fails.
    fn reason_code(&self) -> ReasonCode {
        match self {
            Self::EnvAllowed(_) | Self::EnvDenied(_) => ReasonCode::new(constraint::ENV_DENIED),
            Self::RoleAllowed(_) | Self::RoleDenied(_) => ReasonCode::new(constraint::ROLE_DENIED),
            Self::MaxAmount(_) => ReasonCode::new(constraint::MAX_AMOUNT),
            Self::MaxBatchSize(_) => ReasonCode::new(constraint::MAX_BATCH_SIZE),
            Self::RequiredArgPath(_) => ReasonCode::new(constraint::MISSING_REQUIRED),
            Self::DeniedArgPattern(_) => ReasonCode::new(constraint::DENIED_PATTERN),
        }
    }
}

/// Read-only view a [`ConstraintCheck`] evaluates against.
pub struct ConstraintContext<'a> {
    /// Deployment environment label, lowercase (e.g. `"production"`).
    pub environment: &'a str,
    /// Actor role.
    pub role: &'a str,
    /// Proposed argument object.
    pub args: &'a Value,
}

impl TriStatePredicateEval for ConstraintCheck {
    type Reader<'a> = ConstraintContext<'a>;

    fn eval_row_tristate(&self, reader: &Self::Reader<'_>, _row: gatekeeper_logic::Row) -> TriState {
        let passed = match self {
            Self::EnvAllowed(allowed) => allowed.iter().any(|env| env == reader.environment),
            Self::EnvDenied(denied) => !denied.iter().any(|env| env == reader.environment),
            Self::RoleAllowed(allowed) => allowed.iter().any(|role| role == reader.role),
            Self::RoleDenied(denied) => !denied.iter().any(|role| role == reader.role),
            Self::MaxAmount(cap) => {
                max_numeric_field(reader.args, AMOUNT_FIELDS).is_none_or(|value| value <= *cap)
            }
            Self::MaxBatchSize(cap) => !any_batch_size_exceeds(reader.args, *cap),
            Self::RequiredArgPath(path) => resolve_dot_path(reader.args, path).is_some_and(|value| !value.is_null()),
            Self::DeniedArgPattern(pattern) => !pattern_matches_anywhere(reader.args, pattern),
        };
        TriState::from(passed)
    }
}

/// Records the first `False` leaf encountered during an AND evaluation, in
/// iteration order. Because `Requirement::And`'s tri-state evaluation
/// visits every leaf without short-circuiting, "first `False` seen" is
/// exactly "first violated check" as long as the tree is a flat AND over
/// independent leaves, which the constraint tree always is.
#[derive(Default)]
struct FirstFailureTrace {
    /// The first violated check's reason code, once one has been seen.
    first_violation: Option<ReasonCode>,
}

impl RequirementTrace<ConstraintCheck> for FirstFailureTrace {
    fn on_predicate_evaluated(&mut self, predicate: &ConstraintCheck, result: TriState) {
        if self.first_violation.is_none() && result == TriState::False {
            self.first_violation = Some(predicate.reason_code());
        }
    }
}

/// Builds the AND-tree of checks implied by a manifest's constraint block.
/// Absent lists and caps contribute no leaf (spec §4.6: empty allow-lists
/// impose no restriction).
fn build_tree(constraints: &Constraints) -> Requirement<ConstraintCheck> {
    let mut leaves = Vec::new();

    if !constraints.allowed_envs.is_empty() {
        leaves.push(Requirement::predicate(ConstraintCheck::EnvAllowed(constraints.allowed_envs.clone())));
    }
    if !constraints.denied_envs.is_empty() {
        leaves.push(Requirement::predicate(ConstraintCheck::EnvDenied(constraints.denied_envs.clone())));
    }
    if !constraints.allowed_roles.is_empty() {
        leaves.push(Requirement::predicate(ConstraintCheck::RoleAllowed(constraints.allowed_roles.clone())));
    }
    if !constraints.denied_roles.is_empty() {
        leaves.push(Requirement::predicate(ConstraintCheck::RoleDenied(constraints.denied_roles.clone())));
    }
    if let Some(cap) = constraints.max_amount {
        leaves.push(Requirement::predicate(ConstraintCheck::MaxAmount(cap)));
    }
    if let Some(cap) = constraints.max_batch_size {
        leaves.push(Requirement::predicate(ConstraintCheck::MaxBatchSize(cap)));
    }
    for path in &constraints.required_arg_paths {
        leaves.push(Requirement::predicate(ConstraintCheck::RequiredArgPath(path.clone())));
    }
    for pattern in &constraints.denied_arg_patterns {
        leaves.push(Requirement::predicate(ConstraintCheck::DeniedArgPattern(pattern.clone())));
    }

    Requirement::and(leaves)
}

/// Runs the Constraint Evaluator over one call (spec §4.6).
#[must_use]
pub fn evaluate(constraints: &Constraints, environment: &str, role: &str, args: &Value) -> ConstraintsResult {
    let tree = build_tree(constraints);
    let context = ConstraintContext { environment, role, args };
    let mut trace = FirstFailureTrace::default();
    let outcome = tree.eval_tristate_with_trace(&context, 0, &KleeneLogic, &mut trace);

    ConstraintsResult {
        passed: outcome != TriState::False,
        violation: if outcome == TriState::False { trace.first_violation } else { None },
    }
}

/// True when any batch-size-labeled numeric field, or any array, found
/// anywhere in `value` exceeds `cap`.
fn any_batch_size_exceeds(value: &Value, cap: u64) -> bool {
    match value {
        Value::Object(map) => {
            let field_exceeds = map.iter().any(|(key, inner)| {
                BATCH_SIZE_FIELDS.contains(&key.as_str()) && inner.as_u64().is_some_and(|count| count > cap)
            });
            field_exceeds || map.values().any(|nested| any_batch_size_exceeds(nested, cap))
        }
        Value::Array(items) => items.len() as u64 > cap || items.iter().any(|item| any_batch_size_exceeds(item, cap)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
    }
}

/// Resolves a dot-path (e.g. `"payee.account.id"`) into `value`, returning
/// `None` if any segment is missing.
fn resolve_dot_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

/// Parses and checks a single denied-argument pattern against every string
/// leaf found anywhere in `args`, recursively. Two forms are recognized
/// (spec §4.6): `field=value` (exact match) and `field:contains:substring`.
fn pattern_matches_anywhere(args: &Value, pattern: &str) -> bool {
    if let Some((field, expected)) = pattern.split_once('=') {
        return field_values(args, field).any(|actual| actual == expected);
    }
    if let Some((field, rest)) = pattern.split_once(':') {
        if let Some(substring) = rest.strip_prefix("contains:") {
            return field_values(args, field).any(|actual| actual.contains(substring));
        }
    }
    false
}

/// Yields every string value found anywhere under a key named `field`, at
/// any depth of `args`.
fn field_values<'a>(args: &'a Value, field: &'a str) -> impl Iterator<Item = &'a str> {
    let mut matches = Vec::new();
    collect_field_values(args, field, &mut matches);
    matches.into_iter()
}

/// Depth-first collector backing [`field_values`].
fn collect_field_values<'a>(value: &'a Value, field: &str, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if key == field
                    && let Some(text) = nested.as_str()
                {
                    out.push(text);
                }
                collect_field_values(nested, field, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_field_values(item, field, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use gatekeeper_core::manifest::Constraints;
    use gatekeeper_core::reason::constraint;
    use serde_json::json;

    use super::evaluate;

    #[test]
    fn passes_with_no_constraints_configured() {
        let result = evaluate(&Constraints::default(), "production", "ops", &json!({}));
        assert!(result.passed);
        assert!(result.violation.is_none());
    }

    #[test]
    fn denies_disallowed_environment() {
        let constraints = Constraints { allowed_envs: vec!["development".to_string()], ..Constraints::default() };
        let result = evaluate(&constraints, "production", "ops", &json!({}));
        assert!(!result.passed);
        assert_eq!(result.violation.expect("violation present").as_str(), constraint::ENV_DENIED);
    }

    #[test]
    fn denies_amount_over_cap() {
        let constraints = Constraints { max_amount: Some(10_000.0), ..Constraints::default() };
        let result = evaluate(&constraints, "production", "ops", &json!({"amount": 50_000}));
        assert!(!result.passed);
        assert_eq!(result.violation.expect("violation present").as_str(), constraint::MAX_AMOUNT);
    }

    #[test]
    fn denies_missing_required_path() {
        let constraints = Constraints { required_arg_paths: vec!["payee.account".to_string()], ..Constraints::default() };
        let result = evaluate(&constraints, "production", "ops", &json!({"payee": {}}));
        assert!(!result.passed);
        assert_eq!(result.violation.expect("violation present").as_str(), constraint::MISSING_REQUIRED);
    }

    #[test]
    fn denies_matching_pattern() {
        let constraints = Constraints {
            denied_arg_patterns: vec!["destination:contains:external".to_string()],
            ..Constraints::default()
        };
        let result = evaluate(&constraints, "production", "ops", &json!({"destination": "external-account-1"}));
        assert!(!result.passed);
        assert_eq!(result.violation.expect("violation present").as_str(), constraint::DENIED_PATTERN);
    }

    #[test]
    fn first_violation_reported_is_first_leaf_in_tree_order() {
        let constraints = Constraints {
            allowed_envs: vec!["development".to_string()],
            max_amount: Some(1.0),
            ..Constraints::default()
        };
        let result = evaluate(&constraints, "production", "ops", &json!({"amount": 1_000}));
        assert_eq!(result.violation.expect("violation present").as_str(), constraint::ENV_DENIED);
    }
}
