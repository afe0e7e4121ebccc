// gatekeeper-pipeline/src/arbiter.rs
// ============================================================================
// Module: Policy Arbiter (S6)
// Description: Strictly fact-finding judge call that resolves the fact keys
//              the Policy Gate (S3) requested.
// Purpose: Let S7 re-invoke the policy engine with derived facts merged in,
//          without the arbiter ever smuggling a decision past it (spec §4.10).
// Dependencies: gatekeeper-core, serde_json
// ============================================================================

//! ## Overview
//! The arbiter's contract is purity: it returns facts with a confidence and
//! an optional source label, never a vote or decision. Any `allow`, `deny`,
//! or `escalate`-shaped top-level field in the raw response is discarded
//! before the [`ArbiterFacts`] is constructed, and `decision_stripped` is set
//! so the audit record shows a judge tried to exceed its contract (spec
//! §4.10, §8 arbiter purity property). A judge/network failure here produces
//! no facts at all rather than a default judgment (spec §7: "for S6: no
//! facts derived") — S7 simply proceeds with the fact set unchanged, which
//! may itself cause `ESCALATE` via `REQUIRES_FACTS`.

use gatekeeper_core::ArbiterFacts;
use gatekeeper_core::DerivedFact;
use gatekeeper_core::JudgeClient;
use gatekeeper_core::request::BoundedContext;
use serde_json::Value;
use serde_json::json;

/// System-message perspective given to the arbiter judge call.
const SYSTEM_PROMPT: &str = "You are a fact-finding assistant supporting a policy decision for \
    an AI agent tool call. You will be given a list of fact keys. For each, determine its value \
    from the call's arguments and bounded context, with a confidence and an optional source \
    label. You must never render a decision, vote, or recommendation of any kind; only report \
    facts. Respond with a strict JSON object: \
    {\"derived_facts\": [{\"key\": string, \"value\": any, \"confidence\": number, \
    \"source\": string}], \"clauses_used\": [string], \"confidence\": number}.";

/// The call data and requested fact keys one arbiter invocation renders.
pub struct ArbiterInput<'a> {
    /// Stable tool identifier being proposed.
    pub action_id: &'a str,
    /// The caller's stated intent, post-canonicalization.
    pub user_intent: &'a str,
    /// Proposed argument object.
    pub args: &'a Value,
    /// Bounded prior context.
    pub bounded_context: &'a BoundedContext,
    /// Fact keys the Policy Gate (S3) requested, or implied by `fuzzy_context`.
    pub requested_fact_keys: &'a [String],
}

impl ArbiterInput<'_> {
    /// Renders the user-message body for the arbiter call.
    fn render(&self) -> String {
        json!({
            "action_id": self.action_id,
            "user_intent": self.user_intent,
            "args": self.args,
            "bounded_context": {
                "prior_utterances": self.bounded_context.prior_utterances,
                "document_snippets": self.bounded_context.document_snippets,
                "state": self.bounded_context.state,
            },
            "requested_fact_keys": self.requested_fact_keys,
        })
        .to_string()
    }
}

/// Keys whose presence in the raw response marks it as smuggling a decision
/// (spec §4.10: "refuse to accept `allow`/`deny`/`escalate` fields").
const DECISION_SHAPED_KEYS: [&str; 4] = ["allow", "deny", "escalate", "decision"];

/// Runs the Policy Arbiter (S6) over one call.
///
/// A transport failure or malformed response yields an empty
/// [`ArbiterFacts`] (spec §7: "for S6: no facts derived"); this is never
/// itself a denial, only an absence S7 may later turn into `ESCALATE` via
/// `REQUIRES_FACTS`.
#[must_use]
pub fn evaluate(judge: &dyn JudgeClient, input: &ArbiterInput<'_>, timeout_ms: u64) -> ArbiterFacts {
    let user_prompt = input.render();
    match judge.send(SYSTEM_PROMPT, &user_prompt, timeout_ms) {
        Ok(value) => parse_response(&value),
        Err(_) => ArbiterFacts::default(),
    }
}

/// Parses a raw judge response into [`ArbiterFacts`], stripping any
/// decision-shaped field and recording that it happened.
fn parse_response(value: &Value) -> ArbiterFacts {
    let Some(object) = value.as_object() else {
        return ArbiterFacts::default();
    };

    let decision_stripped = DECISION_SHAPED_KEYS.iter().any(|key| object.contains_key(*key));

    let derived_facts = object
        .get("derived_facts")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_fact).collect())
        .unwrap_or_default();
    let clauses_used = object
        .get("clauses_used")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let confidence = object.get("confidence").and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0);

    ArbiterFacts { derived_facts, clauses_used, confidence, decision_stripped }
}

/// Parses a single `derived_facts` entry, skipping any malformed element
/// rather than failing the whole response.
fn parse_fact(value: &Value) -> Option<DerivedFact> {
    let key = value.get("key")?.as_str()?.to_string();
    let fact_value = value.get("value").cloned().unwrap_or(Value::Null);
    let confidence = value.get("confidence").and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0);
    let source = value.get("source").and_then(Value::as_str).map(str::to_string);
    Some(DerivedFact { key, value: fact_value, confidence, source })
}
