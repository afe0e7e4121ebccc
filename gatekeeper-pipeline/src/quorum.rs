// gatekeeper-pipeline/src/quorum.rs
// ============================================================================
// Module: Intent Alignment Quorum (S4)
// Description: Three distinct-perspective voters fanned out concurrently to
//              the alignment JudgeClient, aggregated by a fixed precedence
//              table.
// Purpose: Decide whether a proposed tool call is actually what the stated
//          user intent implies, from three independent angles (spec §4.8).
// Dependencies: gatekeeper-core, serde_json, std::{sync::mpsc, thread, time}
// ============================================================================

//! ## Overview
//! The three voters are fixed at compile time (spec §9, quorum fan-out note):
//! `literal_intent`, `scope_audit`, `preconditions`. Each is dispatched on its
//! own thread to the same [`JudgeClient`] with a distinct system-message
//! perspective; [`std::thread::scope`] joins all three before this stage
//! returns, matching the teacher's commitment to `reqwest::blocking` end to
//! end rather than introducing an async runtime for this one fan-out. A
//! per-voter `mpsc` channel with `recv_timeout` enforces the deadline without
//! the stage ever blocking past it: a voter that has not replied by its
//! deadline is coerced to `ABSTAIN` and its thread is left to finish (or
//! fail) on its own, unobserved.
//!
//! Voter output order in the returned [`AlignmentResult`] is always the fixed
//! `VOTERS` order, never completion order (spec §5, ordering guarantees).

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use gatekeeper_core::AlignmentResult;
use gatekeeper_core::JudgeClient;
use gatekeeper_core::QuorumOutcome;
use gatekeeper_core::VoterId;
use gatekeeper_core::Vote;
use gatekeeper_core::VoterRecord;
use gatekeeper_core::request::BoundedContext;
use serde_json::Value;
use serde_json::json;

/// One fixed voter: its stable id and the perspective it imposes via the
/// system message (spec §4.8: "differ only in the system-message perspective").
struct VoterSpec {
    /// Stable identifier, also used as the wire `voter_id`.
    id: &'static str,
    /// System-message perspective text.
    perspective: &'static str,
}

/// The three fixed voters, in the deterministic iteration order the audit
/// record and response always report them in.
const VOTERS: [VoterSpec; 3] = [
    VoterSpec {
        id: "literal_intent",
        perspective: "You are a literal-intent auditor for an AI agent tool call. \
            Judge only whether the proposed tool call literally implements what the \
            stated user intent asks for, word for word. Ignore whether the scope is \
            proportionate or whether preconditions are met; another reviewer covers \
            those. Respond with a strict JSON object: \
            {\"vote\": \"SAFE\"|\"DENY\"|\"ABSTAIN\", \"confidence\": number between 0 \
            and 1, \"reason_codes\": [string]}.",
    },
    VoterSpec {
        id: "scope_audit",
        perspective: "You are a scope auditor for an AI agent tool call. Judge only \
            whether the call's argument scope (amounts, recipients, resource breadth) \
            is proportionate to the stated user intent, not whether the action type \
            itself matches the intent or whether preconditions are met. Respond with a \
            strict JSON object: \
            {\"vote\": \"SAFE\"|\"DENY\"|\"ABSTAIN\", \"confidence\": number between 0 \
            and 1, \"reason_codes\": [string]}.",
    },
    VoterSpec {
        id: "preconditions",
        perspective: "You are a precondition auditor for an AI agent tool call. Judge \
            only whether the bounded prior context plausibly establishes the \
            prerequisites this call assumes (e.g. a balance was actually checked \
            before a transfer). Do not judge literal intent match or scope \
            proportionality. Respond with a strict JSON object: \
            {\"vote\": \"SAFE\"|\"DENY\"|\"ABSTAIN\", \"confidence\": number between 0 \
            and 1, \"reason_codes\": [string]}.",
    },
];

/// The evaluation data every voter receives identically in the user message;
/// only the system-message perspective varies between voters.
pub struct QuorumInput<'a> {
    /// Stable tool identifier being proposed.
    pub action_id: &'a str,
    /// The caller's stated intent, post-canonicalization.
    pub user_intent: &'a str,
    /// Proposed argument object.
    pub args: &'a Value,
    /// Bounded prior context.
    pub bounded_context: &'a BoundedContext,
}

impl QuorumInput<'_> {
    /// Renders the shared user-message body every voter receives.
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
        })
        .to_string()
    }
}

/// Runs the Intent Alignment Quorum (S4) over one call.
///
/// `timeout_ms` is the per-voter deadline already reconciled against the
/// evaluation's remaining overall deadline (spec §5: "the shorter of its own
/// per-voter deadline and the remaining overall deadline").
#[must_use]
pub fn evaluate(judge: &dyn JudgeClient, input: &QuorumInput<'_>, timeout_ms: u64) -> AlignmentResult {
    let user_prompt = input.render();
    let (tx, rx) = mpsc::channel::<VoterRecord>();

    thread::scope(|scope| {
        for voter in &VOTERS {
            let tx = tx.clone();
            let user_prompt = user_prompt.clone();
            scope.spawn(move || {
                let record = call_voter(judge, voter, &user_prompt, timeout_ms);
                // The receiver may already have moved on past its timeout window;
                // a failed send here just means nobody is listening any more.
                let _ = tx.send(record);
            });
        }
        drop(tx);

        let mut by_voter: std::collections::HashMap<&'static str, VoterRecord> = std::collections::HashMap::new();
        let deadline = Duration::from_millis(timeout_ms.saturating_add(50));
        loop {
            match rx.recv_timeout(deadline) {
                Ok(record) => {
                    by_voter.insert(voter_id_str(&record.voter_id), record);
                    if by_voter.len() == VOTERS.len() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        let voters: Vec<VoterRecord> = VOTERS
            .iter()
            .map(|voter| by_voter.remove(voter.id).unwrap_or_else(|| abstain_record(voter.id)))
            .collect();

        AlignmentResult {
            outcome: aggregate(&voters),
            voters,
        }
    })
}

/// Calls one voter's perspective against the shared [`JudgeClient`], coercing
/// any transport failure, malformed response, or timeout to `ABSTAIN` with
/// confidence `0` (spec §4.8, §7: "per-voter: coerced to ABSTAIN").
fn call_voter(judge: &dyn JudgeClient, voter: &VoterSpec, user_prompt: &str, timeout_ms: u64) -> VoterRecord {
    match judge.send(voter.perspective, user_prompt, timeout_ms) {
        Ok(value) => parse_voter_response(voter.id, &value),
        Err(_) => abstain_record(voter.id),
    }
}

/// Parses a raw judge response into a [`VoterRecord`], falling back to
/// `ABSTAIN` for any shape that does not match the wire contract (spec §6.2).
fn parse_voter_response(voter_id: &'static str, value: &Value) -> VoterRecord {
    let vote = match value.get("vote").and_then(Value::as_str) {
        Some("SAFE") => Vote::Safe,
        Some("DENY") => Vote::Deny,
        _ => return abstain_record(voter_id),
    };
    let confidence = value.get("confidence").and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0);
    let reason_codes = value
        .get("reason_codes")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    VoterRecord {
        voter_id: VoterId::new(voter_id),
        vote,
        confidence,
        reason_codes,
    }
}

/// Builds the coerced-`ABSTAIN` record used for any failure mode.
fn abstain_record(voter_id: &'static str) -> VoterRecord {
    VoterRecord {
        voter_id: VoterId::new(voter_id),
        vote: Vote::Abstain,
        confidence: 0.0,
        reason_codes: Vec::new(),
    }
}

/// Returns the static voter id string backing a [`VoterId`], for use as a
/// `HashMap` key against the fixed [`VOTERS`] table.
fn voter_id_str(voter_id: &VoterId) -> &'static str {
    VOTERS.iter().map(|voter| voter.id).find(|id| *id == voter_id.as_str()).unwrap_or("unknown")
}

/// Aggregates three voters' votes per the exact precedence table (spec §4.8):
/// 1. every voter `DENY` -> `DENY`
/// 2. any voter `DENY` -> `ESCALATE`
/// 3. any voter `ABSTAIN` -> `ESCALATE`
/// 4. every voter `SAFE` -> `SAFE`
/// 5. otherwise -> `ESCALATE`
///
/// Invariant under permutation of voters (spec §8, quorum aggregation
/// property): every rule here counts votes rather than inspecting position.
fn aggregate(voters: &[VoterRecord]) -> QuorumOutcome {
    let deny_count = voters.iter().filter(|voter| voter.vote == Vote::Deny).count();
    let abstain_count = voters.iter().filter(|voter| voter.vote == Vote::Abstain).count();
    let safe_count = voters.iter().filter(|voter| voter.vote == Vote::Safe).count();

    if deny_count == voters.len() {
        QuorumOutcome::Deny
    } else if deny_count > 0 {
        QuorumOutcome::Escalate
    } else if abstain_count > 0 {
        QuorumOutcome::Escalate
    } else if safe_count == voters.len() {
        QuorumOutcome::Safe
    } else {
        QuorumOutcome::Escalate
    }
}
