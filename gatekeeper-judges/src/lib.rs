// gatekeeper-judges/src/lib.rs
// ============================================================================
// Module: Gatekeeper Judges Library
// Description: Public API surface for the judge-calling adapters.
// Purpose: Give the Quorum, Threat Sentinel, and Policy Arbiter stages a
//          single concrete `JudgeClient` implementation, bounded in
//          concurrency and wall-clock time per call.
// Dependencies: gatekeeper-core, reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `gatekeeper-judges` adapts [`gatekeeper_core::JudgeClient`] to HTTP calls
//! against OpenAI-compatible chat-completion endpoints. It is the only crate
//! in the workspace that makes a network call; `gatekeeper-pipeline`
//! constructs one [`HttpJudgeClient`] per configured voter/sentinel/arbiter
//! endpoint and wires it into the orchestrator behind the port trait.

pub mod http;
pub mod limiter;

pub use http::HttpJudgeClient;
pub use limiter::ConcurrencyLimiter;
pub use limiter::LimiterPermit;
