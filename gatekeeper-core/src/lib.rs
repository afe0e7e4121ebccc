// gatekeeper-core/src/lib.rs
// ============================================================================
// Module: Gatekeeper Core Library
// Description: Public API surface for the Decision Pipeline core.
// Purpose: Expose the data model, canonical hashing, identifiers, the
//          Canonicalizer (S0), the Resolver (S1a), and the port traits the
//          orchestrator depends on.
// Dependencies: gatekeeper-logic, serde, serde_json, serde_jcs, sha2, thiserror,
//              time, uuid
// ============================================================================

//! ## Overview
//! `gatekeeper-core` owns the data model (§3 of the specification),
//! canonical JSON and schema fingerprinting (§4.1), the Canonicalizer (S0,
//! §4.2), the Resolver (S1a, §4.3), and the port traits every stage is
//! defined against (§6.1). [`resolver::InMemoryResolver`] is the one
//! concrete [`ports::ResolverPort`] this crate ships; it is a storage-agnostic
//! stand-in for the DynamoDB/S3-backed resolvers the specification treats as
//! external (§1). The remaining stages — Schema Validator, Risk Tierer,
//! Constraint Evaluator, Quorum, Threat Sentinel, Arbiter, Aggregator, Audit
//! Assembler, and the Orchestrator itself — live in `gatekeeper-pipeline`,
//! which depends on this crate.

pub mod audit;
pub mod canonicalizer;
pub mod decision;
pub mod hashing;
pub mod identifiers;
pub mod manifest;
pub mod ports;
pub mod reason;
pub mod request;
pub mod resolver;
pub mod stage_results;
pub mod toolset;

pub use audit::AuditRecord;
pub use audit::ResolvedTool;
pub use audit::StageOutputs;
pub use audit::StageTimings;
pub use canonicalizer::CanonicalizeError;
pub use canonicalizer::CanonicalizerLimits;
pub use canonicalizer::NormalizedRequest;
pub use canonicalizer::canonicalize;
pub use decision::Decision;
pub use decision::DecisionStage;
pub use decision::RiskTier;
pub use hashing::EncodingError;
pub use hashing::Fingerprint;
pub use hashing::canonical_json_bytes;
pub use hashing::canonical_json_string;
pub use hashing::sha256_fingerprint;
pub use hashing::sha256_hex;
pub use identifiers::ActionId;
pub use identifiers::AuditId;
pub use identifiers::PrincipalId;
pub use identifiers::RequestId;
pub use identifiers::SchemaHash;
pub use identifiers::TenantId;
pub use identifiers::ToolsetId;
pub use identifiers::VoterId;
pub use manifest::Constraints;
pub use manifest::DataClass;
pub use manifest::ResourceScope;
pub use manifest::RiskProfile;
pub use manifest::ToolManifest;
pub use ports::AuditError;
pub use ports::AuditSink;
pub use ports::Clock;
pub use ports::JudgeClient;
pub use ports::JudgeError;
pub use ports::NoopAuditSink;
pub use ports::PolicyEnginePort;
pub use ports::PolicyGateResponse;
pub use ports::ResolverError;
pub use ports::ResolverPort;
pub use ports::SystemClock;
pub use ports::Timestamp;
pub use reason::ReasonCode;
pub use request::Actor;
pub use request::BoundedContext;
pub use request::Environment;
pub use request::EvaluationRequest;
pub use request::ToolCall;
pub use resolver::InMemoryResolver;
pub use stage_results::AlignmentResult;
pub use stage_results::ArbiterFacts;
pub use stage_results::ConstraintsResult;
pub use stage_results::DerivedFact;
pub use stage_results::PolicyResult;
pub use stage_results::PolicyStatus;
pub use stage_results::QuorumOutcome;
pub use stage_results::ThreatLabel;
pub use stage_results::ThreatResult;
pub use stage_results::Vote;
pub use stage_results::VoterRecord;
pub use toolset::ToolRef;
pub use toolset::Toolset;
pub use toolset::ToolsetBinding;
