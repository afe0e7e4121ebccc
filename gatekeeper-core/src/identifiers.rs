// gatekeeper-core/src/identifiers.rs
// ============================================================================
// Module: Gatekeeper Identifiers
// Description: Strongly typed, serializable identifiers with stable string forms.
// Purpose: Prevent mixing tenant/action/request identifiers at compile time.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! the pipeline. Identifiers are opaque and serialize as plain strings.
//! Validation beyond non-emptiness is handled at the Canonicalizer boundary
//! rather than within these simple wrappers.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Declares a newtype string identifier with the shared construction API.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true when the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifies the tenant an evaluation is scoped to.
    TenantId
);

string_id!(
    /// Identifies the principal (agent or service) acting on behalf of a tenant.
    PrincipalId
);

string_id!(
    /// Stable identifier of a tool regardless of version, e.g. `transfer_funds`.
    ActionId
);

string_id!(
    /// Identifies a single evaluation request, assigned by the caller or the orchestrator.
    RequestId
);

string_id!(
    /// Identifies the audit record produced for a single evaluation.
    AuditId
);

string_id!(
    /// Hex-encoded SHA-256 fingerprint of a tool's canonical argument schema.
    SchemaHash
);

string_id!(
    /// Identifies a toolset bound to a principal.
    ToolsetId
);

string_id!(
    /// Identifies one of the fixed alignment quorum voters.
    VoterId
);

impl RequestId {
    /// Generates a fresh, randomly assigned request identifier.
    ///
    /// Used by the Canonicalizer (S0) when the caller did not supply one.
    /// Unlike the teacher's sequential per-scenario counters, each
    /// evaluation here is independent and stateless, so identifiers are
    /// drawn from a random source rather than a shared sequence.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl AuditId {
    /// Generates a fresh audit record identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
