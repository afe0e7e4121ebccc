// gatekeeper-core/src/toolset.rs
// ============================================================================
// Module: Toolset Binding
// Description: The single (toolset, revision) assignment a principal resolves
//              through, and the immutable toolset contents themselves.
// Purpose: Support the Resolver's principal-first lookup strategy.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A principal resolves to exactly one `(toolset_id, revision)` at a time
//! (spec §3: "single-valued. Changing it is a single write. The previous
//! binding is retained only in audit"). A `Toolset` at a given
//! `(toolset_id, revision)` is immutable; the Resolver never merges or
//! overlays toolset revisions.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ActionId;
use crate::identifiers::PrincipalId;
use crate::identifiers::TenantId;
use crate::identifiers::ToolsetId;

/// The single, current `(toolset_id, revision)` assigned to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsetBinding {
    /// Tenant the binding belongs to.
    pub tenant_id: TenantId,
    /// Principal the binding is assigned to.
    pub principal_id: PrincipalId,
    /// Bound toolset identifier.
    pub toolset_id: ToolsetId,
    /// Bound toolset revision.
    pub revision: u64,
}

/// A single tool entry within a toolset, pinning an exact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRef {
    /// Stable tool identifier regardless of version.
    pub action_id: ActionId,
    /// Version pinned by this toolset entry.
    pub version: String,
}

/// An immutable, versioned collection of tool references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolset {
    /// Toolset identifier.
    pub toolset_id: ToolsetId,
    /// Toolset revision; `(toolset_id, revision)` is immutable once published.
    pub revision: u64,
    /// Tool entries in this toolset revision.
    pub tools: Vec<ToolRef>,
}

impl Toolset {
    /// Finds the first entry matching the given action id, per the
    /// Resolver's "first entry with matching `action_id`" rule.
    #[must_use]
    pub fn find(&self, action_id: &ActionId) -> Option<&ToolRef> {
        self.tools.iter().find(|entry| &entry.action_id == action_id)
    }
}
