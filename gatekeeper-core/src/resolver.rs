// gatekeeper-core/src/resolver.rs
// ============================================================================
// Module: In-Memory Resolver (S1a)
// Description: A concrete ResolverPort walking the principal->toolset->
//              tool_ref->manifest chain, with tenant-scoped direct fallback.
// Purpose: Give the pipeline a real, storage-agnostic Resolver to run
//          against, rather than leaving the strategy chain unimplemented
//          behind the port (spec §4.3).
// Dependencies: std::collections::HashMap, crate::{identifiers, manifest,
//              ports, toolset}
// ============================================================================

//! ## Overview
//! [`InMemoryResolver`] is a plain in-process store keyed the way the
//! strategy chain itself is keyed: bindings by `(tenant, principal)`,
//! toolsets by `(toolset_id, revision)`, manifests reachable through a
//! toolset by `(action_id, version)` globally (spec §4.1: "`(action_id,
//! version)` uniquely identifies a manifest"), and a second,
//! tenant-scoped manifest table used only by the direct-lookup fallback
//! (strategy 2), since that path has no toolset to route through. A
//! DynamoDB/S3-backed `ResolverPort` is out of scope (spec §1); this one
//! is the in-process stand-in the rest of the pipeline actually runs
//! against.

use std::collections::HashMap;

use crate::identifiers::ActionId;
use crate::identifiers::PrincipalId;
use crate::identifiers::SchemaHash;
use crate::identifiers::TenantId;
use crate::identifiers::ToolsetId;
use crate::manifest::ToolManifest;
use crate::ports::ResolverError;
use crate::ports::ResolverPort;
use crate::toolset::Toolset;
use crate::toolset::ToolsetBinding;

/// A storage-agnostic, in-process [`ResolverPort`] implementing the
/// principal-first strategy chain directly (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolver {
    /// Active `(toolset_id, revision)` binding per `(tenant, principal)`.
    bindings: HashMap<(TenantId, PrincipalId), ToolsetBinding>,
    /// Immutable toolset contents keyed by `(toolset_id, revision)`.
    toolsets: HashMap<(ToolsetId, u64), Toolset>,
    /// Manifests reachable through a toolset entry, keyed globally by
    /// `(action_id, version)`.
    manifests: HashMap<(ActionId, String), ToolManifest>,
    /// Manifests reachable only via strategy 2's direct tenant lookup,
    /// keyed by `(tenant_id, action_id, version)`.
    tenant_manifests: HashMap<(TenantId, ActionId, String), ToolManifest>,
    /// When set, every call fails with [`ResolverError::StorageUnavailable`]
    /// regardless of what is stored, simulating a backing-store outage.
    storage_unavailable: bool,
}

impl InMemoryResolver {
    /// Builds an empty resolver with no bindings, toolsets, or manifests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a principal's active toolset binding.
    #[must_use]
    pub fn with_binding(mut self, binding: ToolsetBinding) -> Self {
        self.bindings.insert((binding.tenant_id.clone(), binding.principal_id.clone()), binding);
        self
    }

    /// Registers a toolset revision, reachable by any binding pointing at it.
    #[must_use]
    pub fn with_toolset(mut self, toolset: Toolset) -> Self {
        self.toolsets.insert((toolset.toolset_id.clone(), toolset.revision), toolset);
        self
    }

    /// Registers a manifest reachable through a toolset entry at
    /// `(action_id, version)`.
    #[must_use]
    pub fn with_manifest(mut self, manifest: ToolManifest) -> Self {
        self.manifests.insert((manifest.action_id.clone(), manifest.version.clone()), manifest);
        self
    }

    /// Registers a manifest reachable only through strategy 2's direct
    /// tenant-scoped lookup, independent of any toolset binding.
    #[must_use]
    pub fn with_tenant_manifest(mut self, tenant_id: TenantId, manifest: ToolManifest) -> Self {
        self.tenant_manifests
            .insert((tenant_id, manifest.action_id.clone(), manifest.version.clone()), manifest);
        self
    }

    /// Makes every subsequent `resolve` call fail with
    /// [`ResolverError::StorageUnavailable`], simulating a backing-store
    /// outage.
    #[must_use]
    pub fn with_storage_unavailable(mut self) -> Self {
        self.storage_unavailable = true;
        self
    }

    /// Strategy 1: principal-first lookup through the bound toolset.
    fn resolve_via_principal(
        &self,
        tenant_id: &TenantId,
        principal_id: &PrincipalId,
        action_id: &ActionId,
        version: Option<&str>,
    ) -> Result<ToolManifest, ResolverError> {
        let binding = self
            .bindings
            .get(&(tenant_id.clone(), principal_id.clone()))
            .ok_or_else(|| ResolverError::PrincipalHasNoToolset(principal_id.clone()))?;
        let toolset = self
            .toolsets
            .get(&(binding.toolset_id.clone(), binding.revision))
            .ok_or_else(|| ResolverError::PrincipalHasNoToolset(principal_id.clone()))?;
        let tool_ref = toolset
            .find(action_id)
            .ok_or_else(|| ResolverError::ToolNotInToolset(action_id.clone()))?;

        if let Some(requested) = version
            && requested != tool_ref.version
        {
            return Err(ResolverError::ToolNotFound(action_id.clone()));
        }

        self.manifests
            .get(&(action_id.clone(), tool_ref.version.clone()))
            .cloned()
            .ok_or_else(|| ResolverError::ToolNotFound(action_id.clone()))
    }

    /// Strategy 2: direct tenant-scoped manifest lookup, used only when no
    /// principal was supplied.
    fn resolve_via_tenant(&self, tenant_id: &TenantId, action_id: &ActionId, version: &str) -> Result<ToolManifest, ResolverError> {
        self.tenant_manifests
            .get(&(tenant_id.clone(), action_id.clone(), version.to_string()))
            .cloned()
            .ok_or_else(|| ResolverError::ToolNotFound(action_id.clone()))
    }
}

impl ResolverPort for InMemoryResolver {
    fn resolve(
        &self,
        tenant_id: &TenantId,
        principal_id: Option<&PrincipalId>,
        action_id: &ActionId,
        version: Option<&str>,
        schema_hash: Option<&SchemaHash>,
    ) -> Result<ToolManifest, ResolverError> {
        if self.storage_unavailable {
            return Err(ResolverError::StorageUnavailable("in-memory tool store unreachable".to_string()));
        }

        let manifest = match (principal_id, version) {
            (Some(principal_id), _) => self.resolve_via_principal(tenant_id, principal_id, action_id, version)?,
            (None, Some(version)) => self.resolve_via_tenant(tenant_id, action_id, version)?,
            (None, None) => return Err(ResolverError::ToolNotFound(action_id.clone())),
        };

        if let Some(expected_hash) = schema_hash
            && &manifest.schema_hash != expected_hash
        {
            return Err(ResolverError::VersionMismatch(action_id.clone()));
        }

        Ok(manifest)
    }
}
