// gatekeeper-pipeline/src/schema_validator.rs
// ============================================================================
// Module: Schema Validator (S1b)
// Description: Lazily compiles and caches draft-2020-12 JSON Schemas,
//              validates canonicalized arguments against them.
// Purpose: Give every evaluation a fast, process-wide compiled-schema cache
//          keyed by (action_id, schema_hash), bounded by a size cap with
//          least-recently-used eviction (spec §4.4, §5).
// Dependencies: jsonschema, gatekeeper-core, std::sync::Mutex
// ============================================================================

//! ## Overview
//! Compilation is referentially transparent: two threads racing on a cold
//! key may both compile, but only one publishes — the loser's work is
//! simply discarded (spec §5, §9 "winner publishes, loser discards"). The
//! cache itself is a hand-rolled bounded LRU rather than a dedicated crate,
//! matching the rest of this crate's preference for small, auditable
//! concurrency primitives ([`crate::quorum`] uses the same posture for
//! voter dispatch).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use gatekeeper_core::ReasonCode;
use gatekeeper_core::reason::validation;
use jsonschema::Draft;
use jsonschema::Validator;
use jsonschema::ValidationErrorKind;
use serde_json::Value;

/// A cache key: the tool's stable identity plus the exact schema fingerprint
/// it was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    /// Stable tool identifier.
    action_id: String,
    /// Hex SHA-256 fingerprint of the schema this validator was compiled from.
    schema_hash: String,
}

/// A cached entry: the compiled validator plus a monotonic recency stamp
/// used to pick an eviction victim.
struct CacheEntry {
    /// The compiled schema.
    validator: Arc<Validator>,
    /// Strictly increasing counter; higher means more recently used.
    last_used: u64,
}

/// A single `{instance_path, message}` schema-validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON Pointer to the offending location in `args`.
    pub instance_path: String,
    /// The validator's own error message.
    pub message: String,
    /// Name of the missing property, set only when this violation comes
    /// from the schema's `required` keyword. The `jsonschema` crate reports
    /// such failures with `instance_path` pointing at the *containing
    /// object*, not the missing property itself, so the full pointer used
    /// in the reason code has to be built by appending this name to
    /// `instance_path` rather than trusting `instance_path` alone (spec
    /// §4.4, §8 scenario 2: `V_required_missing:/path`).
    missing_required_property: Option<String>,
}

impl SchemaViolation {
    /// Renders this violation as a structured reason code: a missing
    /// required property is `V_required_missing:/<path-to-object>/<prop>`
    /// (spec §7), with `<prop>` escaped per RFC 6901; every other schema
    /// failure falls back to `V_schema_mismatch:/pointer`.
    #[must_use]
    pub fn reason_code(&self) -> ReasonCode {
        match &self.missing_required_property {
            Some(property) => {
                let pointer = format!("{}/{}", self.instance_path, escape_pointer_token(property));
                ReasonCode::with_pointer(validation::REQUIRED_MISSING, &pointer)
            }
            None => ReasonCode::with_pointer(validation::SCHEMA_MISMATCH, &self.instance_path),
        }
    }
}

/// Escapes a single JSON Pointer reference token per RFC 6901 (`~` to `~0`,
/// `/` to `~1`), so a property name containing either character doesn't get
/// misread as two pointer segments.
fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Returns the missing property name when `kind` is the schema's `required`
/// keyword failing, so [`validate`] can build the pointer the `instance_path`
/// alone does not carry.
fn required_property_name(kind: &ValidationErrorKind) -> Option<String> {
    match kind {
        ValidationErrorKind::Required { property } => property.as_str().map(str::to_string),
        _ => None,
    }
}

/// A bounded, process-wide cache of compiled JSON Schemas.
///
/// # Invariants
/// - Never holds more than `capacity` entries; inserting past capacity
///   evicts the least-recently-used entry first.
pub struct SchemaCache {
    /// Maximum number of compiled schemas retained.
    capacity: usize,
    /// Guards the cache contents; held only for the short critical section
    /// around a lookup, insert, or touch (spec §5).
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl SchemaCache {
    /// Builds an empty cache bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a compiled validator for `(action_id, schema_hash)`,
    /// compiling and inserting it on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns the `jsonschema` build error, formatted, when `args_schema`
    /// itself is not a valid draft-2020-12 schema.
    pub fn get_or_compile(
        &self,
        action_id: &str,
        schema_hash: &str,
        args_schema: &Value,
    ) -> Result<Arc<Validator>, String> {
        let key = CacheKey {
            action_id: action_id.to_string(),
            schema_hash: schema_hash.to_string(),
        };

        {
            let mut guard = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(entry) = guard.get_mut(&key) {
                entry.last_used = next_tick(&guard);
                return Ok(Arc::clone(&entry.validator));
            }
        }

        let compiled = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(args_schema)
            .map_err(|err| format!("invalid schema: {err}"))?;
        let validator = Arc::new(compiled);

        let mut guard = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let tick = next_tick(&guard);
        if guard.len() >= self.capacity && !guard.contains_key(&key) {
            evict_oldest(&mut guard);
        }
        guard
            .entry(key)
            .or_insert(CacheEntry { validator: Arc::clone(&validator), last_used: tick });

        Ok(validator)
    }

    /// Returns the number of entries currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns one past the highest `last_used` stamp currently in the map.
fn next_tick(guard: &HashMap<CacheKey, CacheEntry>) -> u64 {
    guard.values().map(|entry| entry.last_used).max().map_or(0, |max| max + 1)
}

/// Removes the entry with the lowest `last_used` stamp.
fn evict_oldest(guard: &mut HashMap<CacheKey, CacheEntry>) {
    if let Some(victim) = guard
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(key, _)| key.clone())
    {
        guard.remove(&victim);
    }
}

/// Validates `args` against the compiled schema, returning every violation
/// found (spec §4.4: "emits a list of `{instance_path, message}` pairs").
#[must_use]
pub fn validate(validator: &Validator, args: &Value) -> Vec<SchemaViolation> {
    validator
        .iter_errors(args)
        .map(|err| SchemaViolation {
            instance_path: err.instance_path.to_string(),
            message: err.to_string(),
            missing_required_property: required_property_name(&err.kind),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SchemaCache;
    use super::validate;

    #[test]
    fn compiles_and_validates_required_field() {
        let cache = SchemaCache::new(4);
        let schema = json!({
            "type": "object",
            "required": ["path"],
            "properties": { "path": { "type": "string" } }
        });
        let validator = cache.get_or_compile("read_file", "hash-1", &schema).expect("compiles");
        let violations = validate(&validator, &json!({}));
        assert!(!violations.is_empty());
        assert_eq!(violations[0].reason_code().as_str(), "V_required_missing:/path");
    }

    #[test]
    fn required_pointer_includes_containing_object_path() {
        let cache = SchemaCache::new(4);
        let schema = json!({
            "type": "object",
            "properties": {
                "recipient": {
                    "type": "object",
                    "required": ["account_id"],
                    "properties": { "account_id": { "type": "string" } }
                }
            }
        });
        let validator = cache.get_or_compile("transfer_funds", "hash-2", &schema).expect("compiles");
        let violations = validate(&validator, &json!({"recipient": {}}));
        assert!(!violations.is_empty());
        assert_eq!(violations[0].reason_code().as_str(), "V_required_missing:/recipient/account_id");
    }

    #[test]
    fn reuses_cached_validator_for_same_key() {
        let cache = SchemaCache::new(4);
        let schema = json!({ "type": "object" });
        let _first = cache.get_or_compile("read_file", "hash-1", &schema).expect("compiles");
        assert_eq!(cache.len(), 1);
        let _second = cache.get_or_compile("read_file", "hash-1", &schema).expect("compiles");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used_entry_past_capacity() {
        let cache = SchemaCache::new(2);
        let schema = json!({ "type": "object" });
        cache.get_or_compile("a", "hash-a", &schema).expect("compiles");
        cache.get_or_compile("b", "hash-b", &schema).expect("compiles");
        cache.get_or_compile("a", "hash-a", &schema).expect("compiles");
        cache.get_or_compile("c", "hash-c", &schema).expect("compiles");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn rejects_malformed_schema() {
        let cache = SchemaCache::new(4);
        let schema = json!({ "type": "not-a-real-type" });
        assert!(cache.get_or_compile("bad", "hash-x", &schema).is_err());
    }
}
