// gatekeeper-pipeline/src/config.rs
// ============================================================================
// Module: Pipeline Configuration
// Description: Immutable configuration record read once at process startup.
// Purpose: Give every stage its timeouts, caps, and feature flags from a
//          single TOML file with environment-variable overrides, per
//          spec §6's "read once at startup, reconfiguration requires a
//          restart" contract.
// Dependencies: serde, std::{env, fs}, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits, the
//! same fail-closed posture as the teacher's own config loader: missing or
//! invalid configuration is an error, never a silent default for the file
//! itself (individual *keys* inside a present file still default sanely,
//! per-field, via `#[serde(default)]`). Every key below is read exactly
//! once; nothing here is mutated after [`PipelineConfig::load`] returns.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "gatekeeper-pipeline.toml";
/// Environment variable used to override the config path.
const CONFIG_ENV_VAR: &str = "GATEKEEPER_PIPELINE_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

/// Failures while loading or validating [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// I/O failure while reading the configuration file.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data (size limit, out-of-range value).
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The pipeline's immutable startup configuration (spec §6.3 / §9
/// "read once at startup into an immutable configuration record").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum accepted request body size, in bytes. Enforced upstream of
    /// the core (spec §4.2, last bullet); carried here only so a caller
    /// wiring the HTTP boundary has one place to read it from.
    pub request_byte_cap: usize,
    /// Maximum character length of `user_intent` after truncation.
    pub intent_char_cap: usize,
    /// Total character budget shared across bounded-context items.
    pub context_char_cap: usize,
    /// Maximum number of compiled schemas held in the Schema Validator's
    /// LRU cache.
    pub schema_cache_capacity: usize,
    /// Optional time-to-live applied on top of LRU eviction, in seconds.
    pub schema_cache_ttl_secs: u64,
    /// Per-voter deadline for the Intent Alignment Quorum, in milliseconds.
    pub voter_timeout_ms: u64,
    /// Overall per-evaluation deadline owned by the Orchestrator, in milliseconds.
    pub evaluation_deadline_ms: u64,
    /// Feature flag gating the Threat Sentinel (S5).
    pub enable_threat_sentinel: bool,
    /// Feature flag gating the Policy Arbiter (S6) and Policy Gate Pass 2 (S7).
    pub enable_policy_arbiter: bool,
    /// Bound on concurrent in-flight requests per judge endpoint.
    pub judge_max_inflight: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_byte_cap: 262_144,
            intent_char_cap: 2_000,
            context_char_cap: 8_000,
            schema_cache_capacity: 512,
            schema_cache_ttl_secs: 3_600,
            voter_timeout_ms: 1_500,
            evaluation_deadline_ms: 30_000,
            enable_threat_sentinel: true,
            enable_policy_arbiter: true,
            judge_max_inflight: 32,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from disk using the default resolution rules,
    /// then applies per-key environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing, oversized, not
    /// valid UTF-8, fails to parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `GATEKEEPER_PIPELINE_<KEY>` overrides, one per field, atop
    /// whatever the TOML file supplied.
    fn apply_env_overrides(&mut self) {
        override_usize(&mut self.request_byte_cap, "GATEKEEPER_PIPELINE_REQUEST_BYTE_CAP");
        override_usize(&mut self.intent_char_cap, "GATEKEEPER_PIPELINE_INTENT_CHAR_CAP");
        override_usize(&mut self.context_char_cap, "GATEKEEPER_PIPELINE_CONTEXT_CHAR_CAP");
        override_usize(&mut self.schema_cache_capacity, "GATEKEEPER_PIPELINE_SCHEMA_CACHE_CAPACITY");
        override_u64(&mut self.schema_cache_ttl_secs, "GATEKEEPER_PIPELINE_SCHEMA_CACHE_TTL_SECS");
        override_u64(&mut self.voter_timeout_ms, "GATEKEEPER_PIPELINE_VOTER_TIMEOUT_MS");
        override_u64(&mut self.evaluation_deadline_ms, "GATEKEEPER_PIPELINE_EVALUATION_DEADLINE_MS");
        override_bool(&mut self.enable_threat_sentinel, "GATEKEEPER_PIPELINE_ENABLE_THREAT_SENTINEL");
        override_bool(&mut self.enable_policy_arbiter, "GATEKEEPER_PIPELINE_ENABLE_POLICY_ARBITER");
        override_usize(&mut self.judge_max_inflight, "GATEKEEPER_PIPELINE_JUDGE_MAX_INFLIGHT");
    }

    /// Validates internal consistency: every cap and timeout must be positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a configured value is zero.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_byte_cap == 0 {
            return Err(ConfigError::Invalid("request_byte_cap must be positive".to_string()));
        }
        if self.intent_char_cap == 0 {
            return Err(ConfigError::Invalid("intent_char_cap must be positive".to_string()));
        }
        if self.context_char_cap == 0 {
            return Err(ConfigError::Invalid("context_char_cap must be positive".to_string()));
        }
        if self.schema_cache_capacity == 0 {
            return Err(ConfigError::Invalid("schema_cache_capacity must be positive".to_string()));
        }
        if self.voter_timeout_ms == 0 {
            return Err(ConfigError::Invalid("voter_timeout_ms must be positive".to_string()));
        }
        if self.evaluation_deadline_ms == 0 {
            return Err(ConfigError::Invalid("evaluation_deadline_ms must be positive".to_string()));
        }
        if self.evaluation_deadline_ms < self.voter_timeout_ms {
            return Err(ConfigError::Invalid(
                "evaluation_deadline_ms must be at least voter_timeout_ms".to_string(),
            ));
        }
        if self.judge_max_inflight == 0 {
            return Err(ConfigError::Invalid("judge_max_inflight must be positive".to_string()));
        }
        Ok(())
    }
}

/// Resolves the config path from the explicit argument, the environment
/// variable, or the default filename, in that order.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(env_path);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Overrides a `usize` field from an environment variable, ignoring unset
/// or unparsable values.
fn override_usize(field: &mut usize, var: &str) {
    if let Ok(raw) = env::var(var)
        && let Ok(parsed) = raw.parse()
    {
        *field = parsed;
    }
}

/// Overrides a `u64` field from an environment variable, ignoring unset or
/// unparsable values.
fn override_u64(field: &mut u64, var: &str) {
    if let Ok(raw) = env::var(var)
        && let Ok(parsed) = raw.parse()
    {
        *field = parsed;
    }
}

/// Overrides a `bool` field from an environment variable, ignoring unset or
/// unparsable values.
fn override_bool(field: &mut bool, var: &str) {
    if let Ok(raw) = env::var(var)
        && let Ok(parsed) = raw.parse()
    {
        *field = parsed;
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineConfig;

    #[test]
    fn defaults_match_spec_table() {
        let config = PipelineConfig::default();
        assert_eq!(config.request_byte_cap, 262_144);
        assert_eq!(config.intent_char_cap, 2_000);
        assert_eq!(config.context_char_cap, 8_000);
        assert_eq!(config.schema_cache_capacity, 512);
        assert_eq!(config.schema_cache_ttl_secs, 3_600);
        assert_eq!(config.voter_timeout_ms, 1_500);
        assert_eq!(config.evaluation_deadline_ms, 30_000);
        assert!(config.enable_threat_sentinel);
        assert!(config.enable_policy_arbiter);
        assert_eq!(config.judge_max_inflight, 32);
    }

    #[test]
    fn rejects_zero_caps() {
        let mut config = PipelineConfig::default();
        config.intent_char_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_deadline_shorter_than_voter_timeout() {
        let mut config = PipelineConfig::default();
        config.evaluation_deadline_ms = 100;
        config.voter_timeout_ms = 1_500;
        assert!(config.validate().is_err());
    }
}
