//! Pipeline configuration.

use akg_store::{DEFAULT_SCHEMA_VERSION, MAX_NAME_LEN};
use std::collections::HashSet;

/// Validator version stamped on attestations by default.
pub const DEFAULT_VALIDATOR_VERSION: &str = concat!("akg-validator/", env!("CARGO_PKG_VERSION"));

/// Configuration for the validator pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Schema version stamped on every attestation.
    pub schema_version: String,
    /// Validator version stamped on every attestation.
    pub validator_version: String,
    /// Maximum label / edge type length in characters.
    pub max_label_len: usize,
    /// Batches with at least this many records are hashed on several threads.
    pub parallel_threshold: usize,
    /// Rules whose violations mark a record as a warning instead of failing it.
    pub warning_rules: HashSet<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            validator_version: DEFAULT_VALIDATOR_VERSION.to_string(),
            max_label_len: MAX_NAME_LEN,
            parallel_threshold: 256,
            warning_rules: HashSet::new(),
        }
    }
}

impl PipelineConfig {
    pub fn is_warning(&self, rule: &str) -> bool {
        self.warning_rules.contains(rule)
    }
}

/// Builder for pipeline configuration.
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.config.schema_version = version.into();
        self
    }

    pub fn validator_version(mut self, version: impl Into<String>) -> Self {
        self.config.validator_version = version.into();
        self
    }

    /// Tighten the label length limit. Values above the store's own limit
    /// are clamped to it.
    pub fn max_label_len(mut self, max: usize) -> Self {
        self.config.max_label_len = max.min(MAX_NAME_LEN);
        self
    }

    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.config.parallel_threshold = threshold.max(1);
        self
    }

    pub fn warning_rule(mut self, rule: impl Into<String>) -> Self {
        self.config.warning_rules.insert(rule.into());
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
