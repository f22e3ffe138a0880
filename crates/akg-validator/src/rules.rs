//! Domain rule registry.
//!
//! A domain rule is a named, pure predicate over a property map. Rules are
//! grouped under a key, which is a node label or an edge type. The registry
//! is an ordinary value built up front and handed to the pipeline; there is
//! no process-wide rule state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Predicate signature. Plain `fn`, so a rule cannot capture state.
pub type RulePredicate = fn(&Map<String, Value>) -> bool;

/// A named predicate with the message reported when it rejects.
#[derive(Clone)]
pub struct DomainRule {
    name: String,
    error_message: String,
    predicate: RulePredicate,
}

impl DomainRule {
    pub fn new(
        name: impl Into<String>,
        error_message: impl Into<String>,
        predicate: RulePredicate,
    ) -> Self {
        Self {
            name: name.into(),
            error_message: error_message.into(),
            predicate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn validate(&self, properties: &Map<String, Value>) -> RuleOutcome {
        if (self.predicate)(properties) {
            RuleOutcome::Ok
        } else {
            RuleOutcome::Violation(RuleViolation {
                rule: self.name.clone(),
                message: self.error_message.clone(),
            })
        }
    }
}

impl fmt::Debug for DomainRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainRule")
            .field("name", &self.name)
            .field("error_message", &self.error_message)
            .finish()
    }
}

/// A rejected property map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule: String,
    pub message: String,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)
    }
}

/// Result of running one rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    Ok,
    Violation(RuleViolation),
}

impl RuleOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RuleOutcome::Ok)
    }
}

/// Something that contributes rules for one key.
pub trait RuleProvider {
    /// Label or edge type the rules apply to.
    fn key(&self) -> &str;

    fn rules(&self) -> Vec<DomainRule>;
}

/// A fixed list of rules under one key.
#[derive(Clone, Debug)]
pub struct RuleSet {
    key: String,
    rules: Vec<DomainRule>,
}

impl RuleSet {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(
        mut self,
        name: impl Into<String>,
        error_message: impl Into<String>,
        predicate: RulePredicate,
    ) -> Self {
        self.rules.push(DomainRule::new(name, error_message, predicate));
        self
    }
}

impl RuleProvider for RuleSet {
    fn key(&self) -> &str {
        &self.key
    }

    fn rules(&self) -> Vec<DomainRule> {
        self.rules.clone()
    }
}

/// Rules grouped by key.
#[derive(Clone, Debug, Default)]
pub struct RuleRegistry {
    keys: Vec<String>,
    rules: HashMap<String, Vec<DomainRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register providers in iteration order. A later provider with the
    /// same key replaces an earlier one.
    pub fn from_providers<I, P>(providers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: RuleProvider,
    {
        let mut registry = Self::new();
        for provider in providers {
            registry.register(provider.key(), provider.rules());
        }
        registry
    }

    /// Install `rules` under `key`, replacing whatever was there.
    pub fn register(&mut self, key: impl Into<String>, rules: Vec<DomainRule>) {
        let key = key.into();
        if !self.rules.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.rules.insert(key, rules);
    }

    /// Rules for `key` in registration order; empty for unknown keys.
    pub fn rules_for(&self, key: &str) -> &[DomainRule] {
        self.rules.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Registered keys in first-registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Run every rule for `key` and collect all violations.
    pub fn evaluate(&self, key: &str, properties: &Map<String, Value>) -> Vec<RuleViolation> {
        self.rules_for(key)
            .iter()
            .filter_map(|rule| match rule.validate(properties) {
                RuleOutcome::Ok => None,
                RuleOutcome::Violation(v) => Some(v),
            })
            .collect()
    }
}
