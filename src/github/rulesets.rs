//! Repository ruleset payloads and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RepoUtilsError, Result};
use crate::github::GitHubClient;

/// What a ruleset applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RulesetTarget {
    #[default]
    Branch,
    Tag,
    Push,
}

/// Whether the ruleset is enforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    Disabled,
    Active,
    Evaluate,
}

/// An actor allowed to bypass the ruleset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BypassActor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<u64>,
    pub actor_type: String,
    pub bypass_mode: String,
}

/// Ref names the ruleset targets, e.g. `~DEFAULT_BRANCH`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RefNameCondition {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RulesetConditions {
    pub ref_name: RefNameCondition,
}

/// A single rule. Parameters vary per rule type and pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RulesetRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// A branch-protection ruleset as accepted by `POST /repos/{owner}/{repo}/rulesets`.
///
/// # Example JSON
///
/// ```json
/// {
///   "name": "default branch protections",
///   "target": "branch",
///   "enforcement": "active",
///   "conditions": { "ref_name": { "include": ["~DEFAULT_BRANCH"], "exclude": [] } },
///   "rules": [{ "type": "deletion" }, { "type": "non_fast_forward" }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Ruleset {
    pub name: String,
    #[serde(default)]
    pub target: RulesetTarget,
    pub enforcement: Enforcement,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bypass_actors: Vec<BypassActor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<RulesetConditions>,
    #[serde(default)]
    pub rules: Vec<RulesetRule>,
}

impl Ruleset {
    /// Load and validate a ruleset from a JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RepoUtilsError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let ruleset: Ruleset = serde_json::from_str(&content).map_err(|e| {
            RepoUtilsError::InvalidConfig(format!(
                "Failed to parse ruleset {}: {}",
                path.display(),
                e
            ))
        })?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// Reject rulesets GitHub would refuse or that would do nothing.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RepoUtilsError::InvalidConfig("Ruleset name is empty".into()));
        }
        if self.rules.is_empty() {
            return Err(RepoUtilsError::InvalidConfig(format!(
                "Ruleset '{}' has no rules",
                self.name
            )));
        }
        if let Some(rule) = self.rules.iter().find(|r| r.rule_type.trim().is_empty()) {
            return Err(RepoUtilsError::InvalidConfig(format!(
                "Ruleset '{}' has a rule without a type: {:?}",
                self.name, rule
            )));
        }
        Ok(())
    }
}

/// The subset of the created ruleset returned by the API that we report on.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRuleset {
    pub id: u64,
    pub name: String,
}

/// Ruleset operations.
pub trait RulesetOps {
    /// Create a ruleset on a repository.
    fn create_ruleset(&self, owner: &str, repo: &str, ruleset: &Ruleset) -> Result<CreatedRuleset>;
}

impl RulesetOps for GitHubClient {
    fn create_ruleset(&self, owner: &str, repo: &str, ruleset: &Ruleset) -> Result<CreatedRuleset> {
        let endpoint = format!("/repos/{}/{}/rulesets", owner, repo);
        self.post(&endpoint, ruleset)
    }
}
