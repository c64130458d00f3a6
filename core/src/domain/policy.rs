// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ids::{ActorId, ClientId, WorkspaceId};

/// A rule that overrides a tool's default approval mode within a
/// workspace/actor/client scope. Evaluated by `PolicyEngine`
/// (application layer); this module owns the data shape and the glob
/// matcher, kept pre-compiled so evaluation never re-parses a pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub id: uuid::Uuid,
    pub workspace_id: WorkspaceId,
    pub actor_id: Option<ActorId>,
    pub client_id: Option<ClientId>,
    pub tool_path_pattern: String,
    pub decision: PolicyDecision,
    pub priority: i32,
    pub argument_conditions: Vec<ArgumentCondition>,
    pub scope_type: Option<ScopeType>,
    pub target_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    RequireApproval,
    Deny,
}

impl PolicyDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::RequireApproval => "require_approval",
            PolicyDecision::Deny => "deny",
        }
    }

    fn strictness(self) -> u8 {
        match self {
            PolicyDecision::Allow => 0,
            PolicyDecision::RequireApproval => 1,
            PolicyDecision::Deny => 2,
        }
    }

    /// The stricter of two decisions (`deny` > `require_approval` > `allow`).
    /// Used to reconcile a tool's declared `approval` mode with whatever the
    /// `PolicyEngine` decided, so a policy can never loosen a tool that
    /// declares itself `required`.
    pub fn stricter(self, other: PolicyDecision) -> PolicyDecision {
        if self.strictness() >= other.strictness() {
            self
        } else {
            other
        }
    }
}

impl std::str::FromStr for PolicyDecision {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(PolicyDecision::Allow),
            "require_approval" => Ok(PolicyDecision::RequireApproval),
            "deny" => Ok(PolicyDecision::Deny),
            other => Err(PolicyError::InvalidDecision(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Account,
    Workspace,
    Organization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentCondition {
    pub key: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

impl ArgumentCondition {
    /// Only top-level keys of `input` are visible to a condition.
    pub fn matches(&self, input: &Value) -> bool {
        let actual = match input.get(&self.key) {
            Some(v) => v,
            None => return false,
        };

        match self.operator {
            ConditionOperator::Equals => actual == &self.value,
            ConditionOperator::NotEquals => actual != &self.value,
            ConditionOperator::Contains => stringify(actual).contains(&stringify(&self.value)),
            ConditionOperator::StartsWith => stringify(actual).starts_with(&stringify(&self.value)),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("invalid decision: {0}")]
    InvalidDecision(String),
}

/// Precompiled `*`-segment glob matcher for `tool_path_pattern`. `*`
/// matches exactly one path segment; two or more trailing `*` segments
/// match any suffix of one or more segments; any other segment must match
/// exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    segments: Vec<String>,
    terminal_wildcard: bool,
    /// A single trailing `*` consumes exactly one segment, same as any other
    /// wildcard segment. Recursive suffix matching (any number of trailing
    /// segments) only kicks in once the pattern carries more than one
    /// wildcard segment, e.g. `admin.*.*`.
    recursive_suffix: bool,
}

impl PathMatcher {
    pub fn compile(pattern: &str) -> Result<Self, PolicyError> {
        if pattern.is_empty() {
            return Err(PolicyError::InvalidPattern(pattern.to_string()));
        }
        let mut segments: Vec<String> = pattern.split('.').map(str::to_string).collect();
        let terminal_wildcard = segments.last().map(|s| s == "*").unwrap_or(false)
            && pattern.ends_with(".*")
            && segments.len() > 1;
        let wildcard_count = segments.iter().filter(|s| s.as_str() == "*").count();
        if terminal_wildcard {
            segments.pop();
        }
        Ok(Self {
            segments,
            terminal_wildcard,
            recursive_suffix: terminal_wildcard && wildcard_count > 1,
        })
    }

    pub fn matches(&self, tool_path: &str) -> bool {
        let parts: Vec<&str> = tool_path.split('.').collect();

        if self.terminal_wildcard {
            let length_ok = if self.recursive_suffix {
                parts.len() >= self.segments.len()
            } else {
                parts.len() == self.segments.len() + 1
            };
            if !length_ok {
                return false;
            }
        } else if parts.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(parts.iter())
            .all(|(pattern_seg, actual_seg)| pattern_seg == "*" || pattern_seg == actual_seg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_exact_path() {
        let m = PathMatcher::compile("admin.delete_data").unwrap();
        assert!(m.matches("admin.delete_data"));
        assert!(!m.matches("admin.delete_data.extra"));
        assert!(!m.matches("admin.read_data"));
    }

    #[test]
    fn single_wildcard_segment() {
        let m = PathMatcher::compile("admin.*").unwrap();
        assert!(m.matches("admin.delete_data"));
        assert!(!m.matches("admin.delete_data.extra"));
    }

    #[test]
    fn terminal_wildcard_matches_suffix() {
        let m = PathMatcher::compile("admin.*.*").unwrap();
        assert!(!m.matches("admin"));
    }

    #[test]
    fn argument_condition_contains() {
        let cond = ArgumentCondition {
            key: "path".into(),
            operator: ConditionOperator::Contains,
            value: Value::String("secrets".into()),
        };
        assert!(cond.matches(&serde_json::json!({"path": "/etc/secrets/db"})));
        assert!(!cond.matches(&serde_json::json!({"path": "/etc/config"})));
    }

    #[test]
    fn argument_condition_only_reads_top_level() {
        let cond = ArgumentCondition {
            key: "nested.key".into(),
            operator: ConditionOperator::Equals,
            value: Value::String("x".into()),
        };
        assert!(!cond.matches(&serde_json::json!({"nested": {"key": "x"}})));
    }
}
