// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `path -> ToolDefinition` map (Design Notes §9: "dynamic tool map").
//! Read-mostly: registration swaps a single entry under a lock; lookups
//! never block a writer for longer than a map insert.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::tool::{ApprovalMode, ToolDefinition, ToolError, ToolHandler, ToolRunContext};

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolDefinition>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverHit {
    pub path: String,
    pub description: String,
    pub approval: &'static str,
    pub score: i64,
}

impl ToolRegistry {
    /// Builds a registry seeded with the built-in `discover` tool.
    pub fn new() -> Arc<Self> {
        let registry = Arc::new(Self {
            tools: RwLock::new(HashMap::new()),
        });
        registry.register(ToolDefinition {
            path: "discover".to_string(),
            description: "Find tool paths matching a natural-language query".to_string(),
            approval: ApprovalMode::Auto,
            source: None,
            metadata: None,
            credential_spec: None,
            handler: Arc::new(DiscoverToolHandler {
                registry: Arc::downgrade(&registry),
            }),
        });
        registry
    }

    pub fn register(&self, definition: ToolDefinition) {
        self.tools
            .write()
            .expect("tool registry lock poisoned")
            .insert(definition.path.clone(), definition);
    }

    pub fn get(&self, path: &str) -> Option<ToolDefinition> {
        self.tools.read().expect("tool registry lock poisoned").get(path).cloned()
    }

    /// Stable-by-path enumeration: callers may rely on lexicographic order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut defs: Vec<ToolDefinition> = tools.values().cloned().collect();
        defs.sort_by(|a, b| a.path.cmp(&b.path));
        defs
    }

    /// Deterministic ranking: token overlap between `query` and a tool's
    /// path/description, path-segment exact matches, and a namespace-hint
    /// bonus for matching the tool's first path segment. Ties broken
    /// lexicographically by path.
    pub fn discover(&self, query: &str) -> Vec<DiscoverHit> {
        let query_tokens: Vec<String> = tokenize(query);
        let mut hits: Vec<DiscoverHit> = self
            .list()
            .into_iter()
            .map(|def| {
                let score = score_tool(&query_tokens, &def);
                DiscoverHit {
                    path: def.path,
                    description: def.description,
                    approval: match def.approval {
                        ApprovalMode::Auto => "auto",
                        ApprovalMode::Required => "required",
                    },
                    score,
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        hits
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

fn score_tool(query_tokens: &[String], def: &ToolDefinition) -> i64 {
    let path_segments: Vec<String> = def.path.split('.').map(|s| s.to_lowercase()).collect();
    let description_tokens = tokenize(&def.description);

    let mut score = 0i64;
    for token in query_tokens {
        if description_tokens.contains(token) {
            score += 1;
        }
        if path_segments.contains(token) {
            score += 2;
        }
    }
    if let Some(namespace) = path_segments.first() {
        if query_tokens.iter().any(|t| t == namespace) {
            score += 3;
        }
    }
    score
}

struct DiscoverToolHandler {
    registry: Weak<ToolRegistry>,
}

#[async_trait]
impl ToolHandler for DiscoverToolHandler {
    async fn run(&self, input: Value, _ctx: &ToolRunContext) -> Result<Value, ToolError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::Failed("discover requires a string `query`".to_string()))?;
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| ToolError::Failed("tool registry no longer available".to_string()))?;
        let hits = registry.discover(query);
        serde_json::to_value(hits).map_err(|e| ToolError::Failed(e.to_string()))
    }
}
