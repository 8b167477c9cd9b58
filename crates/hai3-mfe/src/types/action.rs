//! Actions and action chains.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Self-describing message addressed to a domain or an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The action's own type id.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Domain id or extension id.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Per-action timeout override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Action {
    pub fn new(action_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            target: target.into(),
            payload: None,
            timeout: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    /// `timeout` override, else the domain default.
    pub fn effective_timeout(&self, domain_default_ms: u64) -> Duration {
        Duration::from_millis(self.timeout.unwrap_or(domain_default_ms))
    }
}

/// Tree of actions with a success branch (`next`) and a failure branch
/// (`fallback`).
///
/// Nodes are owned by their parent, so a chain cannot reference itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsChain {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<ActionsChain>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Box<ActionsChain>>,
}

impl ActionsChain {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            next: None,
            fallback: None,
        }
    }

    pub fn with_next(mut self, next: ActionsChain) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    pub fn with_fallback(mut self, fallback: ActionsChain) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Longest root-to-leaf node count.
    pub fn depth(&self) -> usize {
        let next = self.next.as_ref().map_or(0, |n| n.depth());
        let fallback = self.fallback.as_ref().map_or(0, |f| f.depth());
        1 + next.max(fallback)
    }
}
