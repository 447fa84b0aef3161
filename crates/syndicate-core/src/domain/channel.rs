//! Channel: configuration of one external distribution target.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::ChannelId;

/// Platform family a channel belongs to. Dispatch resolves the platform
/// adapter by kind, so several channels can share one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelKind(String);

impl ChannelKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One external distribution target.
///
/// Connection details stay flexible JSON — they belong to the platform
/// adapter, not the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,

    #[serde(default)]
    pub config: serde_json::Value,

    /// Inactive channels are skipped by bulk distribution.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Channel {
    pub fn new(id: ChannelId, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            config: serde_json::Value::Null,
            active: true,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}
