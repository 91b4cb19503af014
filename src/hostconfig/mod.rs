//! Editor host configuration entry for this server (`.vscode/mcp.json` layout).

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct HostServerEntry {
    #[serde(rename = "type")]
    pub transport: String,
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl HostServerEntry {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: "stdio".to_string(),
            command: command.into(),
            args,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// `{"servers": {name: entry}}`, ready to merge into a host config file.
pub fn host_config(name: &str, entry: &HostServerEntry) -> Value {
    json!({ "servers": { name: entry } })
}
