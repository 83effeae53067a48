//! Ephemeral `.xctestplan` generation.
//!
//! The plan carries the test credentials as environment variables scoped to
//! the UI test target. It is written to a fixed path before the scheme is
//! pointed at it and deleted during cleanup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::config::{defaults, LaneConfig};
use crate::credentials::Credentials;

/// Reference to a test target inside a project container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReference {
    pub container_path: String,
    pub identifier: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfiguration {
    pub id: String,
    pub name: String,
    pub options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariableEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultOptions {
    pub environment_variable_entries: Vec<EnvironmentVariableEntry>,
    pub target_for_variable_expansion: TargetReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTarget {
    pub target: TargetReference,
}

/// An `.xctestplan` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlan {
    pub configurations: Vec<PlanConfiguration>,
    pub default_options: DefaultOptions,
    pub test_targets: Vec<TestTarget>,
    pub version: u32,
}

impl TestPlan {
    /// Build the plan for `credentials` against the configured UI test target
    pub fn generate(credentials: &Credentials, config: &LaneConfig) -> Self {
        let target = TargetReference {
            container_path: config.project_container(),
            identifier: config.target.identifier.clone(),
            name: config.target.name.clone(),
        };

        let environment_variable_entries = credentials
            .entries()
            .iter()
            .map(|(key, value)| EnvironmentVariableEntry {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect();

        Self {
            configurations: vec![PlanConfiguration {
                id: defaults::PLAN_CONFIGURATION_ID.to_string(),
                name: defaults::PLAN_CONFIGURATION_NAME.to_string(),
                options: serde_json::Map::new(),
            }],
            default_options: DefaultOptions {
                environment_variable_entries,
                target_for_variable_expansion: target.clone(),
            },
            test_targets: vec![TestTarget { target }],
            version: 1,
        }
    }

    /// Pretty-printed JSON with a trailing newline
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write the plan to `path`, replacing any existing file
    pub fn write(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::from)?;
        fs::write(path, json)
    }

    /// Value of an environment entry by key
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.default_options
            .environment_variable_entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}
