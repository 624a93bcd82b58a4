use std::path::Path;

use crate::core::{ConfigValue, GatewayError, Result};

/// One flat database config record for a `(repository name, environment)`
/// pair, as handed over by the host's configuration source.
///
/// Keys are kept exactly as supplied; canonicalization happens in the
/// resolver so that string- and symbol-spelled keys meet one form before any
/// lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawConfigRecord {
    name: String,
    env: String,
    settings: Vec<(String, ConfigValue)>,
}

impl RawConfigRecord {
    pub fn new(name: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: env.into(),
            settings: Vec::new(),
        }
    }

    /// Add a setting. Insertion order is preserved; on duplicate keys the
    /// later entry wins during resolution.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn settings(&self) -> &[(String, ConfigValue)] {
        &self.settings
    }
}

/// Source of raw config records, ordered as authored by the host.
///
/// Order is semantic: the first record resolved for an environment decides
/// the `default` alias.
pub trait ConfigSource: Send {
    fn configs_for(&self, env: &str) -> Vec<RawConfigRecord>;
}

/// Config source backed by a JSON document of the shape
/// `{ "<env>": { "<repository>": { "<key>": <scalar>, ... }, ... }, ... }`.
///
/// The JSON analog of a flat `database.yml`. Record order within an
/// environment follows the document.
#[derive(Debug, Clone)]
pub struct JsonConfigSource {
    records: Vec<RawConfigRecord>,
}

impl JsonConfigSource {
    pub fn from_str(json: &str) -> Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;

        let envs = doc.as_object().ok_or_else(|| {
            GatewayError::ParseError("config document must be an object keyed by environment".into())
        })?;

        let mut records = Vec::new();
        for (env, repos) in envs {
            let repos = repos.as_object().ok_or_else(|| {
                GatewayError::ParseError(format!(
                    "environment '{}' must map repository names to flat configs",
                    env
                ))
            })?;

            for (name, settings) in repos {
                let settings = settings.as_object().ok_or_else(|| {
                    GatewayError::ParseError(format!(
                        "config '{}' in environment '{}' must be a flat object",
                        name, env
                    ))
                })?;

                let mut record = RawConfigRecord::new(name.clone(), env.clone());
                for (key, value) in settings {
                    record = record.set(key.clone(), ConfigValue::try_from(value)?);
                }
                records.push(record);
            }
        }

        Ok(Self { records })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_str(&json)
    }

    pub fn records(&self) -> &[RawConfigRecord] {
        &self.records
    }
}

impl ConfigSource for JsonConfigSource {
    fn configs_for(&self, env: &str) -> Vec<RawConfigRecord> {
        self.records
            .iter()
            .filter(|record| record.env() == env)
            .cloned()
            .collect()
    }
}
