pub mod resolver;
pub mod source;
pub mod uri;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::ConfigValue;

pub use resolver::Resolver;
pub use source::{ConfigSource, JsonConfigSource, RawConfigRecord};
pub use uri::{GenericUriBuilder, UriBuilder};

/// The distinguished fallback repository name.
pub const DEFAULT_REPOSITORY: &str = "default";

/// Resolved connection specification for one gateway.
///
/// `uri` encodes the reserved connection keys plus the adapter scheme;
/// `options` holds everything else (adapter-specific tuning such as pool
/// size). The two sets never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySpec {
    pub uri: String,
    pub options: HashMap<String, ConfigValue>,
}

/// One repository registry entry.
///
/// User code declares repositories as an adapter plus an optional URI and
/// options; the resolver produces fully formed specs. Both shapes flow into
/// runtime setup unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RepositoryConfig {
    Declared {
        adapter: String,
        uri: Option<String>,
        options: HashMap<String, ConfigValue>,
    },
    Resolved(GatewaySpec),
}

impl RepositoryConfig {
    /// Connection URI of this entry, if one is known at this stage.
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::Declared { uri, .. } => uri.as_deref(),
            Self::Resolved(spec) => Some(&spec.uri),
        }
    }

    pub fn options(&self) -> &HashMap<String, ConfigValue> {
        match self {
            Self::Declared { options, .. } => options,
            Self::Resolved(spec) => &spec.options,
        }
    }
}

/// Mapping from logical repository name to its configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryRegistry {
    entries: HashMap<String, RepositoryConfig>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, config: RepositoryConfig) {
        self.entries.insert(name.into(), config);
    }

    /// Convenience for user-authored declarations.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        adapter: impl Into<String>,
        uri: Option<&str>,
        options: HashMap<String, ConfigValue>,
    ) {
        self.insert(
            name,
            RepositoryConfig::Declared {
                adapter: adapter.into(),
                uri: uri.map(str::to_string),
                options,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryConfig> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn has_default(&self) -> bool {
        self.contains(DEFAULT_REPOSITORY)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Registered names, sorted for stable iteration.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RepositoryConfig)> {
        self.entries.iter()
    }
}

/// Per-boot configuration holder.
///
/// Created fresh and empty by `Bootstrapper::set_configuration` before any
/// user boot callbacks run, then populated through `configure`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    env: String,
    root: PathBuf,
    pub repositories: RepositoryRegistry,
}

impl GatewayConfig {
    pub fn new(env: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            env: env.into(),
            root: root.into(),
            repositories: RepositoryRegistry::new(),
        }
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
