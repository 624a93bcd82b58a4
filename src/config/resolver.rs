use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::source::RawConfigRecord;
use crate::config::uri::UriBuilder;
use crate::config::{DEFAULT_REPOSITORY, GatewaySpec};
use crate::core::{ConfigValue, GatewayError, Result};

/// Flat-config keys that belong to the connection URI, never to adapter
/// options.
pub const RESERVED_KEYS: [&str; 7] = [
    "root", "adapter", "database", "password", "username", "hostname", "host",
];

/// Turns named flat config records into gateway specs for one environment.
///
/// Resolution is fail-fast: a record missing its `adapter` key aborts the
/// whole pass, a partially resolved repository set must not boot.
pub struct Resolver<'a> {
    env: String,
    root: PathBuf,
    uri_builder: &'a dyn UriBuilder,
}

impl<'a> Resolver<'a> {
    pub fn new(
        env: impl Into<String>,
        root: impl Into<PathBuf>,
        uri_builder: &'a dyn UriBuilder,
    ) -> Self {
        Self {
            env: env.into(),
            root: root.into(),
            uri_builder,
        }
    }

    /// Resolve all records matching this resolver's environment, in source
    /// order.
    ///
    /// The first record resolved also fills the `default` slot. That alias is
    /// assigned once: a record literally named `default` appearing later in
    /// the sequence does not replace it and is dropped with a warning.
    pub fn resolve(&self, records: &[RawConfigRecord]) -> Result<HashMap<String, GatewaySpec>> {
        let mut specs: HashMap<String, GatewaySpec> = HashMap::new();
        let mut default_origin: Option<String> = None;

        for record in records.iter().filter(|r| r.env() == self.env) {
            let settings = normalize_settings(record.settings());
            let spec = self.build(record.name(), &settings)?;
            debug!(name = record.name(), env = %self.env, uri = %spec.uri, "resolved gateway config");

            if !specs.contains_key(DEFAULT_REPOSITORY) {
                specs.insert(DEFAULT_REPOSITORY.to_string(), spec.clone());
                default_origin = Some(record.name().to_string());
            } else if record.name() == DEFAULT_REPOSITORY
                && default_origin.as_deref() != Some(DEFAULT_REPOSITORY)
            {
                warn!(
                    shadowed_by = default_origin.as_deref().unwrap_or(""),
                    "record named 'default' appears after the default slot was already \
                     filled, dropping it"
                );
                continue;
            }

            specs.insert(record.name().to_string(), spec);
        }

        Ok(specs)
    }

    /// Build one gateway spec from normalized settings.
    ///
    /// URI input is every key except `adapter`, plus `root` (process root)
    /// and `scheme` (the adapter value); options are every key outside
    /// `RESERVED_KEYS`.
    fn build(&self, name: &str, settings: &HashMap<String, ConfigValue>) -> Result<GatewaySpec> {
        let adapter = settings
            .get("adapter")
            .filter(|value| !value.is_null())
            .map(ToString::to_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::MissingAdapter(name.to_string()))?;

        let mut uri_input = settings.clone();
        uri_input.remove("adapter");
        uri_input.insert(
            "root".to_string(),
            ConfigValue::Text(self.root.display().to_string()),
        );
        uri_input.insert("scheme".to_string(), ConfigValue::Text(adapter.clone()));

        let uri = self.uri_builder.build(&adapter, &uri_input)?;

        let options = settings
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(GatewaySpec { uri, options })
    }
}

fn normalize_key(key: &str) -> String {
    let key = key.trim();
    let key = key.strip_prefix(':').unwrap_or(key);
    key.to_ascii_lowercase()
}

/// Canonicalize record keys before any lookup. Later duplicates win, in
/// record order.
fn normalize_settings(settings: &[(String, ConfigValue)]) -> HashMap<String, ConfigValue> {
    let mut normalized = HashMap::with_capacity(settings.len());
    for (key, value) in settings {
        normalized.insert(normalize_key(key), value.clone());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::uri::GenericUriBuilder;

    fn resolver(builder: &dyn UriBuilder) -> Resolver<'_> {
        Resolver::new("development", "/srv/app", builder)
    }

    fn postgres_record(name: &str) -> RawConfigRecord {
        RawConfigRecord::new(name, "development")
            .set("adapter", "postgres")
            .set("database", "app_dev")
            .set("username", "u")
            .set("pool", 5i64)
    }

    #[test]
    fn test_resolves_spec_example() {
        let builder = GenericUriBuilder::new();
        let specs = resolver(&builder)
            .resolve(&[postgres_record("primary")])
            .unwrap();

        let spec = &specs["primary"];
        assert!(spec.uri.starts_with("postgres://"));
        assert!(spec.uri.contains("app_dev"));
        assert_eq!(spec.options.len(), 1);
        assert_eq!(spec.options["pool"], ConfigValue::Integer(5));
    }

    #[test]
    fn test_first_record_aliased_as_default() {
        let builder = GenericUriBuilder::new();
        let specs = resolver(&builder)
            .resolve(&[
                postgres_record("primary"),
                RawConfigRecord::new("events", "development")
                    .set("adapter", "sqlite")
                    .set("database", "events.db"),
            ])
            .unwrap();

        assert_eq!(specs.len(), 3);
        assert_eq!(specs["default"], specs["primary"]);
        assert_ne!(specs["default"], specs["events"]);
    }

    #[test]
    fn test_literal_default_first_is_used_directly() {
        let builder = GenericUriBuilder::new();
        let other = RawConfigRecord::new("events", "development")
            .set("adapter", "sqlite")
            .set("database", "events.db");

        let specs = resolver(&builder)
            .resolve(&[postgres_record("default"), other])
            .unwrap();

        assert_eq!(specs.len(), 2);
        assert!(specs["default"].uri.starts_with("postgres://"));
        assert!(specs["events"].uri.starts_with("sqlite://"));
    }

    #[test]
    fn test_late_literal_default_does_not_overwrite_alias() {
        let builder = GenericUriBuilder::new();
        let late_default = RawConfigRecord::new("default", "development")
            .set("adapter", "mysql")
            .set("database", "other");

        let specs = resolver(&builder)
            .resolve(&[postgres_record("primary"), late_default])
            .unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs["default"], specs["primary"]);
        assert!(specs["default"].uri.starts_with("postgres://"));
    }

    #[test]
    fn test_missing_adapter_aborts_resolution() {
        let builder = GenericUriBuilder::new();
        let bad = RawConfigRecord::new("broken", "development").set("database", "app_dev");

        let err = resolver(&builder)
            .resolve(&[postgres_record("primary"), bad])
            .unwrap_err();

        assert!(matches!(err, GatewayError::MissingAdapter(name) if name == "broken"));
    }

    #[test]
    fn test_env_filtering() {
        let builder = GenericUriBuilder::new();
        let other_env = RawConfigRecord::new("primary", "production")
            .set("adapter", "postgres")
            .set("database", "app_prod");

        let specs = resolver(&builder)
            .resolve(&[other_env, postgres_record("primary")])
            .unwrap();

        assert!(specs["primary"].uri.contains("app_dev"));
    }

    #[test]
    fn test_key_normalization() {
        let builder = GenericUriBuilder::new();
        let record = RawConfigRecord::new("primary", "development")
            .set(":Adapter", "postgres")
            .set(" DATABASE ", "app_dev")
            .set(":pool", 5i64);

        let specs = resolver(&builder).resolve(&[record]).unwrap();
        let spec = &specs["primary"];

        assert!(spec.uri.contains("app_dev"));
        assert_eq!(spec.options["pool"], ConfigValue::Integer(5));
    }

    #[test]
    fn test_options_exclude_reserved_keys() {
        let builder = GenericUriBuilder::new();
        let record = RawConfigRecord::new("primary", "development")
            .set("adapter", "postgres")
            .set("database", "app_dev")
            .set("username", "u")
            .set("password", "s")
            .set("hostname", "h")
            .set("host", "h2")
            .set("root", "/elsewhere")
            .set("pool", 5i64)
            .set("timeout", 30i64);

        let specs = resolver(&builder).resolve(&[record]).unwrap();
        let options = &specs["primary"].options;

        assert_eq!(options.len(), 2);
        assert!(options.contains_key("pool"));
        assert!(options.contains_key("timeout"));
    }

    /// Pure builder that encodes the keys it received, to observe what the
    /// resolver passes through.
    struct KeyEchoBuilder;

    impl UriBuilder for KeyEchoBuilder {
        fn build(&self, adapter: &str, options: &HashMap<String, ConfigValue>) -> Result<String> {
            let mut keys: Vec<&str> = options.keys().map(String::as_str).collect();
            keys.sort_unstable();
            Ok(format!("{}://{}", adapter, keys.join(",")))
        }
    }

    #[test]
    fn test_uri_input_keys() {
        let builder = KeyEchoBuilder;
        let record = RawConfigRecord::new("primary", "development")
            .set("adapter", "postgres")
            .set("database", "app_dev")
            .set("host", "a")
            .set("hostname", "b")
            .set("pool", 5i64);

        let specs = resolver(&builder).resolve(&[record]).unwrap();

        // adapter is replaced by scheme; root is injected; the host/hostname
        // collision is passed through untouched.
        assert_eq!(
            specs["primary"].uri,
            "postgres://database,host,hostname,pool,root,scheme"
        );
    }

    #[test]
    fn test_process_root_overrides_record_root() {
        struct RootEchoBuilder;
        impl UriBuilder for RootEchoBuilder {
            fn build(&self, _: &str, options: &HashMap<String, ConfigValue>) -> Result<String> {
                Ok(options["root"].to_string())
            }
        }

        let builder = RootEchoBuilder;
        let record = RawConfigRecord::new("primary", "development")
            .set("adapter", "postgres")
            .set("root", "/spoofed");

        let specs = resolver(&builder).resolve(&[record]).unwrap();
        assert_eq!(specs["primary"].uri, "/srv/app");
    }
}
