// ============================================================================
// gatewayboot
// ============================================================================
//
// Resolves per-environment database gateway configuration from a host
// application's flat config records, and coordinates the one-time boot
// lifecycle that wires those configurations into a persistence runtime.

pub mod boot;
pub mod config;
pub mod core;
pub mod runtime;

// Re-export main types for convenience
pub use boot::{Bootstrapper, ComponentLoader, LifecycleState};
pub use config::{
    ConfigSource, DEFAULT_REPOSITORY, GatewayConfig, GatewaySpec, GenericUriBuilder,
    JsonConfigSource, RawConfigRecord, RepositoryConfig, RepositoryRegistry, Resolver, UriBuilder,
};
pub use core::{ConfigValue, GatewayError, Result};
pub use runtime::{LiveRepository, PersistenceRuntime, RuntimeEnvironment};
