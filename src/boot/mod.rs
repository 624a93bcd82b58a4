pub mod components;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use lazy_static::lazy_static;
use tracing::{debug, info};

use crate::config::{
    ConfigSource, DEFAULT_REPOSITORY, GatewayConfig, GenericUriBuilder, RepositoryConfig,
    RepositoryRegistry, Resolver, UriBuilder,
};
use crate::core::{GatewayError, Result};
use crate::runtime::PersistenceRuntime;

pub use components::{COMPONENT_DIRS, ComponentLoader};

/// Per-coordinator boot progress flags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LifecycleState {
    configured: bool,
    components_loaded: bool,
    deferred_mode: bool,
}

impl LifecycleState {
    pub fn configured(&self) -> bool {
        self.configured
    }

    pub fn components_loaded(&self) -> bool {
        self.components_loaded
    }

    pub fn deferred_mode(&self) -> bool {
        self.deferred_mode
    }
}

/// The boot lifecycle coordinator.
///
/// Sequences configuration discovery, default-inference, runtime setup and
/// component loading. The host framework drives it from fixed points in its
/// own boot/reload sequence: `set_configuration` before app initializers run,
/// `finalize` on each reload, `after_fork` at fork boundaries. Those calls
/// are serialized by the host; the coordinator itself holds no locks.
///
/// # Examples
///
/// ```ignore
/// let mut boot = Bootstrapper::new("development", "/srv/app", runtime);
/// boot.set_configuration();
/// boot.configure(|config| {
///     config.repositories.declare("default", "sql", Some("postgres://localhost/app"), Default::default());
/// })?;
/// boot.finalize()?;
/// ```
pub struct Bootstrapper {
    env: String,
    root: PathBuf,
    runtime: Box<dyn PersistenceRuntime>,
    uri_builder: Box<dyn UriBuilder>,
    fallback_source: Option<Box<dyn ConfigSource>>,
    config: Option<GatewayConfig>,
    state: LifecycleState,
    loader: ComponentLoader,
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("env", &self.env)
            .field("root", &self.root)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl Bootstrapper {
    pub fn new(
        env: impl Into<String>,
        root: impl Into<PathBuf>,
        runtime: Box<dyn PersistenceRuntime>,
    ) -> Self {
        let root = root.into();
        Self {
            env: env.into(),
            loader: ComponentLoader::new(&root),
            root,
            runtime,
            uri_builder: Box::new(GenericUriBuilder::new()),
            fallback_source: None,
            config: None,
            state: LifecycleState::default(),
        }
    }

    /// Replace the URI builder collaborator.
    pub fn uri_builder(mut self, uri_builder: Box<dyn UriBuilder>) -> Self {
        self.uri_builder = uri_builder;
        self
    }

    /// Attach the optional fallback config source used to infer a `default`
    /// repository. Resolved once here, never probed at runtime.
    pub fn fallback_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.fallback_source = Some(source);
        self
    }

    /// Set deferred/batch mode at construction time.
    pub fn deferred_mode(mut self, on: bool) -> Self {
        self.state.deferred_mode = on;
        self
    }

    /// Override the component directories scanned by `finalize`.
    pub fn component_dirs(mut self, dirs: &[&str]) -> Self {
        self.loader = ComponentLoader::with_dirs(&self.root, dirs);
        self
    }

    /// Task-runner entry point: repository setup still occurs, component
    /// loading is skipped.
    pub fn enter_deferred_mode(&mut self) {
        self.state.deferred_mode = true;
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn config(&self) -> Option<&GatewayConfig> {
        self.config.as_ref()
    }

    /// Create a fresh, empty configuration holder.
    ///
    /// Invoked from the host's before-app-initialize hook, ahead of any user
    /// boot callbacks, so those callbacks find the holder in place. Calling
    /// it again resets the declared registry.
    pub fn set_configuration(&mut self) -> &mut Self {
        self.config = Some(GatewayConfig::new(self.env.clone(), self.root.clone()));
        self.state.configured = true;
        debug!(env = %self.env, "gateway configuration initialized");
        self
    }

    /// Yield the configuration holder to user code.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// boot.configure(|config| {
    ///     config.repositories.declare("default", "yaml", Some("yaml:///data"), Default::default());
    /// })?;
    /// ```
    pub fn configure<F>(&mut self, f: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut GatewayConfig),
    {
        let config = self.config.as_mut().ok_or(GatewayError::NotConfigured)?;
        f(config);
        Ok(self)
    }

    /// Fill the `default` slot of a repository set, inferring one from the
    /// fallback source when absent.
    ///
    /// On first boot the declared registry is prepared; on reload the caller
    /// passes the live repository set so active connections' settings carry
    /// over. A registry left without `default` here is caught by `setup`.
    pub fn prepare_repositories(
        &self,
        existing: Option<RepositoryRegistry>,
    ) -> Result<RepositoryRegistry> {
        let mut registry = match existing {
            Some(registry) => registry,
            None => {
                self.config
                    .as_ref()
                    .ok_or(GatewayError::NotConfigured)?
                    .repositories
                    .clone()
            }
        };

        if !registry.has_default() {
            if let Some(inferred) = self.infer_default_repository()? {
                info!("inferred 'default' repository from fallback config source");
                registry.insert(DEFAULT_REPOSITORY, inferred);
            }
        }

        Ok(registry)
    }

    /// Resolve the fallback source's configs for the current environment and
    /// package the `default` spec as a declared `sql` repository.
    fn infer_default_repository(&self) -> Result<Option<RepositoryConfig>> {
        let Some(source) = &self.fallback_source else {
            return Ok(None);
        };

        let resolver = Resolver::new(self.env.clone(), self.root.clone(), self.uri_builder.as_ref());
        let mut specs = resolver.resolve(&source.configs_for(&self.env))?;

        Ok(specs
            .remove(DEFAULT_REPOSITORY)
            .map(|spec| RepositoryConfig::Declared {
                adapter: "sql".to_string(),
                uri: Some(spec.uri),
                options: spec.options,
            }))
    }

    /// Validate the registry and hand it to the persistence runtime.
    ///
    /// Booting with zero repositories is never valid, and the registry must
    /// carry a `default` entry once preparation and inference have run.
    pub fn setup(&mut self) -> Result<&mut Self> {
        let config = self.config.as_ref().ok_or(GatewayError::NotConfigured)?;
        let registry = &config.repositories;

        if registry.is_empty() {
            return Err(GatewayError::MissingRepositoryConfig);
        }
        if !registry.has_default() {
            return Err(GatewayError::MissingDefaultRepository);
        }

        self.runtime.setup(registry)?;
        info!(repositories = registry.len(), "persistence runtime set up");
        Ok(self)
    }

    /// Top-level re-entrant boot entry point, invoked on each host reload.
    ///
    /// Prepares repositories (from the live environment when one exists, so
    /// reloads preserve active connections' settings), runs `setup`, loads
    /// application components unless in deferred mode, then finalizes the
    /// runtime.
    pub fn finalize(&mut self) -> Result<&mut Self> {
        let live = self.runtime.environment().map(|env| env.registry().clone());
        let prepared = self.prepare_repositories(live)?;
        self.config
            .as_mut()
            .ok_or(GatewayError::NotConfigured)?
            .repositories = prepared;

        self.setup()?;

        if self.state.deferred_mode {
            info!("skipping loading application components (deferred mode)");
        } else {
            self.loader.load_components()?;
            self.state.components_loaded = true;
        }

        self.runtime.finalize()?;
        Ok(self)
    }

    /// Release every live repository's connections.
    ///
    /// Valid at any point, including before first boot and right after a
    /// process fork: a missing runtime environment is an expected state, not
    /// an error.
    pub fn disconnect(&self) {
        let Some(environment) = self.runtime.environment() else {
            debug!("disconnect: no runtime environment, nothing to do");
            return;
        };

        for (name, repository) in environment.repositories() {
            debug!(name, "disconnecting repository");
            repository.disconnect();
        }
    }
}

lazy_static! {
    static ref GLOBAL_BOOT: Mutex<Option<Bootstrapper>> = Mutex::new(None);
}

/// Install a coordinator into the process-wide slot so framework hooks can
/// reach it without threading a handle through the host.
pub fn install(bootstrapper: Bootstrapper) {
    *GLOBAL_BOOT
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(bootstrapper);
}

/// Run `f` against the installed coordinator, if any.
pub fn with_global<T>(f: impl FnOnce(&mut Bootstrapper) -> T) -> Option<T> {
    let mut guard = GLOBAL_BOOT.lock().unwrap_or_else(PoisonError::into_inner);
    guard.as_mut().map(f)
}

/// Remove and return the installed coordinator.
pub fn uninstall() -> Option<Bootstrapper> {
    GLOBAL_BOOT
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// Fork-boundary hook for worker-pool supervisors: the child releases the
/// parent's connection handles before establishing its own. No-op when
/// nothing is installed.
pub fn after_fork() {
    with_global(|boot| boot.disconnect());
}
