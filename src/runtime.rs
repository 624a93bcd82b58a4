use crate::config::RepositoryRegistry;
use crate::core::Result;

/// The persistence runtime the coordinator boots.
///
/// Setup and finalize are opaque, synchronous calls; their failures propagate
/// unchanged. `environment` reports the live environment once setup has
/// completed, which is what makes `finalize` re-entrant: a reload prepares
/// from the live registry instead of the static declared config.
pub trait PersistenceRuntime: Send {
    /// Hand the validated repository registry to the runtime.
    fn setup(&mut self, repositories: &RepositoryRegistry) -> Result<()>;

    /// Freeze schema/relation wiring for the current boot cycle.
    fn finalize(&mut self) -> Result<()>;

    /// The live environment, if one exists.
    fn environment(&self) -> Option<&dyn RuntimeEnvironment>;
}

/// A live runtime environment: the repositories it was set up with, both as
/// settings and as live handles.
pub trait RuntimeEnvironment {
    /// The registry this environment was set up from.
    fn registry(&self) -> &RepositoryRegistry;

    /// Live repository handles, keyed by logical name.
    fn repositories(&self) -> Vec<(&str, &dyn LiveRepository)>;
}

/// A live, connected repository.
pub trait LiveRepository {
    /// Release this repository's connections. Called at out-of-band lifecycle
    /// points such as process-fork boundaries; must not assume any further
    /// use of the handle.
    fn disconnect(&self);
}
