use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::Result;

/// Application directories scanned for persistence components, relative to
/// `<root>/app/`.
pub const COMPONENT_DIRS: [&str; 3] = ["relations", "mappers", "commands"];

/// Scans the expected component directories under the application root.
///
/// The scan is idempotent per call: it walks `<root>/app/<dir>` for each
/// configured directory, recursively and in sorted order, and returns every
/// file found. Missing directories are skipped, the host may not use all
/// component types.
#[derive(Debug, Clone)]
pub struct ComponentLoader {
    root: PathBuf,
    dirs: Vec<String>,
}

impl ComponentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_dirs(root, &COMPONENT_DIRS)
    }

    pub fn with_dirs(root: impl Into<PathBuf>, dirs: &[&str]) -> Self {
        Self {
            root: root.into(),
            dirs: dirs.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    /// Scan all component directories and return the discovered files.
    pub fn load_components(&self) -> Result<Vec<PathBuf>> {
        let mut loaded = Vec::new();
        for dir in &self.dirs {
            let base = self.root.join("app").join(dir);
            if !base.is_dir() {
                continue;
            }
            self.load_files(&base, &mut loaded)?;
        }

        info!(count = loaded.len(), "loaded application components");
        Ok(loaded)
    }

    fn load_files(&self, dir: &Path, loaded: &mut Vec<PathBuf>) -> Result<()> {
        let mut entries = fs::read_dir(dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.load_files(&path, loaded)?;
            } else {
                debug!(path = %path.display(), "component file");
                loaded.push(path);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(path: &Path) {
        File::create(path).unwrap();
    }

    #[test]
    fn test_scans_component_dirs_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let relations = tmp.path().join("app/relations");
        fs::create_dir_all(&relations).unwrap();
        touch(&relations.join("users.rs"));
        touch(&relations.join("accounts.rs"));

        let loader = ComponentLoader::new(tmp.path());
        let loaded = loader.load_components().unwrap();

        assert_eq!(
            loaded,
            vec![relations.join("accounts.rs"), relations.join("users.rs")]
        );
    }

    #[test]
    fn test_recurses_into_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let mappers = tmp.path().join("app/mappers/admin");
        fs::create_dir_all(&mappers).unwrap();
        touch(&mappers.join("users.rs"));

        let loader = ComponentLoader::new(tmp.path());
        let loaded = loader.load_components().unwrap();

        assert_eq!(loaded, vec![mappers.join("users.rs")]);
    }

    #[test]
    fn test_missing_dirs_skipped() {
        let tmp = tempfile::tempdir().unwrap();

        let loader = ComponentLoader::new(tmp.path());
        assert!(loader.load_components().unwrap().is_empty());
    }

    #[test]
    fn test_idempotent_per_call() {
        let tmp = tempfile::tempdir().unwrap();
        let commands = tmp.path().join("app/commands");
        fs::create_dir_all(&commands).unwrap();
        touch(&commands.join("create_user.rs"));

        let loader = ComponentLoader::new(tmp.path());
        let first = loader.load_components().unwrap();
        let second = loader.load_components().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let queries = tmp.path().join("app/queries");
        fs::create_dir_all(&queries).unwrap();
        touch(&queries.join("report.rs"));

        let loader = ComponentLoader::with_dirs(tmp.path(), &["queries"]);
        let loaded = loader.load_components().unwrap();

        assert_eq!(loaded, vec![queries.join("report.rs")]);
    }
}
