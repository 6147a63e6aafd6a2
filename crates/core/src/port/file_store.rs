// File Store Port
// Configuration files the configurator and adapters edit in place

use std::io;
use std::path::Path;

/// Access to host configuration files
///
/// Synchronous: every file involved is a few kilobytes.
pub trait FileStore: Send + Sync {
    /// Read a file; `Ok(None)` when it does not exist
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Replace a file's contents and set its permission bits
    ///
    /// Parent directories are created when missing.
    fn write(&self, path: &Path, contents: &str, mode: u32) -> io::Result<()>;

    /// Move `from` over `to`, replacing it
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file; missing files are not an error
    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// In-memory file store
    #[derive(Default, Clone)]
    pub struct InMemoryFileStore {
        files: Arc<Mutex<BTreeMap<PathBuf, (String, u32)>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl InMemoryFileStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
            self.files
                .lock()
                .unwrap()
                .insert(path.into(), (contents.into(), 0o644));
            self
        }

        pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
            self.files
                .lock()
                .unwrap()
                .get(path.as_ref())
                .map(|(c, _)| c.clone())
        }

        pub fn mode(&self, path: impl AsRef<Path>) -> Option<u32> {
            self.files
                .lock()
                .unwrap()
                .get(path.as_ref())
                .map(|(_, m)| *m)
        }

        pub fn write_count(&self) -> usize {
            *self.writes.lock().unwrap()
        }

        pub fn paths(&self) -> Vec<PathBuf> {
            self.files.lock().unwrap().keys().cloned().collect()
        }
    }

    impl FileStore for InMemoryFileStore {
        fn read(&self, path: &Path) -> io::Result<Option<String>> {
            Ok(self.contents(path))
        }

        fn write(&self, path: &Path, contents: &str, mode: u32) -> io::Result<()> {
            *self.writes.lock().unwrap() += 1;
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), (contents.to_string(), mode));
            Ok(())
        }

        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            let mut files = self.files.lock().unwrap();
            let entry = files
                .remove(from)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.display().to_string()))?;
            files.insert(to.to_path_buf(), entry);
            Ok(())
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }
    }
}
