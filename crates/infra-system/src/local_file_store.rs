// Local filesystem FileStore
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use domainjoin_core::port::FileStore;

/// FileStore backed by the real filesystem
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// reader never sees a half-written sshd_config or sudoers drop-in. A symlinked
/// path (authselect's `system-auth`) is written through to its target and the
/// link is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for LocalFileStore {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, contents: &str, mode: u32) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let path = &resolve(path)?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".domainjoin-tmp");
        let tmp = Path::new(&tmp_name);

        fs::write(tmp, contents)?;
        set_mode(tmp, mode)?;
        fs::rename(tmp, path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, resolve(to)?)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Follow symlinks to the file that is actually replaced
fn resolve(path: &Path) -> io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(target) => Ok(target),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
