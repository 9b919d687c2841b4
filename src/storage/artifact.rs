use crate::storage::traits::{ArtifactKey, ArtifactStore, StorageError, StorageResult};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Filesystem artifact cache
///
/// Layout: `<root>/<site>/<logical-name>_<YYYY-MM-DD>.html`. Content is first
/// written to a hidden `.part` file and then hard-linked into place, so a
/// crash mid-write never produces an artifact that a resumed run would trust,
/// and an existing artifact is never replaced.
#[derive(Debug, Clone)]
pub struct FsArtifactCache {
    root: PathBuf,
}

impl FsArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding all artifacts of a site
    pub fn site_dir(&self, site: &str) -> PathBuf {
        self.root.join(site)
    }

    /// Full path of an artifact
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.site_dir(&key.site).join(key.file_name())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl ArtifactStore for FsArtifactCache {
    fn contains(&self, key: &ArtifactKey) -> bool {
        key.check().is_ok() && self.path_for(key).is_file()
    }

    fn load(&self, key: &ArtifactKey) -> StorageResult<Option<String>> {
        key.check()?;
        let path = self.path_for(key);

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn store(&self, key: &ArtifactKey, content: &str) -> StorageResult<bool> {
        key.check()?;
        let dir = self.site_dir(&key.site);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let path = self.path_for(key);
        if path.exists() {
            return Ok(false);
        }

        let part = dir.join(format!(".{}.part", key.file_name()));
        let written = fs::File::create(&part)
            .and_then(|mut file| {
                file.write_all(content.as_bytes())?;
                file.sync_all()
            })
            .map_err(|e| io_error(&part, e));

        let linked = written.and_then(|()| match fs::hard_link(&part, &path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        });

        // The part file is garbage whether or not the link succeeded
        let _ = fs::remove_file(&part);
        linked
    }
}
