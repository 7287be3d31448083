//! File-per-key storage of captured credential payloads

use crate::key::CacheKey;
use crate::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Raw payload storage rooted at a cache directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `dir`. The directory must already exist
    /// before the first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a key to its cache file name.
    ///
    /// Names are `<cluster>_<access>` or `<cluster>_<access>_<region>`. Keys
    /// with an empty cluster id or access key are rejected here, as are
    /// components that would escape the cache directory. Identifiers are
    /// assumed not to contain `_`; within that space distinct keys map to
    /// distinct names.
    pub fn file_name(key: &CacheKey) -> Result<String> {
        if key.cluster_id.is_empty() || key.access_key.is_empty() {
            return Err(Error::invalid_key(format!(
                "{key:?} is missing required fields"
            )));
        }

        let region = key.region.as_deref().filter(|r| !r.is_empty());
        let components = [Some(key.cluster_id.as_str()), Some(key.access_key.as_str()), region];
        if components.iter().flatten().any(|c| !is_safe_component(c)) {
            return Err(Error::invalid_key(format!(
                "{key:?} contains a path separator"
            )));
        }

        Ok(match region {
            Some(region) => format!("{}_{}_{}", key.cluster_id, key.access_key, region),
            None => format!("{}_{}", key.cluster_id, key.access_key),
        })
    }

    /// Full path of the cache file for `key`
    pub fn path_for(&self, key: &CacheKey) -> Result<PathBuf> {
        Ok(self.dir.join(Self::file_name(key)?))
    }

    /// Read the cached payload for `key`.
    ///
    /// A missing file is `Ok(None)`; any other failure is an error.
    pub fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => {
                tracing::debug!(path = %path.display(), bytes = data.len(), "Read cache entry");
                Ok(Some(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(e, &path, "read")),
        }
    }

    /// Create or truncate the cache file for `key` and write `payload`
    /// verbatim.
    pub fn write(&self, key: &CacheKey, payload: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        let mut file = open_for_write(&path).map_err(|e| Error::io(e, &path, "create"))?;
        file.write_all(payload)
            .and_then(|()| file.flush())
            .map_err(|e| Error::io(e, &path, "write"))?;
        tracing::debug!(path = %path.display(), bytes = payload.len(), "Wrote cache entry");
        Ok(())
    }
}

fn is_safe_component(component: &str) -> bool {
    component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}

#[cfg(unix)]
fn open_for_write(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_for_write(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
}
