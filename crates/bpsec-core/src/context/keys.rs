//! Key-file resolution and in-memory caching.
//!
//! A policy's `keyFile` parameter names a file whose raw bytes are the key.
//! All referenced files are read exactly once during config load; no file
//! descriptors are retained afterwards and the cached bytes are zeroized on
//! drop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zeroize::Zeroizing;

/// Errors from key-file resolution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyStoreError {
    /// The key file could not be read.
    #[error("cannot read key file {path}: {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The key file was empty.
    #[error("key file {path} is empty")]
    Empty {
        /// The offending path.
        path: PathBuf,
    },
}

/// In-memory cache of key material, keyed by the configured file path.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: HashMap<PathBuf, Zeroizing<Vec<u8>>>,
}

impl KeyStore {
    /// Creates an empty key store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and caches the key file at `path`. Re-loading an already
    /// cached path is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Io`] when the file cannot be read and
    /// [`KeyStoreError::Empty`] for a zero-length file.
    pub fn load(&mut self, path: &Path) -> Result<(), KeyStoreError> {
        if self.keys.contains_key(path) {
            return Ok(());
        }
        let bytes = std::fs::read(path).map_err(|source| KeyStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(KeyStoreError::Empty {
                path: path.to_path_buf(),
            });
        }
        self.keys.insert(path.to_path_buf(), Zeroizing::new(bytes));
        Ok(())
    }

    /// Returns the cached key bytes for a path loaded earlier.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.keys.get(path).map(|k| k.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_raw_bytes_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xAA; 32]).unwrap();

        let mut store = KeyStore::new();
        store.load(file.path()).unwrap();
        store.load(file.path()).unwrap();
        assert_eq!(store.get(file.path()), Some(&[0xAA; 32][..]));
    }

    #[test]
    fn missing_and_empty_files_are_errors() {
        let mut store = KeyStore::new();
        assert!(matches!(
            store.load(Path::new("/nonexistent/bpsec.key")),
            Err(KeyStoreError::Io { .. })
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            store.load(file.path()),
            Err(KeyStoreError::Empty { .. })
        ));
    }
}
