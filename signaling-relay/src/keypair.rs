//! The server's permanent key pair.
//!
//! Keys live in two files, each holding 64 hex characters. Surrounding
//! whitespace is ignored.

use crate::error::KeyPairError;
use signaling_types::{Key, KeyPair};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Source of the server's permanent key pair.
pub trait KeyPairStorage: Send + Sync {
    /// Load the keys. Called once at startup.
    fn load(&mut self) -> Result<(), KeyPairError>;

    /// Permanent public key.
    fn public_key(&self) -> Key;

    /// Permanent private key.
    fn private_key(&self) -> Key;
}

impl KeyPairStorage for KeyPair {
    fn load(&mut self) -> Result<(), KeyPairError> {
        Ok(())
    }

    fn public_key(&self) -> Key {
        KeyPair::public_key(self)
    }

    fn private_key(&self) -> Key {
        KeyPair::private_key(self)
    }
}

/// Key pair backed by hex files on disk.
#[derive(Debug)]
pub struct FileKeyPair {
    public_key_path: PathBuf,
    private_key_path: PathBuf,
    pair: Option<KeyPair>,
}

impl FileKeyPair {
    /// Create an unloaded key pair for the given files.
    pub fn new(public_key_path: impl Into<PathBuf>, private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            public_key_path: public_key_path.into(),
            private_key_path: private_key_path.into(),
            pair: None,
        }
    }

    /// Whether [`KeyPairStorage::load`] has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.pair.is_some()
    }
}

impl KeyPairStorage for FileKeyPair {
    fn load(&mut self) -> Result<(), KeyPairError> {
        let public = read_key(&self.public_key_path)?;
        let private = read_key(&self.private_key_path)?;

        let pair = KeyPair::from_private(private);
        if pair.public_key() != public {
            return Err(KeyPairError::Mismatch);
        }

        tracing::info!(public_key = ?public, "Loaded permanent key pair");
        self.pair = Some(pair);
        Ok(())
    }

    fn public_key(&self) -> Key {
        self.pair.as_ref().map(KeyPair::public_key).unwrap_or_default()
    }

    fn private_key(&self) -> Key {
        self.pair.as_ref().map(KeyPair::private_key).unwrap_or_default()
    }
}

fn read_key(path: &Path) -> Result<Key, KeyPairError> {
    let content = Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
        KeyPairError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?);
    Key::from_hex(content.trim()).map_err(|source| KeyPairError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Generate a fresh key pair and write `public.key` and `private.key` into
/// `dir`. Returns the paths written.
pub fn generate_files(dir: &Path) -> Result<(PathBuf, PathBuf), KeyPairError> {
    let pair = KeyPair::generate().map_err(KeyPairError::Generate)?;
    let public_path = dir.join("public.key");
    let private_path = dir.join("private.key");

    write_key(&public_path, &pair.public_key())?;
    write_key(&private_path, &pair.private_key())?;
    Ok((public_path, private_path))
}

fn write_key(path: &Path, key: &Key) -> Result<(), KeyPairError> {
    let encoded = Zeroizing::new(key.to_hex());
    std::fs::write(path, encoded.as_bytes()).map_err(|source| KeyPairError::Write {
        path: path.to_path_buf(),
        source,
    })
}
