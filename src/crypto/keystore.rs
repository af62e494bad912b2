//! Key storage behind an opaque handle.
//!
//! The rest of the crate only ever sees a [`KeyHandle`], which can seal and
//! open payloads but never hands out its key bytes. Keystore implementations
//! are the single place raw key material exists.

use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, bail, Context, Result};
use chacha20poly1305::{
    aead::{Aead, Payload},
    ChaCha20Poly1305, Key, KeyInit, Nonce,
};
use log::info;
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

pub const RECORD_KEY_ALIAS: &str = "record-encryption-key";

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Encrypt/decrypt capability for one stored key.
#[derive(Clone)]
pub struct KeyHandle {
    aead: ChaCha20Poly1305,
}

impl KeyHandle {
    /// For keystore implementations only; callers get handles from a [`Keystore`].
    pub fn from_key_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        Self {
            aead: ChaCha20Poly1305::new(Key::from_slice(bytes)),
        }
    }

    pub fn seal(&self, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != NONCE_LEN {
            bail!("nonce must be {NONCE_LEN} bytes, got {}", nonce.len());
        }
        self.aead
            .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
            .map_err(|err| anyhow!("encryption failed: {err}"))
    }

    /// `None` when the tag does not verify.
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Option<Vec<u8>> {
        if nonce.len() != NONCE_LEN {
            return None;
        }
        self.aead
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .ok()
    }
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyHandle(..)")
    }
}

pub trait Keystore: Send + Sync {
    fn load(&self, alias: &str) -> Result<Option<KeyHandle>>;

    fn generate(&self, alias: &str) -> Result<KeyHandle>;

    /// Returns the key under `alias`, generating and storing it on first use.
    fn get_or_generate(&self, alias: &str) -> Result<KeyHandle> {
        match self.load(alias)? {
            Some(handle) => Ok(handle),
            None => {
                info!("No key under alias '{alias}', generating one");
                self.generate(alias)
            }
        }
    }
}

fn random_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Keys kept as files in a private directory, one file per alias.
pub struct FileKeystore {
    dir: PathBuf,
}

impl FileKeystore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create keystore directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{alias}.key"))
    }
}

impl Keystore for FileKeystore {
    fn load(&self, alias: &str) -> Result<Option<KeyHandle>> {
        let path = self.key_path(alias);
        if !path.exists() {
            return Ok(None);
        }

        let mut bytes = fs::read(&path)
            .with_context(|| format!("failed to read key file {}", path.display()))?;
        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            bail!("key file {} has length {len}, expected {KEY_LEN}", path.display());
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        let handle = KeyHandle::from_key_bytes(&key);
        key.zeroize();
        Ok(Some(handle))
    }

    fn generate(&self, alias: &str) -> Result<KeyHandle> {
        let path = self.key_path(alias);
        let mut key = random_key();
        let written = write_key_file(&path, &key)
            .with_context(|| format!("failed to write key file {}", path.display()));
        let handle = KeyHandle::from_key_bytes(&key);
        key.zeroize();
        written?;
        Ok(handle)
    }
}

/// Creates the key file owner-only from the start and never overwrites an
/// existing key.
fn write_key_file(path: &Path, key: &[u8; KEY_LEN]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(key)?;
    file.sync_all()
}

/// Process-local keystore for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeystore {
    keys: Mutex<HashMap<String, [u8; KEY_LEN]>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Keystore for MemoryKeystore {
    fn load(&self, alias: &str) -> Result<Option<KeyHandle>> {
        let keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(keys.get(alias).map(KeyHandle::from_key_bytes))
    }

    fn generate(&self, alias: &str) -> Result<KeyHandle> {
        let key = random_key();
        let handle = KeyHandle::from_key_bytes(&key);
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mut old) = keys.insert(alias.to_string(), key) {
            old.zeroize();
        }
        Ok(handle)
    }
}

impl Drop for MemoryKeystore {
    fn drop(&mut self) {
        let keys = self.keys.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in keys.values_mut() {
            key.zeroize();
        }
    }
}
