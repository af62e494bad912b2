//! Durable key-value storage for small JSON blobs (bound account, partial
//! tracks).

use anyhow::{Context, Result};
use log::warn;
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};
use tempfile::NamedTempFile;

pub const KEY_USER: &str = "user";
pub const KEY_INCOMPLETE_TRACK: &str = "incomplete_track";

pub trait Preferences: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// All entries live in one JSON object on disk. Every change writes a new
/// file next to it and renames it into place; memory follows only once the
/// file is in place.
pub struct FilePreferences {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FilePreferences {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable preferences at {}: {err}", path.display());
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        let serialized = serde_json::to_string_pretty(data)?;
        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to stage preferences in {}", parent.display()))?;
        temp.write_all(serialized.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to write preferences to {}", self.path.display()))?;
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = guard.clone();
        if change(&mut next) {
            self.persist(&next)?;
            *guard = next;
        }
        Ok(())
    }
}

impl Preferences for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        self.update(|data| {
            data.insert(key.to_string(), value);
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|data| data.remove(key).is_some())
    }
}

#[derive(Default)]
pub struct MemoryPreferences {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(key);
        Ok(())
    }
}
