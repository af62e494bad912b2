//! App-scoped holder of the bound account.
//!
//! One account per installation. The snapshot is read from preferences on
//! first access and cached; only [`AccountContext::replace`] and
//! [`AccountContext::clear`] change it afterwards.

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::prefs::{Preferences, KEY_USER};

use super::User;

enum Cached {
    Unloaded,
    Loaded(Option<Arc<User>>),
}

pub struct AccountContext {
    prefs: Arc<dyn Preferences>,
    cached: RwLock<Cached>,
}

impl AccountContext {
    pub fn new(prefs: Arc<dyn Preferences>) -> Self {
        Self {
            prefs,
            cached: RwLock::new(Cached::Unloaded),
        }
    }

    /// The bound user, or `None` when no account is bound.
    pub fn current(&self) -> Option<Arc<User>> {
        {
            let guard = self.cached.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Cached::Loaded(user) = &*guard {
                return user.clone();
            }
        }
        self.load()
    }

    /// Re-reads the snapshot from preferences, replacing the cache.
    pub fn load(&self) -> Option<Arc<User>> {
        let user = self.prefs.get(KEY_USER).and_then(|json| {
            serde_json::from_str::<User>(&json)
                .map_err(|err| warn!("Ignoring unreadable account snapshot: {err}"))
                .ok()
                .map(Arc::new)
        });
        let mut guard = self.cached.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Cached::Loaded(user.clone());
        user
    }

    pub fn replace(&self, user: User) -> Result<Arc<User>> {
        let json = serde_json::to_string(&user).context("failed to encode account snapshot")?;
        self.prefs
            .put(KEY_USER, json)
            .context("failed to persist account snapshot")?;
        info!("Bound account {} at school {}", user.student_id, user.school_id);

        let user = Arc::new(user);
        let mut guard = self.cached.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Cached::Loaded(Some(user.clone()));
        Ok(user)
    }

    pub fn clear(&self) -> Result<()> {
        self.prefs.remove(KEY_USER)?;
        let mut guard = self.cached.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Cached::Loaded(None);
        Ok(())
    }
}
