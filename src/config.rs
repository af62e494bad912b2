use std::path::PathBuf;

const DATA_DIR_VAR: &str = "RUNLOG_DATA_DIR";
const DEBUG_VAR: &str = "RUNLOG_DEBUG";
const LOG_LOCATIONS_VAR: &str = "RUNLOG_LOG_LOCATIONS";
const DEFAULT_DATA_DIR: &str = "./runlog-data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Heartbeat on every tick and allow edits of uploaded runs.
    pub debug: bool,
    pub log_locations: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| {
            lookup(name)
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        Self {
            data_dir: lookup(DATA_DIR_VAR)
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            debug: flag(DEBUG_VAR),
            log_locations: flag(LOG_LOCATIONS_VAR),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("records.sqlite3")
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.data_dir.join("prefs.json")
    }

    /// Directory the file keystore keeps its keys in.
    pub fn key_path(&self) -> PathBuf {
        self.data_dir.clone()
    }
}
