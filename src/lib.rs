pub mod account;
pub mod compliance;
pub mod config;
pub mod crypto;
pub mod db;
pub mod prefs;
pub mod recorder;
pub mod records;
pub mod track;
pub mod transport;
pub mod upload;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use account::AccountContext;
use compliance::Evaluator;
use config::AppConfig;
use crypto::{FileKeystore, RecordCipher};
use db::{Database, RunEntry};
use prefs::{FilePreferences, Preferences};
use recorder::RecorderController;
use records::{RecordEditor, RecordStore};
use utils::{format_distance, format_seconds, format_speed};

/// Long-lived services shared by every flow.
pub struct AppState {
    pub config: AppConfig,
    pub prefs: Arc<dyn Preferences>,
    pub account: Arc<AccountContext>,
    pub store: RecordStore,
    pub editor: RecordEditor,
    pub recorder: RecorderController,
}

impl AppState {
    pub fn open(config: AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data dir {}", config.data_dir.display())
        })?;

        let prefs: Arc<dyn Preferences> = Arc::new(FilePreferences::new(config.prefs_path())?);
        let keystore = FileKeystore::new(config.key_path())?;
        let cipher = RecordCipher::from_keystore(&keystore)?;
        let database = Database::new(config.db_path(), cipher.clone())?;
        let store = RecordStore::new(database, cipher);

        Ok(Self {
            account: Arc::new(AccountContext::new(prefs.clone())),
            editor: RecordEditor::new(store.clone(), config.debug),
            recorder: RecorderController::new(store.clone(), prefs.clone(), &config),
            store,
            prefs,
            config,
        })
    }
}

async fn print_runs(state: &AppState) -> Result<()> {
    let entries = state.store.list().await?;
    let user = state.account.current();
    if user.is_none() {
        warn!("No account bound; statuses are not available");
    }

    let verdicts = user
        .as_ref()
        .map(|user| Evaluator::local().evaluate_entries(&entries, &user.plan));

    println!("{} stored run(s)", entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let status = verdicts
            .as_ref()
            .and_then(|verdicts| verdicts[index].status)
            .map(|status| status.to_string())
            .unwrap_or_else(|| "-".to_string());

        match entry {
            RunEntry::Intact(run) => {
                let started = run
                    .started_at()
                    .map(|at| at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "#{:<4} {started}  {:>8}  {:>9}  {:>10}  {status}",
                    run.id,
                    format_seconds(run.track.duration_secs()),
                    format_distance(run.track.distance_m()),
                    format_speed(run.track.average_speed()),
                );
            }
            RunEntry::Corrupted { id, .. } => println!("#{id:<4} corrupted"),
        }
    }
    Ok(())
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("runlog starting up...");

    let config = AppConfig::from_env();
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    runtime.block_on(async move {
        let state = AppState::open(config)?;

        if let Some(samples) = state.recorder.pending_resume() {
            warn!(
                "Found an interrupted recording with {samples} samples; \
                 it resumes on the next start"
            );
        }

        print_runs(&state).await
    })
}
