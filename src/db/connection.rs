use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use crate::crypto::RecordCipher;

use super::migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Owns the SQLite thread. Dropping the last handle closes the job channel,
/// which ends the thread's loop, and then joins it.
struct Worker {
    jobs: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.jobs.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Database worker panicked");
            }
        }
    }
}

fn open_connection(path: &Path, cipher: &RecordCipher) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Could not switch {} to WAL: {err}", path.display());
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;

    run_migrations(&mut conn, cipher).context("failed to run database migrations")?;
    Ok(conn)
}

/// Handle to the record database. All SQLite work runs on one dedicated
/// thread; callers await the result of each job.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens (or creates) the database and brings it to the current schema.
    /// The cipher is needed because some migrations re-encrypt rows.
    pub fn new(db_path: PathBuf, cipher: RecordCipher) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let worker_path = db_path.clone();

        let thread = thread::Builder::new()
            .name("runlog-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&worker_path, &cipher) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for job in jobs_rx {
                    job(&mut conn);
                }
                debug!("Database worker for {} stopped", worker_path.display());
            })
            .context("failed to spawn database worker")?;

        ready_rx
            .recv()
            .context("database worker exited during start-up")??;
        info!("Database ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: Some(jobs_tx),
                thread: Some(thread),
            }),
            path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the database thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have given up waiting.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("database is closed"))?
            .send(job)
            .map_err(|_| anyhow!("database worker is gone"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database worker dropped the request"))?
    }
}
