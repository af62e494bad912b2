//! Submitting eligible runs to the school server.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use log::{info, warn};
use thiserror::Error;

use crate::{
    account::{AccountContext, ApiError, UploadResponse},
    compliance::{Evaluator, RunStatus, RunVerdict},
    db::{Run, RunEntry, RunId},
    records::RecordStore,
    transport::Transport,
};

use super::UploadRequest;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no account is bound")]
    NotBound,
    #[error("run {0} does not exist")]
    NotFound(RunId),
    #[error("run {0} cannot be decrypted")]
    Corrupted(RunId),
    #[error("run {id} is not eligible for upload ({status})")]
    NotEligible { id: RunId, status: RunStatus },
    #[error("upload request failed: {0:#}")]
    Transport(anyhow::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("record store error: {0:#}")]
    Store(anyhow::Error),
}

pub struct UploadService<T: Transport, Tz: TimeZone = Local> {
    store: RecordStore,
    context: Arc<AccountContext>,
    transport: T,
    evaluator: Evaluator<Tz>,
}

impl<T: Transport> UploadService<T, Local> {
    pub fn new(store: RecordStore, context: Arc<AccountContext>, transport: T) -> Self {
        Self::with_evaluator(store, context, transport, Evaluator::local())
    }
}

impl<T: Transport, Tz: TimeZone> UploadService<T, Tz> {
    pub fn with_evaluator(
        store: RecordStore,
        context: Arc<AccountContext>,
        transport: T,
        evaluator: Evaluator<Tz>,
    ) -> Self {
        Self {
            store,
            context,
            transport,
            evaluator,
        }
    }

    async fn entries(&self) -> Result<Vec<RunEntry>, UploadError> {
        self.store.list().await.map_err(UploadError::Store)
    }

    /// Status of every stored run under the bound account's plan.
    pub async fn verdicts(&self) -> Result<Vec<RunVerdict>, UploadError> {
        let user = self.context.current().ok_or(UploadError::NotBound)?;
        let entries = self.entries().await?;
        Ok(self.evaluator.evaluate_entries(&entries, &user.plan))
    }

    /// Uploads a `Pending` run and marks it uploaded. Returns the server's
    /// reply text. On any failure the stored flag is left as it was.
    pub async fn upload(&self, id: RunId) -> Result<String, UploadError> {
        let user = self.context.current().ok_or(UploadError::NotBound)?;

        let entries = self.entries().await?;
        let entry = entries
            .iter()
            .find(|entry| entry.id() == id)
            .ok_or(UploadError::NotFound(id))?;
        let mut run = entry.as_run().cloned().ok_or(UploadError::Corrupted(id))?;
        let runs: Vec<Run> = entries.iter().filter_map(|e| e.as_run().cloned()).collect();

        let status = self.evaluator.evaluate(&run, &runs, &user.plan);
        if !status.is_uploadable() {
            return Err(UploadError::NotEligible { id, status });
        }

        let request = UploadRequest::from_run(&run, &user);
        let body = self
            .transport
            .upload(&user.api_url, &request)
            .await
            .map_err(UploadError::Transport)?;
        let message = match UploadResponse::decode(&body).and_then(|r| r.into_server_message()) {
            Ok(message) => message,
            Err(err) => {
                warn!("Upload of run {id} was not accepted: {err}");
                return Err(err.into());
            }
        };

        run.uploaded = true;
        self.store.update(&run).await.map_err(UploadError::Store)?;
        info!(
            "Uploaded run {id} ({:.0} m, {:.2} m/s)",
            request.distance_m, request.average_speed
        );
        Ok(message)
    }
}
