//! Manual edits of stored runs: moving a run in time, duplicating it, and
//! toggling its upload flag. Touching an uploaded run needs admin edits.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use log::info;
use rand::Rng;

use crate::{
    db::{Run, RunId},
    track::{Sample, Track},
};

use super::RecordStore;

const COPY_TIME_JITTER_MS: i64 = 500;
/// In micro-degrees, roughly a meter.
const COPY_COORD_JITTER_MICRO_DEG: i32 = 10;

#[derive(Clone)]
pub struct RecordEditor {
    store: RecordStore,
    allow_admin_edits: bool,
}

impl RecordEditor {
    pub fn new(store: RecordStore, allow_admin_edits: bool) -> Self {
        Self {
            store,
            allow_admin_edits,
        }
    }

    async fn editable_run(&self, id: RunId) -> Result<Run> {
        let run = self.store.get_run(id).await?;
        if run.uploaded && !self.allow_admin_edits {
            bail!("run {id} is already uploaded and cannot be edited");
        }
        Ok(run)
    }

    /// Moves the run so its first sample starts at `start`, keeping spacing.
    pub async fn shift_start(&self, id: RunId, start: DateTime<Utc>) -> Result<Run> {
        let mut run = self.editable_run(id).await?;
        run.track = run.track.shifted_to_start(start);
        self.store.update(&run).await?;
        info!("Moved run {id} to start at {start}");
        Ok(run)
    }

    /// Stores a slightly perturbed duplicate as a new, not-uploaded run.
    pub async fn copy(&self, id: RunId) -> Result<RunId> {
        let run = self.editable_run(id).await?;
        let track = jittered(&run.track, &mut rand::thread_rng());
        let new_id = self.store.add(track).await?;
        info!("Copied run {id} to {new_id}");
        Ok(new_id)
    }

    pub async fn set_uploaded(&self, id: RunId, uploaded: bool) -> Result<Run> {
        if !self.allow_admin_edits {
            bail!("changing the upload flag requires admin edits");
        }
        let mut run = self.store.get_run(id).await?;
        run.uploaded = uploaded;
        self.store.update(&run).await?;
        Ok(run)
    }
}

fn jittered<R: Rng>(track: &Track, rng: &mut R) -> Track {
    let jitter_coord = |value: f64, rng: &mut R| {
        let offset = rng.gen_range(-COPY_COORD_JITTER_MICRO_DEG..=COPY_COORD_JITTER_MICRO_DEG);
        (value * 1_000_000.0 + f64::from(offset)) / 1_000_000.0
    };

    track
        .samples()
        .iter()
        .map(|sample| {
            let timestamp_ms = sample.timestamp_ms
                + rng.gen_range(-COPY_TIME_JITTER_MS..=COPY_TIME_JITTER_MS);
            let latitude = jitter_coord(sample.latitude, rng);
            let longitude = jitter_coord(sample.longitude, rng);
            Sample::new(timestamp_ms, latitude, longitude)
        })
        .collect()
}
