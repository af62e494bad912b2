//! Encrypted run store.
//!
//! Rows hold only ciphertext; encryption and decryption run on the blocking
//! pool and SQLite runs on the database thread, so nothing here blocks the
//! caller's executor. Every successful write is announced on a broadcast
//! channel so list owners can reconcile instead of mutating ad hoc.

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    crypto::{RecordCipher, SealedTrack},
    db::{Database, Run, RunEntry, RunId, RunRecord},
    track::Track,
};

const EVENT_CAPACITY: usize = 64;

/// Minimum samples for a track to count as a run.
pub const MIN_RUN_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum RecordEvent {
    Added(RunId),
    Updated(RunId),
    Deleted(RunId),
}

#[derive(Clone)]
pub struct RecordStore {
    db: Database,
    cipher: RecordCipher,
    events: broadcast::Sender<RecordEvent>,
}

impl RecordStore {
    pub fn new(db: Database, cipher: RecordCipher) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { db, cipher, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RecordEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn seal(&self, track: Track, uploaded: bool) -> Result<SealedTrack> {
        let cipher = self.cipher.clone();
        tokio::task::spawn_blocking(move || cipher.encrypt(&track, uploaded))
            .await
            .context("encryption worker join failed")?
    }

    async fn open_all(&self, records: Vec<RunRecord>) -> Result<Vec<RunEntry>> {
        let cipher = self.cipher.clone();
        tokio::task::spawn_blocking(move || {
            records
                .iter()
                .map(|record| open_entry(&cipher, record))
                .collect::<Vec<_>>()
        })
        .await
        .context("decryption worker join failed")
    }

    pub async fn add(&self, track: Track) -> Result<RunId> {
        if track.len() < MIN_RUN_SAMPLES {
            bail!(
                "refusing to store a track with {} samples (need at least {MIN_RUN_SAMPLES})",
                track.len()
            );
        }
        let sealed = self.seal(track, false).await?;
        let id = self.db.insert_record(sealed, false).await?;
        info!("Stored run {id}");
        self.publish(RecordEvent::Added(id));
        Ok(id)
    }

    /// Re-seals the run under a fresh IV and overwrites its row.
    pub async fn update(&self, run: &Run) -> Result<()> {
        let sealed = self.seal(run.track.clone(), run.uploaded).await?;
        self.db
            .update_record(RunRecord {
                id: run.id,
                ciphertext: sealed.ciphertext,
                iv: sealed.iv,
                uploaded: run.uploaded,
            })
            .await?;
        debug!("Updated run {} (uploaded={})", run.id, run.uploaded);
        self.publish(RecordEvent::Updated(run.id));
        Ok(())
    }

    pub async fn delete(&self, id: RunId) -> Result<bool> {
        let removed = self.db.delete_record(id).await?;
        if removed {
            info!("Deleted run {id}");
            self.publish(RecordEvent::Deleted(id));
        }
        Ok(removed)
    }

    pub async fn get(&self, id: RunId) -> Result<Option<RunEntry>> {
        let records: Vec<RunRecord> = self.db.get_record(id).await?.into_iter().collect();
        Ok(self.open_all(records).await?.pop())
    }

    /// Like [`get`](Self::get) but only yields runs that decrypt.
    pub async fn get_run(&self, id: RunId) -> Result<Run> {
        match self.get(id).await? {
            Some(RunEntry::Intact(run)) => Ok(run),
            Some(RunEntry::Corrupted { .. }) => Err(anyhow!("run {id} is corrupted")),
            None => Err(anyhow!("run {id} not found")),
        }
    }

    /// All runs in insertion order.
    pub async fn list(&self) -> Result<Vec<RunEntry>> {
        let records = self.db.list_records().await?;
        self.open_all(records).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.db.count_records().await
    }

    pub async fn last(&self) -> Result<Option<RunEntry>> {
        let records: Vec<RunRecord> = self.db.last_record().await?.into_iter().collect();
        Ok(self.open_all(records).await?.pop())
    }

    /// Opens one raw row. `None` when it fails authentication.
    pub async fn decrypt(&self, record: RunRecord) -> Result<Option<Track>> {
        let cipher = self.cipher.clone();
        tokio::task::spawn_blocking(move || cipher.decrypt_record(&record))
            .await
            .context("decryption worker join failed")
    }
}

fn open_entry(cipher: &RecordCipher, record: &RunRecord) -> RunEntry {
    match cipher.decrypt_record(record) {
        Some(track) => RunEntry::Intact(Run {
            id: record.id,
            track,
            uploaded: record.uploaded,
        }),
        None => RunEntry::Corrupted {
            id: record.id,
            uploaded: record.uploaded,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{crypto::MemoryKeystore, track::Sample};
    use rusqlite::{params, Connection};

    pub(crate) fn open_store(dir: &tempfile::TempDir) -> RecordStore {
        let cipher = RecordCipher::from_keystore(&MemoryKeystore::new()).unwrap();
        let db = Database::new(dir.path().join("records.sqlite3"), cipher.clone()).unwrap();
        RecordStore::new(db, cipher)
    }

    fn track(start_ms: i64) -> Track {
        (0..4)
            .map(|i| Sample::new(start_ms + i * 10_000, 30.0 + i as f64 * 0.0003, 120.0))
            .collect()
    }

    #[tokio::test]
    async fn add_then_read_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(&dir);

        let id = store.add(track(0)).await.unwrap();
        let run = store.get_run(id).await.unwrap();

        assert_eq!(run.track, track(0));
        assert!(!run.uploaded);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.last().await.unwrap().map(|e| e.id()), Some(id));
    }

    #[tokio::test]
    async fn short_tracks_are_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(&dir);

        assert!(store.add(Track::new()).await.is_err());
        assert!(store.add(vec![Sample::new(0, 1.0, 1.0)].into()).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_reseals_under_a_new_iv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(&dir);
        let id = store.add(track(0)).await.unwrap();
        let before = store.db.get_record(id).await.unwrap().unwrap();

        let mut run = store.get_run(id).await.unwrap();
        run.uploaded = true;
        store.update(&run).await.unwrap();

        let after = store.db.get_record(id).await.unwrap().unwrap();
        assert_ne!(before.iv, after.iv);
        assert!(after.uploaded);
        assert_eq!(store.decrypt(after.clone()).await.unwrap(), Some(track(0)));

        let mut flipped = after;
        flipped.uploaded = false;
        assert_eq!(store.decrypt(flipped).await.unwrap(), None);
    }

    #[tokio::test]
    async fn flipped_flag_on_disk_shows_as_corrupted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(&dir);
        let tampered = store.add(track(0)).await.unwrap();
        let fine = store.add(track(100_000)).await.unwrap();

        let path = store.db.path().to_path_buf();
        let conn = Connection::open(path).unwrap();
        conn.execute("UPDATE records SET uploaded = 1 WHERE id = ?1", params![tampered.0])
            .unwrap();

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            RunEntry::Corrupted {
                id: tampered,
                uploaded: true
            }
        );
        assert_eq!(entries[1].id(), fine);
        assert!(entries[1].as_run().is_some());
        assert!(store.get_run(tampered).await.is_err());
    }

    #[tokio::test]
    async fn writes_are_announced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(&dir);
        let mut events = store.subscribe();

        let id = store.add(track(0)).await.unwrap();
        let run = store.get_run(id).await.unwrap();
        store.update(&run).await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());

        assert_eq!(events.recv().await.unwrap(), RecordEvent::Added(id));
        assert_eq!(events.recv().await.unwrap(), RecordEvent::Updated(id));
        assert_eq!(events.recv().await.unwrap(), RecordEvent::Deleted(id));
        assert!(events.try_recv().is_err());
        assert!(store.get(id).await.unwrap().is_none());
    }
}
