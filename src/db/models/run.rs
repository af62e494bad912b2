//! Run-related data models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::track::Track;

/// Row id assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Persisted form of a run: the track is only present as ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: RunId,
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub uploaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: RunId,
    pub track: Track,
    pub uploaded: bool,
}

impl Run {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.track.started_at()
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.track.ended_at()
    }
}

/// What listing a row yields: the decrypted run, or a placeholder when the
/// row does not authenticate.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEntry {
    Intact(Run),
    Corrupted { id: RunId, uploaded: bool },
}

impl RunEntry {
    pub fn id(&self) -> RunId {
        match self {
            RunEntry::Intact(run) => run.id,
            RunEntry::Corrupted { id, .. } => *id,
        }
    }

    pub fn uploaded(&self) -> bool {
        match self {
            RunEntry::Intact(run) => run.uploaded,
            RunEntry::Corrupted { uploaded, .. } => *uploaded,
        }
    }

    pub fn as_run(&self) -> Option<&Run> {
        match self {
            RunEntry::Intact(run) => Some(run),
            RunEntry::Corrupted { .. } => None,
        }
    }

    pub fn into_run(self) -> Option<Run> {
        match self {
            RunEntry::Intact(run) => Some(run),
            RunEntry::Corrupted { .. } => None,
        }
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, RunEntry::Corrupted { .. })
    }
}
