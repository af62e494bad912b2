use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::RunId,
    log_error, log_info, log_warn,
    prefs::{Preferences, KEY_INCOMPLETE_TRACK},
    records::{store::MIN_RUN_SAMPLES, RecordStore},
    track::Track,
};

use super::{LocationFix, RecorderSnapshot, RecorderState, RecorderStatus};

const ENABLE_LOGS: bool = true;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FinishOutcome {
    /// Stored as a new run.
    Saved { id: RunId },
    /// Too short to keep.
    Discarded { samples: usize },
    /// Kept in preferences for the next `start`.
    Interrupted { samples: usize },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "payload")]
pub enum RecorderEvent {
    Started {
        session_id: String,
        resumed_samples: usize,
    },
    Tick(RecorderSnapshot),
    Finished {
        session_id: String,
        outcome: FinishOutcome,
    },
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct RecorderController {
    state: Arc<Mutex<RecorderState>>,
    store: RecordStore,
    prefs: Arc<dyn Preferences>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    events: broadcast::Sender<RecorderEvent>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
    log_locations: bool,
}

impl RecorderController {
    pub fn new(store: RecordStore, prefs: Arc<dyn Preferences>, config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(RecorderState::new())),
            store,
            prefs,
            ticker: Arc::new(Mutex::new(None)),
            events,
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: if config.debug { 1 } else { 10 },
            log_locations: config.log_locations,
        }
    }

    #[cfg(test)]
    fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> RecorderSnapshot {
        self.state.lock().await.snapshot(Utc::now())
    }

    /// Number of samples in a partial track left by an interrupted session.
    pub fn pending_resume(&self) -> Option<usize> {
        self.prefs
            .get(KEY_INCOMPLETE_TRACK)
            .and_then(|json| Track::from_json(&json).ok())
            .map(|track| track.len())
    }

    /// Begins recording, continuing any interrupted track. Does nothing if a
    /// session is already running.
    pub async fn start(&self) -> Result<RecorderSnapshot> {
        // The ticker slot is only touched under the state lock, so a session
        // and its ticker change together.
        let (session_id, resumed_samples) = {
            let mut state = self.state.lock().await;
            if state.status == RecorderStatus::Recording {
                return Ok(state.snapshot(Utc::now()));
            }

            let resumed = self.take_incomplete_track()?;
            let resumed_samples = resumed.len();
            let session_id = Uuid::new_v4().to_string();
            state.begin_session(session_id.clone(), Utc::now(), resumed);
            self.spawn_ticker().await;
            (session_id, resumed_samples)
        };

        if resumed_samples > 0 {
            log_info!("Recording {session_id} resumed with {resumed_samples} samples");
        } else {
            log_info!("Recording {session_id} started");
        }
        let _ = self.events.send(RecorderEvent::Started {
            session_id,
            resumed_samples,
        });

        Ok(self.snapshot().await)
    }

    fn take_incomplete_track(&self) -> Result<Track> {
        let Some(json) = self.prefs.get(KEY_INCOMPLETE_TRACK) else {
            return Ok(Track::new());
        };
        self.prefs
            .remove(KEY_INCOMPLETE_TRACK)
            .context("failed to clear the saved partial track")?;
        Ok(Track::from_json(&json).unwrap_or_else(|err| {
            log_warn!("Dropping unreadable partial track: {err}");
            Track::new()
        }))
    }

    /// Feeds one provider callback. Returns whether the fix was recorded.
    pub async fn on_location(&self, fix: LocationFix) -> bool {
        if self.log_locations {
            log_info!(
                "Location fix: t={} lat={} lng={} source={:?}",
                fix.timestamp_ms,
                fix.latitude,
                fix.longitude,
                fix.source
            );
        }
        if !fix.is_recordable() {
            return false;
        }

        let mut state = self.state.lock().await;
        if state.status != RecorderStatus::Recording {
            return false;
        }
        let appended = state.append(fix.to_sample());
        if !appended {
            log_warn!("Dropping out-of-order fix at {}", fix.timestamp_ms);
        }
        appended
    }

    /// Ends the session. A normal finish stores the run when it is long
    /// enough; an abnormal one saves the partial track for the next start.
    pub async fn finish(&self, normal: bool) -> Result<FinishOutcome> {
        let (session_id, track, ticker) = {
            let mut state = self.state.lock().await;
            if state.status != RecorderStatus::Recording {
                bail!("no recording in progress");
            }
            let session_id = state.session_id.clone().unwrap_or_default();
            let ticker = self.ticker.lock().await.take();
            (session_id, state.take_track(), ticker)
        };

        // The task may be waiting on the state lock, so stop it only after
        // the lock is released.
        stop_ticker(ticker).await;

        let samples = track.len();
        let outcome = if !normal {
            if samples > 0 {
                self.save_incomplete_track(&track)?;
            }
            log_info!("Recording {session_id} interrupted with {samples} samples");
            FinishOutcome::Interrupted { samples }
        } else if samples < MIN_RUN_SAMPLES {
            log_info!("Recording {session_id} discarded with {samples} samples");
            FinishOutcome::Discarded { samples }
        } else {
            match self.store.add(track.clone()).await {
                Ok(id) => {
                    log_info!("Recording {session_id} saved as run {id}");
                    FinishOutcome::Saved { id }
                }
                Err(err) => {
                    log_error!("Failed to store recording {session_id}: {err:#}");
                    self.save_incomplete_track(&track)?;
                    return Err(err.context("recording kept as a partial track"));
                }
            }
        };

        let _ = self.events.send(RecorderEvent::Finished {
            session_id,
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    fn save_incomplete_track(&self, track: &Track) -> Result<()> {
        let json = track.to_json().context("failed to encode partial track")?;
        self.prefs
            .put(KEY_INCOMPLETE_TRACK, json)
            .context("failed to save partial track")
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;
        let heartbeat_every = self.heartbeat_every_ticks.max(1);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            let mut ticks: u32 = 0;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let snapshot = {
                    let guard = state.lock().await;
                    if guard.status != RecorderStatus::Recording {
                        break;
                    }
                    guard.snapshot(Utc::now())
                };

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    log_info!("Recorder heartbeat: {}", snapshot.summary());
                }
                let _ = events.send(RecorderEvent::Tick(snapshot));
            }
        });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

}

async fn stop_ticker(ticker: Option<Ticker>) {
    if let Some(ticker) = ticker {
        ticker.cancel.cancel();
        if let Err(err) = ticker.handle.await {
            log_error!("Recorder ticker ended abnormally: {err}");
        }
    }
}
