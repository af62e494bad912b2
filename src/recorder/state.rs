use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    track::{self, DistanceAccumulator, Sample, Track},
    utils::{format_distance, format_seconds, format_speed},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RecorderStatus {
    #[default]
    Idle,
    Recording,
}

#[derive(Debug, Clone, Default)]
pub struct RecorderState {
    pub status: RecorderStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    track: Track,
    distance: DistanceAccumulator,
}

impl RecorderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Starts a session, continuing `resumed` if a partial track was saved.
    pub fn begin_session(&mut self, session_id: String, started_at: DateTime<Utc>, resumed: Track) {
        *self = Self {
            status: RecorderStatus::Recording,
            session_id: Some(session_id),
            started_at: Some(started_at),
            distance: DistanceAccumulator::from_samples(resumed.samples()),
            track: resumed,
        };
    }

    /// Appends `sample` unless it is not newer than the last one.
    pub fn append(&mut self, sample: Sample) -> bool {
        if let Some(last) = self.track.last() {
            if sample.timestamp_ms <= last.timestamp_ms {
                return false;
            }
        }
        self.distance.push(sample);
        self.track.push(sample);
        true
    }

    /// Ends the session, handing back its track.
    pub fn take_track(&mut self) -> Track {
        std::mem::take(self).track
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> RecorderSnapshot {
        let samples = self.track.samples();
        RecorderSnapshot {
            status: self.status,
            session_id: self.session_id.clone(),
            samples: samples.len(),
            elapsed_secs: track::duration_to(samples, now),
            distance_m: self.distance.total_m(),
            average_speed: track::average_speed(samples),
            current_speed: track::current_speed(samples),
        }
    }
}

/// Live kinematics published on every tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecorderSnapshot {
    pub status: RecorderStatus,
    pub session_id: Option<String>,
    pub samples: usize,
    pub elapsed_secs: f64,
    pub distance_m: f64,
    pub average_speed: f64,
    pub current_speed: f64,
}

impl RecorderSnapshot {
    pub fn has_fix(&self) -> bool {
        self.samples >= 2
    }

    /// Status line for a persistent notification.
    pub fn summary(&self) -> String {
        if !self.has_fix() {
            return "Waiting for location...".to_string();
        }
        format!(
            "Current {} | Average {} | Time {} | Distance {}",
            format_speed(self.current_speed),
            format_speed(self.average_speed),
            format_seconds(self.elapsed_secs),
            format_distance(self.distance_m),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn stale_and_duplicate_samples_are_dropped() {
        let mut state = RecorderState::new();
        state.begin_session("s".into(), at(0), Track::new());

        assert!(state.append(Sample::new(1_000, 30.0, 120.0)));
        assert!(!state.append(Sample::new(1_000, 30.1, 120.0)));
        assert!(!state.append(Sample::new(500, 30.1, 120.0)));
        assert!(state.append(Sample::new(2_000, 30.001, 120.0)));

        assert_eq!(state.track().len(), 2);
    }

    #[test]
    fn resumed_track_seeds_the_distance() {
        let resumed: Track = vec![
            Sample::new(0, 30.0, 120.0),
            Sample::new(60_000, 30.001, 120.0),
        ]
        .into();
        let mut state = RecorderState::new();
        state.begin_session("s".into(), at(120_000), resumed);
        state.append(Sample::new(120_000, 30.002, 120.0));

        let snapshot = state.snapshot(at(150_000));
        assert_eq!(snapshot.samples, 3);
        assert!((snapshot.distance_m - state.track().distance_m()).abs() < 1e-6);
        assert!((snapshot.elapsed_secs - 150.0).abs() < 1e-9);
    }

    #[test]
    fn take_track_returns_to_idle() {
        let mut state = RecorderState::new();
        state.begin_session("s".into(), at(0), Track::new());
        state.append(Sample::new(1, 30.0, 120.0));

        let track = state.take_track();

        assert_eq!(track.len(), 1);
        assert_eq!(state.status, RecorderStatus::Idle);
        assert!(state.session_id.is_none());
        assert!(state.track().is_empty());
    }

    #[test]
    fn summary_waits_for_two_fixes() {
        let mut state = RecorderState::new();
        state.begin_session("s".into(), at(0), Track::new());
        state.append(Sample::new(0, 30.0, 120.0));
        assert_eq!(state.snapshot(at(5_000)).summary(), "Waiting for location...");

        state.append(Sample::new(100_000, 30.001, 120.0));
        let summary = state.snapshot(at(125_000)).summary();
        assert_eq!(
            summary,
            "Current 1.11 m/s | Average 1.11 m/s | Time 02:05 | Distance 111 m"
        );
    }
}
