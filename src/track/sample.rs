//! GPS samples and the tracks built from them.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::kinematics;

/// A single timestamped position fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    #[serde(rename = "timestampMillis")]
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }

    /// Returns a copy moved `offset_ms` along the time axis.
    pub fn shifted(&self, offset_ms: i64) -> Self {
        Self {
            timestamp_ms: self.timestamp_ms.saturating_add(offset_ms),
            ..*self
        }
    }
}

/// Ordered samples of one run. Serialises as a plain JSON array, which is
/// the plaintext the record cipher encrypts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Track(Vec<Sample>);

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.0
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.0.last()
    }

    pub fn push(&mut self, sample: Sample) {
        self.0.push(sample);
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.first().and_then(Sample::time)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.last().and_then(Sample::time)
    }

    pub fn duration_secs(&self) -> f64 {
        kinematics::duration(&self.0)
    }

    pub fn distance_m(&self) -> f64 {
        kinematics::distance(&self.0)
    }

    pub fn average_speed(&self) -> f64 {
        kinematics::average_speed(&self.0)
    }

    pub fn current_speed(&self) -> f64 {
        kinematics::current_speed(&self.0)
    }

    /// Moves every sample so the first one lands on `start`.
    pub fn shifted_to_start(&self, start: DateTime<Utc>) -> Self {
        let Some(first) = self.first() else {
            return self.clone();
        };
        let offset = start.timestamp_millis() - first.timestamp_ms;
        Self(self.0.iter().map(|sample| sample.shifted(offset)).collect())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl From<Vec<Sample>> for Track {
    fn from(samples: Vec<Sample>) -> Self {
        Self(samples)
    }
}

impl FromIterator<Sample> for Track {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
