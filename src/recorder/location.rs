use serde::{Deserialize, Serialize};

use crate::track::Sample;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FixSource {
    Gps,
    Network,
    /// Blended by the platform from several providers.
    Fused,
}

/// One callback from the location provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub timestamp_ms: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub source: FixSource,
}

impl LocationFix {
    pub fn gps(timestamp_ms: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
            source: FixSource::Gps,
        }
    }

    /// Only satellite fixes are precise enough to record.
    pub fn is_recordable(&self) -> bool {
        self.source == FixSource::Gps
    }

    pub fn to_sample(&self) -> Sample {
        Sample::new(self.timestamp_ms, self.latitude, self.longitude)
    }
}
