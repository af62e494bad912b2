//! Distance, duration and speed over ordered samples.
//!
//! All functions read the samples in stored order and only look at the
//! first and last element for timing, so a reordered slice degrades to a
//! wrong-but-finite answer instead of a panic.

use chrono::{DateTime, Utc};

use super::Sample;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Samples used for the smoothed live speed reading.
const CURRENT_SPEED_WINDOW: usize = 3;

/// Haversine distance between two samples, in meters.
pub fn great_circle_distance(a: &Sample, b: &Sample) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Seconds between the first and last sample; 0 for an empty slice.
pub fn duration(samples: &[Sample]) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (last.timestamp_ms - first.timestamp_ms) as f64 / 1000.0,
        _ => 0.0,
    }
}

/// Seconds from the first sample until `now`. Only meaningful while a track
/// is still being recorded.
pub fn duration_to(samples: &[Sample], now: DateTime<Utc>) -> f64 {
    samples
        .first()
        .map(|first| (now.timestamp_millis() - first.timestamp_ms) as f64 / 1000.0)
        .unwrap_or(0.0)
}

/// Sum of the great-circle legs between consecutive samples, in meters.
pub fn distance(samples: &[Sample]) -> f64 {
    samples
        .windows(2)
        .map(|pair| great_circle_distance(&pair[0], &pair[1]))
        .sum()
}

/// Meters per second over the whole slice.
pub fn average_speed(samples: &[Sample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let secs = duration(samples);
    if secs == 0.0 {
        return 0.0;
    }
    distance(samples) / secs
}

/// Average speed over the last few samples.
pub fn current_speed(samples: &[Sample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let start = samples.len().saturating_sub(CURRENT_SPEED_WINDOW);
    average_speed(&samples[start..])
}

/// Append-only running distance so live readings stay O(1) per fix.
#[derive(Debug, Clone, Default)]
pub struct DistanceAccumulator {
    total_m: f64,
    last: Option<Sample>,
}

impl DistanceAccumulator {
    pub fn from_samples(samples: &[Sample]) -> Self {
        Self {
            total_m: distance(samples),
            last: samples.last().copied(),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if let Some(prev) = self.last {
            self.total_m += great_circle_distance(&prev, &sample);
        }
        self.last = Some(sample);
    }

    pub fn total_m(&self) -> f64 {
        self.total_m
    }
}
