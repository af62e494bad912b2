//! The running plan a run is checked against.

use anyhow::{bail, Result};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: u32 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub event_name: String,
    pub event_id: String,
    pub attendance_type: String,
    pub min_distance_m: f64,
    /// Meters per second.
    pub min_speed: f64,
    pub max_speed: f64,
    /// `None` means no daily cap.
    pub max_times_per_day: Option<u32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Seconds after local midnight, inclusive on both ends.
    pub start_time_secs: u32,
    pub end_time_secs: u32,
    pub weekdays: Vec<Weekday>,
}

impl Plan {
    pub fn validate(&self) -> Result<()> {
        let speeds_ordered = self.min_speed <= self.max_speed;
        if !speeds_ordered {
            bail!(
                "speed range {}-{} is inverted or not a number",
                self.min_speed,
                self.max_speed
            );
        }
        if self.start_date > self.end_date {
            bail!("date range {} to {} is inverted", self.start_date, self.end_date);
        }
        if self.start_time_secs > self.end_time_secs {
            bail!(
                "time window {}s to {}s is inverted",
                self.start_time_secs,
                self.end_time_secs
            );
        }
        if self.end_time_secs > SECONDS_PER_DAY {
            bail!("time window ends after midnight ({}s)", self.end_time_secs);
        }
        if self.weekdays.is_empty() {
            bail!("plan allows no weekdays");
        }
        Ok(())
    }

    pub fn covers_date(&self, date: NaiveDate) -> bool {
        (self.start_date..=self.end_date).contains(&date)
    }

    pub fn covers_time(&self, seconds_of_day: u32) -> bool {
        (self.start_time_secs..=self.end_time_secs).contains(&seconds_of_day)
    }

    pub fn allows_weekday(&self, weekday: Weekday) -> bool {
        self.weekdays.contains(&weekday)
    }

    pub fn covers_speed(&self, speed: f64) -> bool {
        (self.min_speed..=self.max_speed).contains(&speed)
    }
}
