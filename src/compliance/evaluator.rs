//! Classifies runs against a plan.
//!
//! Stateless: the status is recomputed from `(run, all runs, plan)` on
//! every call. Calendar dates, times of day and weekdays are taken in the
//! evaluator's time zone.

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};
use serde::Serialize;

use crate::{
    account::Plan,
    db::{Run, RunEntry, RunId},
    track::Sample,
};

use super::RunStatus;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunVerdict {
    pub id: RunId,
    /// `None` for rows that failed to decrypt.
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone)]
pub struct Evaluator<Tz: TimeZone> {
    tz: Tz,
}

impl Evaluator<Local> {
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl<Tz: TimeZone> Evaluator<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    fn local_time(&self, sample: &Sample) -> Option<DateTime<Tz>> {
        self.tz.timestamp_millis_opt(sample.timestamp_ms).single()
    }

    fn start_date(&self, run: &Run) -> Option<NaiveDate> {
        run.track
            .first()
            .and_then(|sample| self.local_time(sample))
            .map(|time| time.date_naive())
    }

    /// First match wins: upload state, then calendar window, then time of
    /// day and weekday, then distance, speed and the daily quota.
    pub fn evaluate(&self, run: &Run, all_runs: &[Run], plan: &Plan) -> RunStatus {
        if run.uploaded {
            return RunStatus::Uploaded;
        }

        let endpoints = run
            .track
            .first()
            .zip(run.track.last())
            .and_then(|(first, last)| Some((self.local_time(first)?, self.local_time(last)?)));
        let Some((start, end)) = endpoints else {
            return RunStatus::DateInvalid;
        };

        if !plan.covers_date(start.date_naive()) || !plan.covers_date(end.date_naive()) {
            return RunStatus::DateInvalid;
        }

        let in_window = plan.covers_time(start.num_seconds_from_midnight())
            && plan.covers_time(end.num_seconds_from_midnight());
        let on_valid_day =
            plan.allows_weekday(start.weekday()) && plan.allows_weekday(end.weekday());
        if !in_window || !on_valid_day {
            return RunStatus::TimeInvalid;
        }

        if run.track.distance_m() < plan.min_distance_m {
            return RunStatus::DistanceInvalid;
        }

        if !plan.covers_speed(run.track.average_speed()) {
            return RunStatus::SpeedInvalid;
        }

        if let Some(cap) = plan.max_times_per_day {
            let date = start.date_naive();
            let uploaded_same_day = all_runs
                .iter()
                .filter(|other| other.id != run.id && other.uploaded)
                .filter(|other| self.start_date(other) == Some(date))
                .count();
            if uploaded_same_day >= cap as usize {
                return RunStatus::Conflict;
            }
        }

        RunStatus::Pending
    }

    /// Classifies every listed entry; corrupted rows get no status.
    pub fn evaluate_entries(&self, entries: &[RunEntry], plan: &Plan) -> Vec<RunVerdict> {
        let runs: Vec<Run> = entries.iter().filter_map(|e| e.as_run().cloned()).collect();
        entries
            .iter()
            .map(|entry| RunVerdict {
                id: entry.id(),
                status: entry.as_run().map(|run| self.evaluate(run, &runs, plan)),
            })
            .collect()
    }
}
