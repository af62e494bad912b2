use serde::Serialize;

use crate::{account::User, db::Run};

/// Submission payload for one run. The transport decides how it is encoded
/// on the wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub start_time_secs: i64,
    pub end_time_secs: i64,
    pub token: String,
    pub school_id: String,
    pub distance_m: f64,
    pub average_speed: f64,
    pub student_id: String,
    pub attendance_type: String,
    pub event_id: String,
    /// `lat,lng;` for every sample, in order.
    pub points: String,
    pub duration_secs: i64,
}

impl UploadRequest {
    pub fn from_run(run: &Run, user: &User) -> Self {
        let track = &run.track;
        let seconds = |ms: Option<i64>| ms.unwrap_or_default().div_euclid(1000);
        let points: String = track
            .samples()
            .iter()
            .map(|s| format!("{},{};", s.latitude, s.longitude))
            .collect();

        Self {
            start_time_secs: seconds(track.first().map(|s| s.timestamp_ms)),
            end_time_secs: seconds(track.last().map(|s| s.timestamp_ms)),
            token: user.token.clone(),
            school_id: user.school_id.clone(),
            distance_m: track.distance_m(),
            average_speed: track.average_speed(),
            student_id: user.student_id.clone(),
            attendance_type: user.plan.attendance_type.clone(),
            event_id: user.plan.event_id.clone(),
            points,
            duration_secs: track.duration_secs().round() as i64,
        }
    }
}
