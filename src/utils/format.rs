//! Human-readable rendering of live kinematics.

/// `mm:ss` below an hour, `hh:mm:ss` from an hour on. Negative or
/// non-finite inputs render as zero.
pub fn format_seconds(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (hours, minutes, secs) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

pub fn format_speed(meters_per_second: f64) -> String {
    format!("{meters_per_second:.2} m/s")
}

pub fn format_distance(meters: f64) -> String {
    format!("{meters:.0} m")
}
