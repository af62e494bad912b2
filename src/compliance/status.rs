use serde::{Deserialize, Serialize};

/// Classification of a run against the plan. Variants are listed in the
/// order the evaluator checks them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Uploaded,
    DateInvalid,
    TimeInvalid,
    DistanceInvalid,
    SpeedInvalid,
    Conflict,
    Pending,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Uploaded => "Uploaded",
            RunStatus::DateInvalid => "DateInvalid",
            RunStatus::TimeInvalid => "TimeInvalid",
            RunStatus::DistanceInvalid => "DistanceInvalid",
            RunStatus::SpeedInvalid => "SpeedInvalid",
            RunStatus::Conflict => "Conflict",
            RunStatus::Pending => "Pending",
        }
    }

    pub fn is_uploadable(&self) -> bool {
        matches!(self, RunStatus::Pending)
    }

    /// Runs that can never become uploadable; the user may delete them.
    pub fn is_deletable(&self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Uploaded)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
