use serde::{Deserialize, Serialize};

use super::Plan;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// The bound student account together with its plan snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub student_id: String,
    pub name: String,
    pub gender: Gender,
    pub admission_year: String,
    pub class_id: String,
    pub school_id: String,
    pub school_name: String,
    pub token: String,
    pub api_url: String,
    pub plan: Plan,
}
