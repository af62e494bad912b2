//! Typed decoding of the school server's responses.
//!
//! Each endpoint gets an explicit schema; anything that does not match is
//! an [`ApiError`] and the request counts as failed.

use chrono::{NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Gender, Plan};

const SUCCESS_CODE: &str = "1";

/// Every successful login reply starts with the name field.
const PROFILE_PREFIX: &str = "姓名:";
const MALE_LABEL: &str = "男";

/// 0-based weekday numbering used by the plan endpoint.
const WEEKDAYS_FROM_MONDAY: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server rejected the request (code {0})")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchoolInfo {
    #[serde(rename = "schoolno")]
    pub id: String,
    #[serde(rename = "schoolname")]
    pub name: String,
}

pub fn decode_schools(body: &str) -> Result<Vec<SchoolInfo>, ApiError> {
    Ok(serde_json::from_str(body)?)
}

/// Comma-separated `status,api_url,token` line returned by the bind call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindResponse {
    pub api_url: String,
    pub token: String,
}

impl BindResponse {
    pub fn parse(body: &str) -> Result<Self, ApiError> {
        let fields: Vec<&str> = body.trim().split(',').map(str::trim).collect();
        match fields.as_slice() {
            [_, api_url, token, ..] if !api_url.is_empty() && !token.is_empty() => Ok(Self {
                api_url: api_url.to_string(),
                token: token.to_string(),
            }),
            _ => Err(ApiError::Malformed(format!(
                "bind response has {} fields",
                fields.len()
            ))),
        }
    }
}

/// Login reply: `姓名:<name>,性别:<gender>,<year label>:<year>,<class label>:<class>`.
/// Any other body is the server's error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileResponse {
    pub name: String,
    pub gender: Gender,
    pub admission_year: String,
    pub class_id: String,
}

impl ProfileResponse {
    pub fn parse(body: &str) -> Result<Self, ApiError> {
        let body = body.trim();
        if !body.starts_with(PROFILE_PREFIX) {
            return Err(ApiError::Rejected(body.to_string()));
        }

        let values = body
            .split(',')
            .map(|field| {
                field
                    .split_once(':')
                    .map(|(_, value)| value.trim())
                    .ok_or_else(|| ApiError::Malformed(format!("profile field '{field}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            [name, gender, admission_year, class_id, ..] => Ok(Self {
                name: name.to_string(),
                gender: if *gender == MALE_LABEL {
                    Gender::Male
                } else {
                    Gender::Female
                },
                admission_year: admission_year.to_string(),
                class_id: class_id.to_string(),
            }),
            _ => Err(ApiError::Malformed(format!(
                "profile has {} fields",
                values.len()
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanResponse {
    r: String,
    #[serde(default)]
    m: Vec<ApiPlan>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiPlan {
    atttype: String,
    eventname: String,
    eventno: String,
    femalemiles: String,
    femalespeed: String,
    malemiles: String,
    malespeed: String,
    maxtimesperday: String,
    rulestartdt: String,
    ruleenddt: String,
    starttms: String,
    endtms: String,
    weekrg: String,
}

impl PlanResponse {
    pub fn decode(body: &str) -> Result<Self, ApiError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Builds the plan for the given gender from the first plan entry.
    pub fn into_plan(self, gender: Gender) -> Result<Plan, ApiError> {
        if self.r != SUCCESS_CODE {
            return Err(ApiError::Rejected(self.r));
        }
        let api = self
            .m
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Malformed("plan list is empty".into()))?;

        let (miles, speed) = match gender {
            Gender::Male => (&api.malemiles, &api.malespeed),
            Gender::Female => (&api.femalemiles, &api.femalespeed),
        };
        let min_distance_m = parse_number(miles, "distance")?;
        let (min_speed, max_speed) = parse_speed_range(speed)?;

        Ok(Plan {
            event_name: api.eventname,
            event_id: api.eventno,
            attendance_type: api.atttype,
            min_distance_m,
            min_speed,
            max_speed,
            max_times_per_day: parse_daily_cap(&api.maxtimesperday)?,
            start_date: parse_date(&api.rulestartdt)?,
            end_date: parse_date(&api.ruleenddt)?,
            start_time_secs: parse_seconds_of_day(&api.starttms)?,
            end_time_secs: parse_seconds_of_day(&api.endtms)?,
            weekdays: parse_weekdays(&api.weekrg),
        })
    }
}

/// `{"r":"1","m":"{\"srvresp\":\"...\"}"}`: the message is itself JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    r: String,
    #[serde(default)]
    m: String,
}

#[derive(Debug, Deserialize)]
struct UploadMessage {
    srvresp: String,
}

impl UploadResponse {
    pub fn decode(body: &str) -> Result<Self, ApiError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn is_success(&self) -> bool {
        self.r == SUCCESS_CODE
    }

    /// The human-readable server reply of an accepted upload.
    pub fn into_server_message(self) -> Result<String, ApiError> {
        if !self.is_success() {
            return Err(ApiError::Rejected(self.r));
        }
        let message: UploadMessage = serde_json::from_str(&self.m)?;
        Ok(message.srvresp)
    }
}

fn parse_number(value: &str, field: &str) -> Result<f64, ApiError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ApiError::Malformed(format!("{field} '{value}' is not a number")))
}

fn parse_speed_range(value: &str) -> Result<(f64, f64), ApiError> {
    let (min, max) = value
        .split_once('-')
        .ok_or_else(|| ApiError::Malformed(format!("speed range '{value}' has no '-'")))?;
    Ok((parse_number(min, "min speed")?, parse_number(max, "max speed")?))
}

fn parse_daily_cap(value: &str) -> Result<Option<u32>, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ApiError::Malformed(format!("daily cap '{value}' is not a count")))
}

fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| ApiError::Malformed(format!("date '{value}': {err}")))
}

fn parse_seconds_of_day(value: &str) -> Result<u32, ApiError> {
    let value = value.trim();
    if value == "24:00" || value == "24:00:00" {
        return Ok(super::plan::SECONDS_PER_DAY);
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map(|time| time.num_seconds_from_midnight())
        .map_err(|err| ApiError::Malformed(format!("time '{value}': {err}")))
}

/// `;`-separated 0-based weekday numbers; unknown entries are skipped.
fn parse_weekdays(value: &str) -> Vec<Weekday> {
    let mut weekdays = Vec::new();
    for day in value
        .split(';')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter_map(|index| WEEKDAYS_FROM_MONDAY.get(index).copied())
    {
        if !weekdays.contains(&day) {
            weekdays.push(day);
        }
    }
    weekdays
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN_BODY: &str = r#"{
        "r": "1",
        "m": [{
            "atttype": "2",
            "eventname": "Sunshine run",
            "eventno": "EV-9",
            "femalemiles": "1600",
            "femalespeed": "1.5-4.5",
            "malemiles": "2000",
            "malespeed": "2-5",
            "maxtimesperday": "1",
            "rulestartdt": "2024-03-01",
            "ruleenddt": "2024-06-30",
            "starttms": "06:00",
            "endtms": "22:30:00",
            "weekrg": "0;1;2;3;4;"
        }]
    }"#;

    #[test]
    fn plan_takes_gender_specific_limits() {
        let male = PlanResponse::decode(PLAN_BODY).unwrap().into_plan(Gender::Male).unwrap();
        assert_eq!(male.min_distance_m, 2000.0);
        assert_eq!((male.min_speed, male.max_speed), (2.0, 5.0));

        let female = PlanResponse::decode(PLAN_BODY)
            .unwrap()
            .into_plan(Gender::Female)
            .unwrap();
        assert_eq!(female.min_distance_m, 1600.0);
        assert_eq!((female.min_speed, female.max_speed), (1.5, 4.5));
        assert_eq!(female.event_id, "EV-9");
        assert_eq!(female.attendance_type, "2");
        assert_eq!(female.max_times_per_day, Some(1));
        assert_eq!(female.start_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(female.start_time_secs, 6 * 3600);
        assert_eq!(female.end_time_secs, 22 * 3600 + 30 * 60);
        assert_eq!(
            female.weekdays,
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
        );
        assert!(female.validate().is_ok());
    }

    #[test]
    fn rejected_or_empty_plans_fail() {
        let rejected = PlanResponse::decode(r#"{"r":"0","m":[]}"#).unwrap();
        assert!(matches!(
            rejected.into_plan(Gender::Male),
            Err(ApiError::Rejected(code)) if code == "0"
        ));

        let empty = PlanResponse::decode(r#"{"r":"1","m":[]}"#).unwrap();
        assert!(matches!(empty.into_plan(Gender::Male), Err(ApiError::Malformed(_))));

        assert!(PlanResponse::decode("<html>").is_err());
    }

    #[test]
    fn bad_fields_fail_closed() {
        let body = PLAN_BODY.replace("2-5", "fast");
        let plan = PlanResponse::decode(&body).unwrap().into_plan(Gender::Male);
        assert!(matches!(plan, Err(ApiError::Malformed(_))));

        let body = PLAN_BODY.replace("2024-06-30", "June");
        assert!(PlanResponse::decode(&body).unwrap().into_plan(Gender::Male).is_err());
    }

    #[test]
    fn only_a_missing_daily_cap_means_uncapped() {
        assert_eq!(parse_daily_cap("0").unwrap(), Some(0));
        assert_eq!(parse_daily_cap("").unwrap(), None);
        assert_eq!(parse_daily_cap(" ").unwrap(), None);
        assert_eq!(parse_daily_cap("3").unwrap(), Some(3));
        assert!(parse_daily_cap("-1").is_err());
    }

    #[test]
    fn weekday_list_skips_junk_and_duplicates() {
        assert_eq!(parse_weekdays("6;x;6;9;5"), vec![Weekday::Sun, Weekday::Sat]);
        assert!(parse_weekdays("").is_empty());
    }

    #[test]
    fn profile_reply_sets_gender_from_the_server() {
        let body = "姓名:李华,性别:男,入学年份:2021,班级:C7\n";
        let male = ProfileResponse::parse(body).unwrap();
        assert_eq!(
            male,
            ProfileResponse {
                name: "李华".into(),
                gender: Gender::Male,
                admission_year: "2021".into(),
                class_id: "C7".into(),
            }
        );

        let body = "姓名:王芳,性别:女,入学年份:2022,班级:C3";
        assert_eq!(ProfileResponse::parse(body).unwrap().gender, Gender::Female);
    }

    #[test]
    fn profile_reply_without_name_is_rejected() {
        let err = ProfileResponse::parse("密码错误").unwrap_err();
        assert!(matches!(err, ApiError::Rejected(text) if text == "密码错误"));

        assert!(matches!(
            ProfileResponse::parse("姓名:李华,性别:男"),
            Err(ApiError::Malformed(_))
        ));
        assert!(matches!(
            ProfileResponse::parse("姓名:李华,性别男,入学年份:2021,班级:C7"),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn bind_response_needs_url_and_token() {
        let parsed = BindResponse::parse("ok,https://api.example.edu,abc123\n").unwrap();
        assert_eq!(parsed.api_url, "https://api.example.edu");
        assert_eq!(parsed.token, "abc123");

        assert!(BindResponse::parse("error").is_err());
        assert!(BindResponse::parse("ok,,abc").is_err());
    }

    #[test]
    fn school_list_decodes() {
        let schools = decode_schools(r#"[{"schoolno":"S1","schoolname":"North"}]"#).unwrap();
        assert_eq!(
            schools,
            vec![SchoolInfo {
                id: "S1".into(),
                name: "North".into()
            }]
        );
        assert!(decode_schools(r#"{"r":"0"}"#).is_err());
    }

    #[test]
    fn upload_message_is_nested_json() {
        let ok = UploadResponse::decode(r#"{"r":"1","m":"{\"srvresp\":\"Accepted\"}"}"#).unwrap();
        assert_eq!(ok.into_server_message().unwrap(), "Accepted");

        let rejected = UploadResponse::decode(r#"{"r":"0","m":"nope"}"#).unwrap();
        assert!(!rejected.is_success());
        assert!(matches!(rejected.into_server_message(), Err(ApiError::Rejected(_))));

        let garbled = UploadResponse::decode(r#"{"r":"1","m":"plain text"}"#).unwrap();
        assert!(matches!(garbled.into_server_message(), Err(ApiError::Json(_))));
    }
}
