//! Binding a student account: login, bind call, plan fetch, snapshot replace.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use md5::{Digest, Md5};

use crate::transport::Transport;

use super::{
    api::{decode_schools, BindResponse, PlanResponse, ProfileResponse, SchoolInfo},
    AccountContext, Gender, User,
};

/// Identity details reported by the server for a logged-in student.
///
/// Only [`fetch_profile`] builds one, so the gender that selects the plan
/// limits always comes from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    student_id: String,
    name: String,
    gender: Gender,
    admission_year: String,
    class_id: String,
}

impl Profile {
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn admission_year(&self) -> &str {
        &self.admission_year
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }
}

/// Lowercase hex MD5 of the password, as the login endpoint expects.
pub fn hash_password(password: &str) -> String {
    hex::encode(Md5::digest(password.as_bytes()))
}

pub async fn fetch_schools<T: Transport>(transport: &T) -> Result<Vec<SchoolInfo>> {
    let body = transport
        .fetch_schools()
        .await
        .context("failed to fetch school list")?;
    Ok(decode_schools(&body)?)
}

/// Logs in at `school` and returns the profile the server reports.
pub async fn fetch_profile<T: Transport>(
    transport: &T,
    school: &SchoolInfo,
    student_id: &str,
    password: &str,
) -> Result<Profile> {
    let body = transport
        .fetch_user_info(&school.id, student_id, &hash_password(password))
        .await
        .context("login request failed")?;
    let reply = ProfileResponse::parse(&body).context("login was not accepted")?;

    Ok(Profile {
        student_id: student_id.to_string(),
        name: reply.name,
        gender: reply.gender,
        admission_year: reply.admission_year,
        class_id: reply.class_id,
    })
}

/// Binds `profile` at `school` and replaces the current account on success.
/// Nothing is persisted if any step fails.
pub async fn bind_account<T: Transport>(
    transport: &T,
    context: &AccountContext,
    school: &SchoolInfo,
    profile: Profile,
) -> Result<Arc<User>> {
    let body = transport
        .bind(&school.id, &profile.student_id)
        .await
        .context("bind request failed")?;
    let binding = BindResponse::parse(&body)?;

    let body = transport
        .fetch_plan(&binding.api_url, &profile.student_id, &binding.token)
        .await
        .context("plan request failed")?;
    let plan = PlanResponse::decode(&body)?.into_plan(profile.gender)?;
    plan.validate().context("server sent an unusable plan")?;

    info!(
        "Fetched plan '{}' ({}) for student {}",
        plan.event_name, plan.event_id, profile.student_id
    );

    context.replace(User {
        student_id: profile.student_id,
        name: profile.name,
        gender: profile.gender,
        admission_year: profile.admission_year,
        class_id: profile.class_id,
        school_id: school.id.clone(),
        school_name: school.name.clone(),
        token: binding.token,
        api_url: binding.api_url,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prefs::MemoryPreferences, upload::UploadRequest};
    use anyhow::bail;

    struct FakeServer {
        profile_body: &'static str,
        bind_body: &'static str,
        plan_body: &'static str,
    }

    impl Transport for FakeServer {
        async fn fetch_schools(&self) -> Result<String> {
            Ok(r#"[{"schoolno":"S01","schoolname":"North Campus"}]"#.into())
        }

        async fn fetch_user_info(
            &self,
            school_id: &str,
            student_id: &str,
            password_hash: &str,
        ) -> Result<String> {
            assert_eq!((school_id, student_id), ("S01", "2021001"));
            assert_eq!(password_hash, hash_password("secret"));
            Ok(self.profile_body.into())
        }

        async fn bind(&self, school_id: &str, student_id: &str) -> Result<String> {
            assert_eq!((school_id, student_id), ("S01", "2021001"));
            Ok(self.bind_body.into())
        }

        async fn fetch_plan(
            &self,
            api_url: &str,
            _student_id: &str,
            token: &str,
        ) -> Result<String> {
            assert_eq!((api_url, token), ("https://api.example.edu", "tok-1"));
            Ok(self.plan_body.into())
        }

        async fn upload(&self, _api_url: &str, _request: &UploadRequest) -> Result<String> {
            bail!("not used")
        }
    }

    const PLAN: &str = r#"{"r":"1","m":[{"atttype":"1","eventname":"Run","eventno":"E1",
        "femalemiles":"1200","femalespeed":"1-4","malemiles":"2000","malespeed":"2-5",
        "maxtimesperday":"2","rulestartdt":"2024-03-01","ruleenddt":"2024-07-01",
        "starttms":"05:30","endtms":"23:00","weekrg":"0;1;2;3;4;5;6"}]}"#;

    const MALE_PROFILE: &str = "姓名:李华,性别:男,入学年份:2021,班级:C7";

    fn server(profile_body: &'static str, plan_body: &'static str) -> FakeServer {
        FakeServer {
            profile_body,
            bind_body: "ok,https://api.example.edu,tok-1",
            plan_body,
        }
    }

    fn north_campus() -> SchoolInfo {
        SchoolInfo {
            id: "S01".into(),
            name: "North Campus".into(),
        }
    }

    #[test]
    fn password_is_hashed_as_lowercase_hex_md5() {
        assert_eq!(hash_password(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hash_password("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[tokio::test]
    async fn successful_bind_replaces_the_account() {
        let server = server(MALE_PROFILE, PLAN);
        let ctx = AccountContext::new(Arc::new(MemoryPreferences::new()));
        let schools = fetch_schools(&server).await.unwrap();

        let profile = fetch_profile(&server, &schools[0], "2021001", "secret")
            .await
            .unwrap();
        assert_eq!(profile.name(), "李华");
        assert_eq!(profile.gender(), Gender::Male);

        let user = bind_account(&server, &ctx, &schools[0], profile).await.unwrap();

        assert_eq!(user.token, "tok-1");
        assert_eq!(user.school_name, "North Campus");
        assert_eq!(user.class_id, "C7");
        assert_eq!(user.plan.min_distance_m, 2000.0);
        assert_eq!(user.plan.max_times_per_day, Some(2));
        assert_eq!(ctx.current(), Some(user));
    }

    #[tokio::test]
    async fn female_profile_gets_female_limits() {
        let server = server("姓名:王芳,性别:女,入学年份:2022,班级:C3", PLAN);
        let ctx = AccountContext::new(Arc::new(MemoryPreferences::new()));

        let profile = fetch_profile(&server, &north_campus(), "2021001", "secret")
            .await
            .unwrap();
        let user = bind_account(&server, &ctx, &north_campus(), profile).await.unwrap();

        assert_eq!(user.gender, Gender::Female);
        assert_eq!(user.plan.min_distance_m, 1200.0);
        assert_eq!((user.plan.min_speed, user.plan.max_speed), (1.0, 4.0));
    }

    #[tokio::test]
    async fn rejected_login_yields_no_profile() {
        let server = server("用户名或密码错误", PLAN);

        let err = fetch_profile(&server, &north_campus(), "2021001", "secret")
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("用户名或密码错误"));
    }

    #[tokio::test]
    async fn failed_plan_leaves_the_account_untouched() {
        let server = server(MALE_PROFILE, r#"{"r":"0"}"#);
        let ctx = AccountContext::new(Arc::new(MemoryPreferences::new()));

        let profile = fetch_profile(&server, &north_campus(), "2021001", "secret")
            .await
            .unwrap();

        assert!(bind_account(&server, &ctx, &north_campus(), profile).await.is_err());
        assert!(ctx.current().is_none());
    }
}
