//! Boundary to the school server.
//!
//! Implementations own the HTTP details: endpoint paths, form encoding,
//! gzip compression of request bodies. They hand back the raw response
//! body; decoding happens in [`crate::account::api`].

use std::future::Future;

use anyhow::Result;

use crate::upload::UploadRequest;

pub trait Transport: Send + Sync {
    /// JSON array of schools.
    fn fetch_schools(&self) -> impl Future<Output = Result<String>> + Send;

    /// Login reply for the student's profile. `password_hash` is the
    /// lowercase hex MD5 of the password.
    fn fetch_user_info(
        &self,
        school_id: &str,
        student_id: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Comma-separated bind line.
    fn bind(&self, school_id: &str, student_id: &str)
        -> impl Future<Output = Result<String>> + Send;

    /// JSON plan response for the bound student.
    fn fetch_plan(
        &self,
        api_url: &str,
        student_id: &str,
        token: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// JSON upload response.
    fn upload(
        &self,
        api_url: &str,
        request: &UploadRequest,
    ) -> impl Future<Output = Result<String>> + Send;
}
