//! What a hook request asks for: the job name header and the optional
//! environment body.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use hook_config::JobEnv;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Header naming the job to run.
pub const JOB_HEADER: &str = "x-hook-job";

/// Job name taken from `X-HOOK-JOB`.
///
/// A missing or non UTF-8 header gives an empty name, which matches no job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobName(pub String);

impl<S: Send + Sync> FromRequestParts<S> for JobName {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> core::result::Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get(JOB_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        Ok(JobName(name.trim().to_string()))
    }
}

/// Body of a hook request.
///
/// ```json
/// {"ENV": {"BRANCH": "main"}}
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(rename = "ENV", default)]
    pub env: JobEnv,
}

impl JobRequest {
    /// Parse a request body; an empty body asks for nothing extra.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice(body) {
            Ok(request) => Ok(request),
            Err(err) => Err(Error::BadRequest(err.to_string())),
        }
    }
}
