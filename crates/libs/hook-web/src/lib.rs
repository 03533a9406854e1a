//! HTTP building blocks for the hook-command gateway.
//!
//! Handlers return [`prelude::Result`]; every [`error::Error`] renders as
//! the matching status code, so a handler never builds error responses by
//! hand.

pub mod error;
pub mod job_request;
pub mod mw_token;
pub mod prelude;
