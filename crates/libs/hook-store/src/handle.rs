//! Job handles.

use std::fmt;

use rand::{Rng, distributions::Uniform};

/// Number of letters in a generated handle.
pub const HANDLE_LEN: usize = 16;

/// Opaque identifier of one asynchronously dispatched job.
///
/// Handles are [`HANDLE_LEN`] lowercase ASCII letters. Their only use is as
/// part of a storage key and as the path segment a client polls logs with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    /// Draw a new random handle.
    pub fn generate() -> Self {
        let letters = Uniform::new_inclusive(b'a', b'z');
        let handle = rand::thread_rng()
            .sample_iter(letters)
            .take(HANDLE_LEN)
            .map(char::from)
            .collect();
        Self(handle)
    }

    /// Accept a client supplied handle.
    ///
    /// Anything that could not have been generated is rejected, so a request
    /// path can never address keys outside the job log namespace.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == HANDLE_LEN && raw.bytes().all(|b| b.is_ascii_lowercase()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
