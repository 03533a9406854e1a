//! Log partitions and their storage keys.

use std::fmt;

use crate::handle::JobHandle;

/// Prefix shared by every job log key.
pub const KEY_PREFIX: &str = "redis_logs:";

/// The two record classes a job writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogClass {
    Info,
    Error,
}

impl LogClass {
    pub const ALL: [LogClass; 2] = [LogClass::Info, LogClass::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            LogClass::Info => "info",
            LogClass::Error => "error",
        }
    }
}

impl fmt::Display for LogClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered, append only sequence of log records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    handle: JobHandle,
    class: LogClass,
}

impl Partition {
    pub fn new(handle: JobHandle, class: LogClass) -> Self {
        Self { handle, class }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Storage key, `redis_logs:<handle>:<class>`.
    pub fn key(&self) -> String {
        format!("{KEY_PREFIX}{}:{}", self.handle, self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_handle_and_class() {
        let handle = JobHandle::parse("abcdefghijklmnop").unwrap();
        let info = Partition::new(handle.clone(), LogClass::Info);
        let error = Partition::new(handle, LogClass::Error);

        assert_eq!(info.key(), "redis_logs:abcdefghijklmnop:info");
        assert_eq!(error.key(), "redis_logs:abcdefghijklmnop:error");
    }
}
