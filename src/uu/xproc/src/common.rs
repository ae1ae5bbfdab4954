// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Operating-system process identifier.
pub type ProcessId = u32;

/// Errors that can occur while reading the attributes of another process
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// Process with given PID does not exist
    #[error("process {0} not found")]
    NotFound(ProcessId),
    /// The OS refused to grant read access to the process
    #[error("access denied to process {0}")]
    AccessDenied(ProcessId),
    /// The process exists but the attribute could not be read
    #[error("failed to read process {pid}: {detail}")]
    ReadFailure { pid: ProcessId, detail: String },
    /// The helper executable could not be written, started or produced nothing
    #[error("helper bridge failed: {0}")]
    BridgeFailure(String),
    /// Requested feature is not supported on this platform
    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),
}

impl ProcessError {
    pub(crate) fn read_failure(pid: ProcessId, detail: impl Display) -> Self {
        Self::ReadFailure {
            pid,
            detail: detail.to_string(),
        }
    }

    /// Maps an I/O error raised while reading `pid` onto the taxonomy.
    pub(crate) fn from_io(pid: ProcessId, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(pid),
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied(pid),
            _ => Self::read_failure(pid, err),
        }
    }
}

/// The three per-process text attributes that need a raw memory or kernel read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    WorkingDirectory,
    CommandLine,
    Environment,
}

impl AttributeKind {
    /// Flag understood by the `crossproc` helper for this attribute.
    pub fn helper_flag(self) -> &'static str {
        match self {
            Self::WorkingDirectory => "--cwd-from-pid",
            Self::CommandLine => "--cmd-from-pid",
            Self::Environment => "--env-from-pid",
        }
    }
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::WorkingDirectory => write!(f, "working directory"),
            Self::CommandLine => write!(f, "command line"),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// One `NAME=VALUE` entry of a process environment.
///
/// The name is everything before the first `=`, so values may contain `=`.
/// Windows keeps per-drive directories as `=C:=C:\dir`; a leading `=` is
/// therefore part of the name rather than a separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentEntry<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> TryFrom<&'a str> for EnvironmentEntry<'a> {
    type Error = &'a str;

    fn try_from(entry: &'a str) -> Result<Self, Self::Error> {
        let split_at = entry
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '=')
            .map(|(idx, _)| idx);

        match split_at {
            Some(idx) => Ok(Self {
                name: &entry[..idx],
                value: &entry[idx + 1..],
            }),
            None => Err(entry),
        }
    }
}

impl EnvironmentEntry<'_> {
    /// Compares the entry's name with `name` using the platform's rules.
    pub fn name_matches(&self, name: &str) -> bool {
        if cfg!(windows) {
            self.name.eq_ignore_ascii_case(name)
        } else {
            self.name == name
        }
    }
}

impl Display for EnvironmentEntry<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_entry() {
        let entry = EnvironmentEntry::try_from("HOME=/home/user").unwrap();
        assert_eq!(entry.name, "HOME");
        assert_eq!(entry.value, "/home/user");

        let entry = EnvironmentEntry::try_from("OPTS=a=b=c").unwrap();
        assert_eq!(entry.name, "OPTS");
        assert_eq!(entry.value, "a=b=c");

        let entry = EnvironmentEntry::try_from("EMPTY=").unwrap();
        assert_eq!(entry.name, "EMPTY");
        assert_eq!(entry.value, "");
    }

    #[test]
    fn test_environment_entry_drive_directory() {
        let entry = EnvironmentEntry::try_from("=C:=C:\\Windows").unwrap();
        assert_eq!(entry.name, "=C:");
        assert_eq!(entry.value, "C:\\Windows");
    }

    #[test]
    fn test_environment_entry_malformed() {
        assert!(EnvironmentEntry::try_from("").is_err());
        assert!(EnvironmentEntry::try_from("NOEQUALS").is_err());
        assert!(EnvironmentEntry::try_from("=").is_err());
    }

    #[test]
    fn test_name_matching() {
        let entry = EnvironmentEntry::try_from("Path=C:\\bin").unwrap();
        assert!(entry.name_matches("Path"));
        assert_eq!(entry.name_matches("PATH"), cfg!(windows));
    }

    #[test]
    fn test_entry_display() {
        let entry = EnvironmentEntry::try_from("A=1=2").unwrap();
        assert_eq!(entry.to_string(), "A=1=2");
    }

    #[test]
    fn test_io_error_mapping() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(ProcessError::from_io(7, &err), ProcessError::NotFound(7));

        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(ProcessError::from_io(7, &err), ProcessError::AccessDenied(7));

        let err = std::io::Error::other("boom");
        assert!(matches!(
            ProcessError::from_io(7, &err),
            ProcessError::ReadFailure { pid: 7, .. }
        ));
    }

    #[test]
    fn test_helper_flags() {
        assert_eq!(AttributeKind::WorkingDirectory.helper_flag(), "--cwd-from-pid");
        assert_eq!(AttributeKind::CommandLine.helper_flag(), "--cmd-from-pid");
        assert_eq!(AttributeKind::Environment.helper_flag(), "--env-from-pid");
    }
}
