// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::common::ProcessId;
#[cfg(all(windows, feature = "gui"))]
use crate::window::WindowId;

/// Everything known about one process, gathered field by field.
///
/// A field that could not be read is left empty; the rest are still filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub parent: Option<ProcessId>,
    pub children: Vec<ProcessId>,
    pub executable: Option<String>,
    pub working_directory: Option<String>,
    pub command_line: Vec<String>,
    pub environment: Vec<String>,
    /// Top-level windows owned by the process.
    #[cfg(all(windows, feature = "gui"))]
    pub windows: Vec<WindowId>,
}

impl ProcessInfo {
    pub fn from_pid(pid: ProcessId) -> Self {
        Self {
            pid,
            parent: crate::parent_of(pid),
            children: crate::children_of(pid),
            executable: crate::executable_path_of(pid),
            working_directory: crate::working_directory_of(pid),
            command_line: crate::command_line_of(pid),
            environment: crate::environment_of(pid),
            #[cfg(all(windows, feature = "gui"))]
            windows: crate::window_ids_of(pid),
        }
    }

    /// Value of `name` in the captured environment.
    pub fn environment_variable(&self, name: &str) -> Option<&str> {
        crate::lookup_variable(self.environment.iter().map(String::as_str), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_process_is_empty() {
        let info = ProcessInfo::from_pid(u32::MAX - 1);
        assert!(info.children.is_empty());
        #[cfg(all(windows, feature = "gui"))]
        assert!(info.windows.is_empty());
        assert_eq!(
            info,
            ProcessInfo {
                pid: u32::MAX - 1,
                ..ProcessInfo::default()
            }
        );
    }

    #[test]
    fn test_environment_variable() {
        let info = ProcessInfo {
            environment: vec!["A=1".into(), "B=x=y".into(), "A=2".into()],
            ..ProcessInfo::default()
        };
        assert_eq!(info.environment_variable("A"), Some("1"));
        assert_eq!(info.environment_variable("B"), Some("x=y"));
        assert_eq!(info.environment_variable("C"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_own_process() {
        let mut child = std::process::Command::new("/bin/sleep")
            .arg("5")
            .spawn()
            .unwrap();
        let info = ProcessInfo::from_pid(std::process::id());
        child.kill().unwrap();
        child.wait().unwrap();

        assert!(info.children.contains(&child.id()));
        assert_eq!(info.parent, Some(std::os::unix::process::parent_id()));
        assert!(info.executable.is_some());
        assert!(info.working_directory.is_some());
        assert!(!info.command_line.is_empty());
    }
}
