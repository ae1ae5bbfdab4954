// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use pretty_assertions::assert_eq;
use xproc::parse::{parse_count_known, parse_delimited, parse_sentinel_terminated};
use xproc::{
    command_line_of, current_parent_id, current_process_id, enumerate_process_ids,
    environment_of, environment_variable_exists, environment_variable_of, parent_of,
    process_exists, working_directory_of, EnvironmentEntry, ProcessInfo,
};

const MISSING_PID: u32 = u32::MAX - 1;

// ============================================================================
// Enumeration Tests
// ============================================================================

#[test]
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn test_enumeration_contains_self() {
    assert!(enumerate_process_ids().contains(&current_process_id()));
}

#[test]
fn test_enumerated_pids_exist() {
    let pids = enumerate_process_ids();
    // Processes may exit between the two calls, so only most need to survive
    let alive = pids.iter().filter(|&&pid| process_exists(pid)).count();
    assert!(alive * 10 >= pids.len() * 9, "{alive} of {}", pids.len());
}

#[test]
fn test_enumerated_pids_are_unique() {
    let mut pids = enumerate_process_ids();
    let total = pids.len();
    pids.sort_unstable();
    pids.dedup();
    assert_eq!(pids.len(), total);
}

#[test]
fn test_missing_process() {
    assert!(!process_exists(MISSING_PID));
    assert!(environment_of(MISSING_PID).is_empty());
    assert!(command_line_of(MISSING_PID).is_empty());
    assert_eq!(working_directory_of(MISSING_PID), None);
    assert_eq!(parent_of(MISSING_PID), None);
}

// ============================================================================
// Own Process Tests
// ============================================================================

#[test]
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn test_own_environment_is_well_formed() {
    let environment = environment_of(current_process_id());
    assert!(!environment.is_empty());
    for entry in &environment {
        let parsed = EnvironmentEntry::try_from(entry.as_str()).unwrap();
        assert!(!parsed.name.is_empty(), "{entry}");
    }
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn test_path_lookup_matches_manual_scan() {
    let pid = current_process_id();
    let environment = environment_of(pid);
    let manual = environment
        .iter()
        .filter_map(|entry| EnvironmentEntry::try_from(entry.as_str()).ok())
        .find(|entry| entry.name_matches("PATH"))
        .map(|entry| entry.value.to_string());

    assert_eq!(environment_variable_of(pid, "PATH"), manual);
    assert_eq!(environment_variable_exists(pid, "PATH"), manual.is_some());
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn test_command_line_is_idempotent() {
    let pid = current_process_id();
    let first = command_line_of(pid);
    assert!(!first.is_empty());
    assert_eq!(first, command_line_of(pid));
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn test_own_parent() {
    assert_eq!(parent_of(current_process_id()), Some(current_parent_id()));
}

// ============================================================================
// Child Process Tests
// ============================================================================

#[cfg(any(target_os = "linux", target_os = "macos"))]
mod child {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::process::{Child, Command};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;
    use xproc::{children_of, kill_process};

    fn spawn_sleeper(dir: &TempDir) -> Child {
        let child = Command::new("/bin/sleep")
            .arg("30")
            .env_clear()
            .env("XPROC_MARKER", "a=b")
            .env("LANG", "C")
            .current_dir(dir.path())
            .spawn()
            .unwrap();
        wait_for_exec(child.id(), "/bin/sleep");
        child
    }

    /// Polls until `pid` runs `program`; right after spawn it may still be a
    /// copy of the test binary.
    fn wait_for_exec(pid: u32, program: &str) -> Vec<String> {
        let mut argv = Vec::new();
        for _ in 0..100 {
            argv = command_line_of(pid);
            if argv.first().map(String::as_str) == Some(program) {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        argv
    }

    #[test]
    fn test_child_attributes() {
        let dir = TempDir::new().unwrap();
        let mut child = spawn_sleeper(&dir);
        let pid = child.id();

        let info = ProcessInfo::from_pid(pid);
        kill_process(pid);
        child.wait().unwrap();

        assert_eq!(info.command_line, vec!["/bin/sleep", "30"]);
        assert_eq!(info.parent, Some(current_process_id()));
        assert_eq!(
            info.working_directory,
            Some(
                dir.path()
                    .canonicalize()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            )
        );
        assert!(info
            .environment
            .contains(&"XPROC_MARKER=a=b".to_string()));
        assert!(info.environment.contains(&"LANG=C".to_string()));
        assert_eq!(info.environment_variable("XPROC_MARKER"), Some("a=b"));
        assert_eq!(info.environment_variable("HOME"), None);
    }

    #[test]
    fn test_child_is_listed_and_killable() {
        let dir = TempDir::new().unwrap();
        let mut child = spawn_sleeper(&dir);
        let pid = child.id();

        assert!(process_exists(pid));
        assert!(children_of(current_process_id()).contains(&pid));
        assert!(kill_process(pid));
        child.wait().unwrap();
        assert!(!process_exists(pid));
    }

    #[test]
    fn test_empty_arguments_are_kept() {
        let mut child = Command::new("/bin/sh")
            .args(["-c", "sleep 5; true", "sh", "", "x"])
            .spawn()
            .unwrap();
        let argv = wait_for_exec(child.id(), "/bin/sh");
        child.kill().unwrap();
        child.wait().unwrap();

        assert_eq!(argv, vec!["/bin/sh", "-c", "sleep 5; true", "sh", "", "x"]);
    }
}

// ============================================================================
// Parser Tests
// ============================================================================

#[test]
fn test_parse_environment_block() {
    assert_eq!(
        parse_sentinel_terminated(b"A=1\0B=2\0\0"),
        vec!["A=1", "B=2"]
    );
    assert_eq!(parse_sentinel_terminated(b"A=1\0B=2\0"), vec!["A=1", "B=2"]);
    assert!(parse_sentinel_terminated::<u8>(b"").is_empty());
}

#[test]
fn test_parse_command_line_with_empty_argument() {
    assert_eq!(
        parse_delimited(b"/bin/sh\0-c\0\0x\0"),
        vec!["/bin/sh", "-c", "", "x"]
    );
    let (argv, envp) = parse_count_known(b"prog\0\0x\0A=1\0\0", 3);
    assert_eq!(argv, vec!["prog", "", "x"]);
    assert_eq!(envp, vec!["A=1"]);
}
