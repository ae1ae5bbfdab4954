// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use uutests::new_ucmd;
use uutests::util::TestScenario;
use uutests::util_name;

const MISSING_PID: &str = "4294967294";

#[test]
fn test_no_args() {
    new_ucmd!().fails().code_is(1);
}

#[test]
fn test_invalid_arg() {
    new_ucmd!().arg("--definitely-invalid").fails().code_is(1);
}

#[test]
fn test_invalid_pid() {
    new_ucmd!()
        .args(&["--cwd-from-pid", "abc"])
        .fails()
        .code_is(1);
}

#[test]
fn test_conflicting_queries() {
    new_ucmd!()
        .args(&["--cwd-from-pid", "1", "--cmd-from-pid", "1"])
        .fails()
        .code_is(1);
}

#[test]
fn test_missing_process_prints_nothing() {
    new_ucmd!()
        .args(&["--cwd-from-pid", MISSING_PID])
        .succeeds()
        .no_stdout();
    new_ucmd!()
        .args(&["--cmd-from-pid", MISSING_PID])
        .succeeds()
        .no_stdout();
    new_ucmd!()
        .args(&["--env-from-pid", MISSING_PID])
        .succeeds()
        .no_stdout();
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_cwd_of_test_process() {
    let pid = std::process::id().to_string();
    let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
    new_ucmd!()
        .args(&["--cwd-from-pid", &pid])
        .succeeds()
        .stdout_is(cwd.to_string_lossy());
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_cmd_of_test_process() {
    let pid = std::process::id().to_string();
    let result = new_ucmd!().args(&["--cmd-from-pid", &pid]).succeeds();

    let stdout = result.stdout();
    assert!(stdout.ends_with(b"\0\0"));
    let fields: Vec<String> = stdout[..stdout.len() - 2]
        .split(|&b| b == 0)
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();
    assert_eq!(fields, std::env::args().collect::<Vec<_>>());
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_env_of_test_process() {
    let pid = std::process::id().to_string();
    let result = new_ucmd!().args(&["--env-from-pid", &pid]).succeeds();

    let stdout = result.stdout();
    assert!(stdout.ends_with(b"\0\0"));
    assert!(stdout
        .split(|&b| b == 0)
        .filter(|field| !field.is_empty())
        .all(|field| field.contains(&b'=')));
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_ppid_of_test_process() {
    let pid = std::process::id().to_string();
    let ppid = std::os::unix::process::parent_id();
    new_ucmd!()
        .args(&["--ppid-from-pid", &pid])
        .succeeds()
        .stdout_is(format!("{ppid}\n"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_exe_of_test_process() {
    let pid = std::process::id().to_string();
    let exe = std::env::current_exe().unwrap();
    new_ucmd!()
        .args(&["--exe-from-pid", &pid])
        .succeeds()
        .stdout_is(format!("{}\n", exe.display()));
}
