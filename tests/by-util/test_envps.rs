// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use uutests::new_ucmd;
use uutests::util::TestScenario;
use uutests::util_name;

#[test]
fn test_no_args() {
    new_ucmd!().fails().code_is(1);
}

#[test]
fn test_invalid_arg() {
    new_ucmd!().arg("--definitely-invalid").fails().code_is(1);
}

#[test]
fn test_illegal_pid() {
    new_ucmd!()
        .arg("abc")
        .fails()
        .code_is(1)
        .stderr_contains("Illegal PID: abc");
    new_ucmd!()
        .arg("-5")
        .fails()
        .code_is(1);
}

#[test]
fn test_missing_process() {
    new_ucmd!()
        .arg("4294967294")
        .fails()
        .code_is(1)
        .no_stdout();
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_environment_of_test_process() {
    let pid = std::process::id().to_string();
    let result = new_ucmd!().arg(&pid).succeeds();
    for line in result.stdout_str().lines() {
        assert!(line.contains('='), "{line}");
    }
    if let Ok(path) = std::env::var("PATH") {
        result.stdout_contains(format!("PATH={path}\n"));
    }
}
