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
fn test_invalid_pid() {
    new_ucmd!()
        .arg("xyz")
        .fails()
        .code_is(1)
        .stderr_contains("invalid process id: xyz");
}

#[test]
fn test_missing_process() {
    new_ucmd!()
        .arg("4294967294")
        .fails()
        .code_is(1)
        .stderr_contains("4294967294: No such process");
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_test_process() {
    let pid = std::process::id();
    let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
    new_ucmd!()
        .arg(pid.to_string())
        .succeeds()
        .stdout_is(format!("{pid}: {}\n", cwd.display()));
}

#[test]
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn test_continues_after_error() {
    let pid = std::process::id();
    new_ucmd!()
        .args(&["4294967294", &pid.to_string()])
        .fails()
        .code_is(1)
        .stdout_contains(format!("{pid}: "))
        .stderr_contains("No such process");
}
