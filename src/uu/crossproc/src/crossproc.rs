// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::io::{self, Write};

use clap::{crate_version, value_parser, Arg, ArgGroup, Command};
use uu_xproc::{
    command_line_of, environment_of, executable_path_of, parent_of, working_directory_of,
    ProcessId,
};
use uucore::error::UResult;
use uucore::format_usage;

const ABOUT: &str = "Print one attribute of another process in machine-readable form";
const USAGE: &str = "{} --cwd-from-pid PID\n\
    {} --cmd-from-pid PID\n\
    {} --env-from-pid PID\n\
    {} --exe-from-pid PID\n\
    {} --ppid-from-pid PID";
const AFTER_HELP: &str = "The working directory is printed as is. Command line and environment \
    fields are each followed by a NUL byte, and the list ends with one more NUL. \
    Nothing is printed when the attribute cannot be read.";

pub mod options {
    pub const CWD: &str = "cwd-from-pid";
    pub const CMD: &str = "cmd-from-pid";
    pub const ENV: &str = "env-from-pid";
    pub const EXE: &str = "exe-from-pid";
    pub const PPID: &str = "ppid-from-pid";
}

/// Writes `fields` NUL-terminated with a closing empty field. An empty list
/// writes nothing so the reader can tell failure from an empty result.
pub fn write_fields(out: &mut impl Write, fields: &[String]) -> io::Result<()> {
    if fields.is_empty() {
        return Ok(());
    }
    for field in fields {
        out.write_all(field.as_bytes())?;
        out.write_all(b"\0")?;
    }
    out.write_all(b"\0")
}

#[uucore::main]
pub fn uumain(args: impl uucore::Args) -> UResult<()> {
    let matches = uu_app().try_get_matches_from(args)?;
    let pid_for = |name: &str| matches.get_one::<ProcessId>(name).copied();

    let mut stdout = io::stdout().lock();
    if let Some(pid) = pid_for(options::CWD) {
        if let Some(cwd) = working_directory_of(pid) {
            stdout.write_all(cwd.as_bytes())?;
        }
    } else if let Some(pid) = pid_for(options::CMD) {
        write_fields(&mut stdout, &command_line_of(pid))?;
    } else if let Some(pid) = pid_for(options::ENV) {
        write_fields(&mut stdout, &environment_of(pid))?;
    } else if let Some(pid) = pid_for(options::EXE) {
        if let Some(exe) = executable_path_of(pid) {
            writeln!(stdout, "{exe}")?;
        }
    } else if let Some(pid) = pid_for(options::PPID) {
        if let Some(ppid) = parent_of(pid) {
            writeln!(stdout, "{ppid}")?;
        }
    }
    stdout.flush()?;

    Ok(())
}

fn pid_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("PID")
        .value_parser(value_parser!(ProcessId))
        .help(help)
}

pub fn uu_app() -> Command {
    Command::new(uucore::util_name())
        .version(crate_version!())
        .about(ABOUT)
        .override_usage(format_usage(USAGE))
        .after_help(AFTER_HELP)
        .infer_long_args(true)
        .arg(pid_arg(options::CWD, "Print the working directory of PID"))
        .arg(pid_arg(options::CMD, "Print the command line arguments of PID"))
        .arg(pid_arg(options::ENV, "Print the environment of PID"))
        .arg(pid_arg(options::EXE, "Print the executable path of PID"))
        .arg(pid_arg(options::PPID, "Print the parent process ID of PID"))
        .group(
            ArgGroup::new("query")
                .args([
                    options::CWD,
                    options::CMD,
                    options::ENV,
                    options::EXE,
                    options::PPID,
                ])
                .required(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_fields() {
        let mut out = Vec::new();
        write_fields(&mut out, &["a.exe".to_string(), "--flag".to_string()]).unwrap();
        assert_eq!(out, b"a.exe\0--flag\0\0");
    }

    #[test]
    fn test_write_no_fields() {
        let mut out = Vec::new();
        write_fields(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_query_flags_are_exclusive() {
        assert!(uu_app()
            .try_get_matches_from(["crossproc", "--cwd-from-pid", "1", "--env-from-pid", "1"])
            .is_err());
        assert!(uu_app().try_get_matches_from(["crossproc"]).is_err());
        assert!(uu_app()
            .try_get_matches_from(["crossproc", "--cmd-from-pid", "1"])
            .is_ok());
    }
}
