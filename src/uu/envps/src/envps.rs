// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use clap::{crate_version, Arg, Command};
use uu_xproc::{environment_of, process_exists, ProcessId};
use uucore::error::{UResult, USimpleError};
use uucore::format_usage;

const ABOUT: &str = "Print the environment of a running process, one NAME=VALUE per line";
const USAGE: &str = "{} PID";

#[uucore::main]
pub fn uumain(args: impl uucore::Args) -> UResult<()> {
    let matches = uu_app().try_get_matches_from(args)?;

    let Some(pid_str) = matches.get_one::<String>("pid") else {
        return Err(USimpleError::new(1, "missing PID"));
    };
    let pid = pid_str
        .parse::<ProcessId>()
        .map_err(|_| USimpleError::new(1, format!("Illegal PID: {pid_str}")))?;

    let environment = environment_of(pid);
    if environment.is_empty() && !process_exists(pid) {
        return Err(USimpleError::new(1, format!("No such process: {pid}")));
    }

    for entry in environment {
        println!("{entry}");
    }

    Ok(())
}

pub fn uu_app() -> Command {
    Command::new(uucore::util_name())
        .version(crate_version!())
        .about(ABOUT)
        .override_usage(format_usage(USAGE))
        .infer_long_args(true)
        .arg(
            Arg::new("pid")
                .value_name("PID")
                .help("Process ID")
                .required(true)
                .index(1),
        )
}
