// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use clap::{crate_version, Arg, ArgAction, Command};
use uu_xproc::{process_exists, working_directory_of, ProcessId};
use uucore::error::{set_exit_code, UResult};
use uucore::{format_usage, show_error};

const ABOUT: &str = "Report the current working directory of a process";
const USAGE: &str = "{} PID...";

#[uucore::main]
pub fn uumain(args: impl uucore::Args) -> UResult<()> {
    let matches = uu_app().try_get_matches_from(args)?;

    let pids = matches.get_many::<String>("pid").into_iter().flatten();
    for pid_str in pids {
        let Ok(pid) = pid_str.parse::<ProcessId>() else {
            show_error!("invalid process id: {pid_str}");
            set_exit_code(1);
            continue;
        };

        match working_directory_of(pid) {
            Some(cwd) => println!("{pid}: {cwd}"),
            None if process_exists(pid) => {
                show_error!("{pid}: Permission denied");
                set_exit_code(1);
            }
            None => {
                show_error!("{pid}: No such process");
                set_exit_code(1);
            }
        }
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
                .action(ArgAction::Append)
                .index(1),
        )
}
