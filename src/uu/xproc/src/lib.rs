// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

//! Read the command line, environment and working directory of other processes
//!
//! Nothing is asked of the target process: the data comes from procfs on
//! Linux, from sysctl/libproc on macOS and FreeBSD, and from the target's
//! own memory on Windows. A Windows target of the other word size is read
//! through the `crossproc` helper executable (see [`bridge`]).
//!
//! Every function here is total. A process that vanished, refused access or
//! could not be decoded yields an empty or absent value; the reason is
//! logged at `debug` level through `tracing`.
//!
//! # Example
//!
//! ```ignore
//! use uu_xproc::{enumerate_process_ids, command_line_of};
//!
//! for pid in enumerate_process_ids() {
//!     println!("{pid}: {:?}", command_line_of(pid));
//! }
//! ```

pub mod bridge;
pub mod common;
mod info;
pub mod parse;
mod platform;
pub mod relation;
#[cfg(all(windows, feature = "gui"))]
mod window;

use tracing::debug;

use crate::parse::RawAttributeBuffer;
use crate::relation::LiveProcessTable;

pub use common::{AttributeKind, EnvironmentEntry, ProcessError, ProcessId};
pub use info::ProcessInfo;
#[cfg(all(windows, feature = "gui"))]
pub use window::{
    enumerate_window_ids, kill_window, window_exists, window_ids_of, window_owner, WindowId,
};

/// Every pid visible to the caller, in the order the OS reports them.
pub fn enumerate_process_ids() -> Vec<ProcessId> {
    platform::pids()
}

pub fn process_exists(pid: ProcessId) -> bool {
    platform::exists(pid)
}

/// Forcibly terminates `pid`. Returns whether the OS accepted the request.
pub fn kill_process(pid: ProcessId) -> bool {
    let killed = platform::kill(pid);
    if !killed {
        debug!(pid, "kill refused");
    }
    killed
}

pub fn current_process_id() -> ProcessId {
    std::process::id()
}

pub fn current_parent_id() -> ProcessId {
    platform::current_parent_id()
}

pub fn parent_of(pid: ProcessId) -> Option<ProcessId> {
    platform::parent_pid(pid)
        .inspect_err(|err| debug!(pid, %err, "parent unavailable"))
        .ok()
}

/// Direct children of `pid`, from one snapshot of the process table.
pub fn children_of(pid: ProcessId) -> Vec<ProcessId> {
    platform::parent_table()
        .into_iter()
        .filter(|&(child, parent)| parent == pid && child != pid)
        .map(|(child, _)| child)
        .collect()
}

/// Like [`parent_of`], but looks through `/bin/sh -c` wrappers.
///
/// Only POSIX systems spawn through such shells; elsewhere this is [`parent_of`].
pub fn parent_of_skip_sh(pid: ProcessId) -> Option<ProcessId> {
    if cfg!(unix) {
        relation::parent_skipping_shells(&LiveProcessTable, pid)
    } else {
        parent_of(pid)
    }
}

/// Like [`children_of`], with each shell child replaced by its children.
pub fn children_of_skip_sh(pid: ProcessId) -> Vec<ProcessId> {
    if cfg!(unix) {
        relation::children_skipping_shells(&LiveProcessTable, pid)
    } else {
        children_of(pid)
    }
}

pub fn executable_path_of(pid: ProcessId) -> Option<String> {
    platform::executable_path(pid)
        .inspect_err(|err| debug!(pid, %err, "executable path unavailable"))
        .ok()
        .filter(|path| !path.is_empty())
}

/// Attaches to `pid`, reads one attribute and detaches.
fn read_attribute(pid: ProcessId, kind: AttributeKind) -> Result<RawAttributeBuffer, ProcessError> {
    let attachment = platform::attach(pid)?;
    if let Some(target) = attachment.bridge_target() {
        return read_through_bridge(pid, kind, target);
    }
    platform::read_raw_attribute(&attachment, kind)
}

fn read_through_bridge(
    pid: ProcessId,
    kind: AttributeKind,
    target: bridge::Bitness,
) -> Result<RawAttributeBuffer, ProcessError> {
    let config = bridge::BridgeConfig::default();
    let session = bridge::BridgeSession::new(&config, kind, pid, Some(target));
    #[cfg(windows)]
    let mut tick = platform::pump_messages;
    #[cfg(not(windows))]
    let mut tick = || {};
    session.run(&mut tick)
}

pub fn working_directory_of(pid: ProcessId) -> Option<String> {
    match read_attribute(pid, AttributeKind::WorkingDirectory) {
        Ok(buffer) => Some(buffer.scalar()).filter(|cwd| !cwd.is_empty()),
        Err(err) => {
            debug!(pid, %err, "working directory unavailable");
            None
        }
    }
}

/// Arguments of `pid`, `argv[0]` first.
pub fn command_line_of(pid: ProcessId) -> Vec<String> {
    match read_attribute(pid, AttributeKind::CommandLine) {
        Ok(buffer) => buffer.fields(AttributeKind::CommandLine),
        Err(err) => {
            debug!(pid, %err, "command line unavailable");
            Vec::new()
        }
    }
}

/// `NAME=VALUE` entries of `pid`, in the target's order. Entries without `=`
/// are dropped.
pub fn environment_of(pid: ProcessId) -> Vec<String> {
    match read_attribute(pid, AttributeKind::Environment) {
        Ok(buffer) => buffer
            .fields(AttributeKind::Environment)
            .into_iter()
            .filter(|entry| EnvironmentEntry::try_from(entry.as_str()).is_ok())
            .collect(),
        Err(err) => {
            debug!(pid, %err, "environment unavailable");
            Vec::new()
        }
    }
}

/// First entry named `name` in `entries`.
///
/// Names compare case-insensitively on Windows and exactly elsewhere.
pub(crate) fn lookup_variable<'a>(
    entries: impl IntoIterator<Item = &'a str>,
    name: &str,
) -> Option<&'a str> {
    entries
        .into_iter()
        .filter_map(|entry| EnvironmentEntry::try_from(entry).ok())
        .find(|entry| entry.name_matches(name))
        .map(|entry| entry.value)
}

pub fn environment_variable_of(pid: ProcessId, name: &str) -> Option<String> {
    let environment = environment_of(pid);
    lookup_variable(environment.iter().map(String::as_str), name).map(str::to_string)
}

pub fn environment_variable_exists(pid: ProcessId, name: &str) -> bool {
    let environment = environment_of(pid);
    lookup_variable(environment.iter().map(String::as_str), name).is_some()
}
