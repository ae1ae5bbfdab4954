// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::bridge::Bitness;
use crate::common::{AttributeKind, ProcessError, ProcessId};
use crate::parse::{BufferShape, RawAttributeBuffer};

pub use super::helpers::current_parent_id;
use super::helpers::{signal_exists, signal_kill};

fn proc_path(pid: ProcessId) -> PathBuf {
    Path::new("/proc").join(pid.to_string())
}

/// Lists the numeric entries of `/proc`.
pub fn pids() -> Vec<ProcessId> {
    WalkDir::new("/proc/")
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| entry.file_name().to_str()?.parse::<ProcessId>().ok())
        .collect()
}

pub fn exists(pid: ProcessId) -> bool {
    signal_exists(pid)
}

pub fn kill(pid: ProcessId) -> bool {
    signal_kill(pid)
}

/// Extracts the parent pid from the contents of `/proc/<pid>/stat`.
///
/// The command name sits in parentheses and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
fn parent_from_stat(stat: &str) -> Option<ProcessId> {
    let right = stat.rfind(')')?;
    stat[right + 1..].split_whitespace().nth(1)?.parse().ok()
}

pub fn parent_pid(pid: ProcessId) -> Result<ProcessId, ProcessError> {
    let stat = fs::read_to_string(proc_path(pid).join("stat"))
        .map_err(|err| ProcessError::from_io(pid, &err))?;
    parent_from_stat(&stat).ok_or_else(|| ProcessError::read_failure(pid, "malformed stat"))
}

/// `(pid, parent)` for every process that could be read.
pub fn parent_table() -> Vec<(ProcessId, ProcessId)> {
    pids()
        .into_iter()
        .filter_map(|pid| parent_pid(pid).ok().map(|ppid| (pid, ppid)))
        .collect()
}

pub fn executable_path(pid: ProcessId) -> Result<String, ProcessError> {
    let path =
        fs::read_link(proc_path(pid).join("exe")).map_err(|err| ProcessError::from_io(pid, &err))?;
    Ok(path.to_string_lossy().into_owned())
}

/// Proof that `pid` existed when attribute reads began. Procfs needs no handle.
#[derive(Debug)]
pub struct Attachment {
    pid: ProcessId,
}

impl Attachment {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Procfs reads work across any word size.
    pub fn bridge_target(&self) -> Option<Bitness> {
        None
    }
}

pub fn attach(pid: ProcessId) -> Result<Attachment, ProcessError> {
    if !proc_path(pid).is_dir() {
        return Err(ProcessError::NotFound(pid));
    }
    Ok(Attachment { pid })
}

pub fn read_raw_attribute(
    attachment: &Attachment,
    kind: AttributeKind,
) -> Result<RawAttributeBuffer, ProcessError> {
    let pid = attachment.pid();
    let base = proc_path(pid);
    let io_error = |err: std::io::Error| ProcessError::from_io(pid, &err);

    match kind {
        AttributeKind::WorkingDirectory => {
            let cwd = fs::read_link(base.join("cwd")).map_err(io_error)?;
            Ok(RawAttributeBuffer::narrow(
                cwd.as_os_str().as_bytes().to_vec(),
                BufferShape::Scalar,
            ))
        }
        AttributeKind::CommandLine => Ok(RawAttributeBuffer::narrow(
            fs::read(base.join("cmdline")).map_err(io_error)?,
            BufferShape::Delimited,
        )),
        AttributeKind::Environment => Ok(RawAttributeBuffer::narrow(
            fs::read(base.join("environ")).map_err(io_error)?,
            BufferShape::SentinelTerminated,
        )),
    }
}
