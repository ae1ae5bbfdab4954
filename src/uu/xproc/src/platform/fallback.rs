// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

//! Platforms without a reader: only signal-based liveness on other Unixes.

use crate::bridge::Bitness;
use crate::common::{AttributeKind, ProcessError, ProcessId};
use crate::parse::RawAttributeBuffer;

pub fn pids() -> Vec<ProcessId> {
    Vec::new()
}

pub fn exists(pid: ProcessId) -> bool {
    #[cfg(unix)]
    {
        super::helpers::signal_exists(pid)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

pub fn kill(pid: ProcessId) -> bool {
    #[cfg(unix)]
    {
        super::helpers::signal_kill(pid)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

pub fn current_parent_id() -> ProcessId {
    #[cfg(unix)]
    {
        super::helpers::current_parent_id()
    }
    #[cfg(not(unix))]
    {
        0
    }
}

pub fn parent_pid(_pid: ProcessId) -> Result<ProcessId, ProcessError> {
    Err(ProcessError::Unsupported("parent lookup"))
}

pub fn parent_table() -> Vec<(ProcessId, ProcessId)> {
    Vec::new()
}

pub fn executable_path(_pid: ProcessId) -> Result<String, ProcessError> {
    Err(ProcessError::Unsupported("executable path"))
}

#[derive(Debug)]
pub struct Attachment;

impl Attachment {
    pub fn bridge_target(&self) -> Option<Bitness> {
        None
    }
}

pub fn attach(_pid: ProcessId) -> Result<Attachment, ProcessError> {
    Err(ProcessError::Unsupported("process attachment"))
}

pub fn read_raw_attribute(
    _attachment: &Attachment,
    _kind: AttributeKind,
) -> Result<RawAttributeBuffer, ProcessError> {
    Err(ProcessError::Unsupported("attribute reads"))
}
