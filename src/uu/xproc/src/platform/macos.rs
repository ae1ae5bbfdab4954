// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::ffi::CStr;
use std::mem;
use std::ptr;

use libc::{
    c_char, c_int, c_void, proc_bsdinfo, proc_listpids, proc_pidinfo, proc_pidpath,
    proc_vnodepathinfo, sysctl, CTL_KERN, KERN_ARGMAX, KERN_PROCARGS2, PROC_PIDPATHINFO_MAXSIZE,
    PROC_PIDTBSDINFO, PROC_PIDVNODEPATHINFO,
};

use crate::bridge::Bitness;
use crate::common::{AttributeKind, ProcessError, ProcessId};
use crate::parse::{split_procargs2, BufferShape, RawAttributeBuffer};

pub use super::helpers::current_parent_id;
use super::helpers::{signal_exists, signal_kill};

// macOS libproc constants
const PROC_ALL_PIDS: u32 = 1;

fn c_pid(pid: ProcessId) -> Result<c_int, ProcessError> {
    c_int::try_from(pid).map_err(|_| ProcessError::NotFound(pid))
}

/// All pids known to the kernel, `kernel_task` (pid 0) included.
pub fn pids() -> Vec<ProcessId> {
    let needed = unsafe { proc_listpids(PROC_ALL_PIDS, 0, ptr::null_mut(), 0) };
    if needed <= 0 {
        return Vec::new();
    }

    // Leave room for processes spawned between the two calls
    let capacity = needed as usize / mem::size_of::<c_int>() + 64;
    let mut buffer: Vec<c_int> = vec![0; capacity];
    let written = unsafe {
        proc_listpids(
            PROC_ALL_PIDS,
            0,
            buffer.as_mut_ptr() as *mut c_void,
            (capacity * mem::size_of::<c_int>()) as c_int,
        )
    };
    if written <= 0 {
        return Vec::new();
    }

    buffer.truncate(written as usize / mem::size_of::<c_int>());
    // The kernel pads the tail with zeroes; only the first zero is kernel_task
    let mut seen_kernel_task = false;
    buffer
        .into_iter()
        .filter(|&pid| {
            if pid == 0 {
                !mem::replace(&mut seen_kernel_task, true)
            } else {
                pid > 0
            }
        })
        .map(|pid| pid as ProcessId)
        .collect()
}

pub fn exists(pid: ProcessId) -> bool {
    pid == 0 || signal_exists(pid)
}

pub fn kill(pid: ProcessId) -> bool {
    signal_kill(pid)
}

fn bsd_info(pid: ProcessId) -> Result<proc_bsdinfo, ProcessError> {
    let mut info: proc_bsdinfo = unsafe { mem::zeroed() };
    let size = mem::size_of::<proc_bsdinfo>() as c_int;
    let result = unsafe {
        proc_pidinfo(
            c_pid(pid)?,
            PROC_PIDTBSDINFO,
            0,
            &mut info as *mut _ as *mut c_void,
            size,
        )
    };
    if result != size {
        return Err(ProcessError::NotFound(pid));
    }
    Ok(info)
}

pub fn parent_pid(pid: ProcessId) -> Result<ProcessId, ProcessError> {
    Ok(bsd_info(pid)?.pbi_ppid)
}

pub fn parent_table() -> Vec<(ProcessId, ProcessId)> {
    pids()
        .into_iter()
        .filter_map(|pid| parent_pid(pid).ok().map(|ppid| (pid, ppid)))
        .collect()
}

pub fn executable_path(pid: ProcessId) -> Result<String, ProcessError> {
    let mut buffer = [0u8; PROC_PIDPATHINFO_MAXSIZE as usize];
    let result = unsafe {
        proc_pidpath(
            c_pid(pid)?,
            buffer.as_mut_ptr() as *mut c_void,
            buffer.len() as u32,
        )
    };
    if result <= 0 {
        return Err(ProcessError::read_failure(pid, "proc_pidpath failed"));
    }
    Ok(String::from_utf8_lossy(&buffer[..result as usize]).into_owned())
}

#[derive(Debug)]
pub struct Attachment {
    pid: ProcessId,
}

impl Attachment {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// The kernel copies the data out for us whatever the target's word size.
    pub fn bridge_target(&self) -> Option<Bitness> {
        None
    }
}

pub fn attach(pid: ProcessId) -> Result<Attachment, ProcessError> {
    if !exists(pid) {
        return Err(ProcessError::NotFound(pid));
    }
    Ok(Attachment { pid })
}

fn working_directory(pid: ProcessId) -> Result<RawAttributeBuffer, ProcessError> {
    let mut info: proc_vnodepathinfo = unsafe { mem::zeroed() };
    let size = mem::size_of::<proc_vnodepathinfo>() as c_int;
    let result = unsafe {
        proc_pidinfo(
            c_pid(pid)?,
            PROC_PIDVNODEPATHINFO,
            0,
            &mut info as *mut _ as *mut c_void,
            size,
        )
    };
    if result != size {
        return Err(ProcessError::AccessDenied(pid));
    }

    let path = unsafe { CStr::from_ptr(info.pvi_cdir.vip_path.as_ptr() as *const c_char) };
    Ok(RawAttributeBuffer::narrow(
        path.to_bytes().to_vec(),
        BufferShape::Scalar,
    ))
}

fn argument_space_size() -> Result<usize, ProcessError> {
    let mut mib: [c_int; 2] = [CTL_KERN, KERN_ARGMAX];
    let mut argmax: c_int = 0;
    let mut size = mem::size_of::<c_int>();
    let ret = unsafe {
        sysctl(
            mib.as_mut_ptr(),
            2,
            &mut argmax as *mut _ as *mut c_void,
            &mut size,
            ptr::null_mut(),
            0,
        )
    };
    if ret != 0 || argmax <= 0 {
        return Err(ProcessError::Unsupported("KERN_ARGMAX"));
    }
    Ok(argmax as usize)
}

/// Reads the `KERN_PROCARGS2` blob, which carries both argv and envp.
fn arguments_and_environment(pid: ProcessId) -> Result<RawAttributeBuffer, ProcessError> {
    let mut mib: [c_int; 3] = [CTL_KERN, KERN_PROCARGS2, c_pid(pid)?];
    let mut size = argument_space_size()?;
    let mut blob = vec![0u8; size];
    let ret = unsafe {
        sysctl(
            mib.as_mut_ptr(),
            3,
            blob.as_mut_ptr() as *mut c_void,
            &mut size,
            ptr::null_mut(),
            0,
        )
    };
    if ret != 0 {
        return Err(ProcessError::AccessDenied(pid));
    }
    blob.truncate(size);

    let (argc, vectors) =
        split_procargs2(&blob).ok_or_else(|| ProcessError::read_failure(pid, "truncated KERN_PROCARGS2"))?;
    Ok(RawAttributeBuffer::narrow(
        vectors.to_vec(),
        BufferShape::CountKnown { argc },
    ))
}

pub fn read_raw_attribute(
    attachment: &Attachment,
    kind: AttributeKind,
) -> Result<RawAttributeBuffer, ProcessError> {
    match kind {
        AttributeKind::WorkingDirectory => working_directory(attachment.pid()),
        AttributeKind::CommandLine | AttributeKind::Environment => {
            arguments_and_environment(attachment.pid())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;

    #[test]
    fn test_pids_contains_self_and_kernel_task() {
        let pids = pids();
        assert!(pids.contains(&process::id()));
        assert_eq!(pids.iter().filter(|&&pid| pid == 0).count(), 1);
    }

    #[test]
    fn test_parent_of_self() {
        assert_eq!(parent_pid(process::id()), Ok(current_parent_id()));
    }

    #[test]
    fn test_read_own_attributes() {
        let attachment = attach(process::id()).unwrap();

        let cwd = read_raw_attribute(&attachment, AttributeKind::WorkingDirectory).unwrap();
        assert!(!cwd.scalar().is_empty());

        let args = read_raw_attribute(&attachment, AttributeKind::CommandLine).unwrap();
        assert!(!args.fields(AttributeKind::CommandLine).is_empty());
    }
}
