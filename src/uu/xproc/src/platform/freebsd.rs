// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::ffi::CStr;
use std::mem;
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_void, kinfo_proc, sysctl, O_RDONLY};

use crate::bridge::Bitness;
use crate::common::{AttributeKind, ProcessError, ProcessId};
use crate::parse::{BufferShape, RawAttributeBuffer};

pub use super::helpers::current_parent_id;
use super::helpers::{signal_exists, signal_kill};

// FreeBSD sysctl constants
const CTL_KERN: c_int = 1;
const KERN_PROC: c_int = 14;
const KERN_PROC_PID: c_int = 1;
const KERN_PROC_PROC: c_int = 8;
const KERN_PROC_PATHNAME: c_int = 12;
const KERN_PROC_CWD: c_int = 42;

// sys/user.h
const KINFO_FILE_PATH_LEN: usize = 1024;
const POSIX2_LINE_MAX: usize = 2048;

#[repr(C)]
struct KvmHandle {
    _private: [u8; 0],
}

#[link(name = "kvm")]
extern "C" {
    fn kvm_openfiles(
        execfile: *const c_char,
        corefile: *const c_char,
        swapfile: *const c_char,
        flags: c_int,
        errbuf: *mut c_char,
    ) -> *mut KvmHandle;
    fn kvm_getprocs(kd: *mut KvmHandle, op: c_int, arg: c_int, cnt: *mut c_int)
        -> *mut kinfo_proc;
    fn kvm_getargv(kd: *mut KvmHandle, p: *const kinfo_proc, nchr: c_int) -> *mut *mut c_char;
    fn kvm_getenvv(kd: *mut KvmHandle, p: *const kinfo_proc, nchr: c_int) -> *mut *mut c_char;
    fn kvm_close(kd: *mut KvmHandle) -> c_int;
}

/// Runs a `kern.proc` sysctl whose answer is a variable-size buffer.
fn sysctl_buffer(mib: &mut [c_int]) -> Option<Vec<u8>> {
    let mut size = 0usize;
    let ret = unsafe {
        sysctl(
            mib.as_mut_ptr(),
            mib.len() as u32,
            ptr::null_mut(),
            &mut size,
            ptr::null(),
            0,
        )
    };
    if ret != 0 || size == 0 {
        return None;
    }

    // Processes may appear between the size query and the read
    size += size / 8;
    let mut buffer = vec![0u8; size];
    let ret = unsafe {
        sysctl(
            mib.as_mut_ptr(),
            mib.len() as u32,
            buffer.as_mut_ptr() as *mut c_void,
            &mut size,
            ptr::null(),
            0,
        )
    };
    if ret != 0 {
        return None;
    }
    buffer.truncate(size);
    Some(buffer)
}

fn kinfo_procs(mib: &mut [c_int]) -> Vec<kinfo_proc> {
    let Some(buffer) = sysctl_buffer(mib) else {
        return Vec::new();
    };
    buffer
        .chunks_exact(mem::size_of::<kinfo_proc>())
        .map(|chunk| unsafe { ptr::read_unaligned(chunk.as_ptr() as *const kinfo_proc) })
        .collect()
}

pub fn pids() -> Vec<ProcessId> {
    kinfo_procs(&mut [CTL_KERN, KERN_PROC, KERN_PROC_PROC, 0])
        .into_iter()
        .filter(|info| info.ki_pid >= 0)
        .map(|info| info.ki_pid as ProcessId)
        .collect()
}

pub fn exists(pid: ProcessId) -> bool {
    signal_exists(pid)
}

pub fn kill(pid: ProcessId) -> bool {
    signal_kill(pid)
}

fn c_pid(pid: ProcessId) -> Result<c_int, ProcessError> {
    c_int::try_from(pid).map_err(|_| ProcessError::NotFound(pid))
}

pub fn parent_pid(pid: ProcessId) -> Result<ProcessId, ProcessError> {
    kinfo_procs(&mut [CTL_KERN, KERN_PROC, KERN_PROC_PID, c_pid(pid)?])
        .first()
        .map(|info| info.ki_ppid as ProcessId)
        .ok_or(ProcessError::NotFound(pid))
}

pub fn parent_table() -> Vec<(ProcessId, ProcessId)> {
    kinfo_procs(&mut [CTL_KERN, KERN_PROC, KERN_PROC_PROC, 0])
        .into_iter()
        .filter(|info| info.ki_pid >= 0 && info.ki_ppid >= 0)
        .map(|info| (info.ki_pid as ProcessId, info.ki_ppid as ProcessId))
        .collect()
}

pub fn executable_path(pid: ProcessId) -> Result<String, ProcessError> {
    let buffer = sysctl_buffer(&mut [CTL_KERN, KERN_PROC, KERN_PROC_PATHNAME, c_pid(pid)?])
        .ok_or_else(|| ProcessError::read_failure(pid, "kern.proc.pathname failed"))?;
    Ok(crate::parse::parse_scalar(&buffer))
}

/// An open `kvm` descriptor over the live kernel.
struct Kvm(NonNull<KvmHandle>);

impl Kvm {
    fn open(pid: ProcessId) -> Result<Self, ProcessError> {
        let mut errbuf = [0 as c_char; POSIX2_LINE_MAX];
        let handle = unsafe {
            kvm_openfiles(
                c"/dev/null".as_ptr(),
                c"/dev/null".as_ptr(),
                ptr::null(),
                O_RDONLY,
                errbuf.as_mut_ptr(),
            )
        };
        NonNull::new(handle).map(Self).ok_or_else(|| {
            let reason = unsafe { CStr::from_ptr(errbuf.as_ptr()) };
            ProcessError::read_failure(pid, format!("kvm_openfiles: {}", reason.to_string_lossy()))
        })
    }
}

impl Drop for Kvm {
    fn drop(&mut self) {
        unsafe {
            kvm_close(self.0.as_ptr());
        }
    }
}

#[derive(Debug)]
pub struct Attachment {
    pid: ProcessId,
}

impl Attachment {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

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
    let file = sysctl_buffer(&mut [CTL_KERN, KERN_PROC, KERN_PROC_CWD, c_pid(pid)?])
        .ok_or(ProcessError::AccessDenied(pid))?;

    // kinfo_file: kf_structsize leads, kf_path is the trailing member
    let struct_size = file
        .get(..mem::size_of::<c_int>())
        .and_then(|bytes| bytes.try_into().ok())
        .map(c_int::from_ne_bytes)
        .and_then(|size| usize::try_from(size).ok())
        .ok_or_else(|| ProcessError::read_failure(pid, "short kinfo_file"))?;
    let path = struct_size
        .checked_sub(KINFO_FILE_PATH_LEN)
        .and_then(|start| file.get(start..struct_size))
        .ok_or_else(|| ProcessError::read_failure(pid, "short kinfo_file"))?;

    Ok(RawAttributeBuffer::narrow(path.to_vec(), BufferShape::Scalar))
}

/// Copies a kvm string vector into one NUL-separated buffer.
fn vector_buffer(
    pid: ProcessId,
    read: unsafe extern "C" fn(*mut KvmHandle, *const kinfo_proc, c_int) -> *mut *mut c_char,
) -> Result<RawAttributeBuffer, ProcessError> {
    let kvm = Kvm::open(pid)?;
    let mut count: c_int = 0;
    let procs = unsafe { kvm_getprocs(kvm.0.as_ptr(), KERN_PROC_PID, c_pid(pid)?, &mut count) };
    if procs.is_null() || count < 1 {
        return Err(ProcessError::NotFound(pid));
    }

    let vector = unsafe { read(kvm.0.as_ptr(), procs, 0) };
    if vector.is_null() {
        return Err(ProcessError::AccessDenied(pid));
    }

    // The strings belong to the kvm handle; copy them before it closes
    let mut data = Vec::new();
    let mut cursor = vector;
    unsafe {
        while !(*cursor).is_null() {
            data.extend_from_slice(CStr::from_ptr(*cursor).to_bytes());
            data.push(0);
            cursor = cursor.add(1);
        }
    }
    Ok(RawAttributeBuffer::narrow(data, BufferShape::Delimited))
}

pub fn read_raw_attribute(
    attachment: &Attachment,
    kind: AttributeKind,
) -> Result<RawAttributeBuffer, ProcessError> {
    match kind {
        AttributeKind::WorkingDirectory => working_directory(attachment.pid()),
        AttributeKind::CommandLine => vector_buffer(attachment.pid(), kvm_getargv),
        AttributeKind::Environment => vector_buffer(attachment.pid(), kvm_getenvv),
    }
}
