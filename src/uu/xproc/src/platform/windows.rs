// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::ffi::c_void;
use std::mem;
use std::ptr::{self, NonNull};

use tracing::debug;
use windows_sys::Wdk::System::Threading::{NtQueryInformationProcess, ProcessBasicInformation};
use windows_sys::Win32::Foundation::{CloseHandle, LocalFree, HANDLE, INVALID_HANDLE_VALUE, LUID};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_DEBUG_NAME,
    SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, IsWow64Process, OpenProcess, OpenProcessToken, QueryFullProcessImageNameW,
    TerminateProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_INFORMATION,
    PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE, PROCESS_VM_READ,
};
use windows_sys::Win32::UI::Shell::CommandLineToArgvW;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
};

use crate::bridge::Bitness;
use crate::common::{AttributeKind, ProcessError, ProcessId};
use crate::parse::{BufferShape, RawAttributeBuffer};

/// Owned kernel handle, closed on drop.
struct HandleWrapper(NonNull<c_void>);
unsafe impl Send for HandleWrapper {}
impl Drop for HandleWrapper {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0.as_ptr());
        };
    }
}

impl HandleWrapper {
    fn new(handle: HANDLE) -> Option<Self> {
        if handle == INVALID_HANDLE_VALUE {
            return None;
        }
        NonNull::new(handle).map(Self)
    }

    fn raw(&self) -> HANDLE {
        self.0.as_ptr()
    }
}

// ntdll/winternl layouts, native word size only
#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct BasicInformation {
    exit_status: i32,
    peb_base_address: usize,
    affinity_mask: usize,
    base_priority: i32,
    unique_process_id: usize,
    inherited_from_unique_process_id: usize,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct Peb {
    inherited_address_space: u8,
    read_image_file_exec_options: u8,
    being_debugged: u8,
    bit_field: u8,
    mutant: usize,
    image_base_address: usize,
    ldr: usize,
    process_parameters: usize,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct UnicodeString {
    length: u16,
    maximum_length: u16,
    buffer: usize,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct CurDir {
    dos_path: UnicodeString,
    handle: usize,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct DriveLetterCurDir {
    flags: u16,
    length: u16,
    time_stamp: u32,
    dos_path: UnicodeString,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct UserProcessParameters {
    maximum_length: u32,
    length: u32,
    flags: u32,
    debug_flags: u32,
    console_handle: usize,
    console_flags: u32,
    standard_input: usize,
    standard_output: usize,
    standard_error: usize,
    current_directory: CurDir,
    dll_path: UnicodeString,
    image_path_name: UnicodeString,
    command_line: UnicodeString,
    environment: usize,
    starting_x: u32,
    starting_y: u32,
    count_x: u32,
    count_y: u32,
    count_chars_x: u32,
    count_chars_y: u32,
    fill_attribute: u32,
    window_flags: u32,
    show_window_flags: u32,
    window_title: UnicodeString,
    desktop_info: UnicodeString,
    shell_info: UnicodeString,
    runtime_data: UnicodeString,
    current_directories: [DriveLetterCurDir; 32],
    environment_size: usize,
    environment_version: usize,
}

fn snapshot() -> Vec<PROCESSENTRY32W> {
    let Some(snapshot) = HandleWrapper::new(unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) })
    else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    let mut entry: PROCESSENTRY32W = unsafe { mem::zeroed() };
    entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;
    let mut more = unsafe { Process32FirstW(snapshot.raw(), &mut entry) } != 0;
    while more {
        entries.push(entry);
        more = unsafe { Process32NextW(snapshot.raw(), &mut entry) } != 0;
    }
    entries
}

pub fn pids() -> Vec<ProcessId> {
    snapshot().iter().map(|entry| entry.th32ProcessID).collect()
}

pub fn exists(pid: ProcessId) -> bool {
    snapshot().iter().any(|entry| entry.th32ProcessID == pid)
}

pub fn parent_pid(pid: ProcessId) -> Result<ProcessId, ProcessError> {
    snapshot()
        .iter()
        .find(|entry| entry.th32ProcessID == pid)
        .map(|entry| entry.th32ParentProcessID)
        .ok_or(ProcessError::NotFound(pid))
}

pub fn parent_table() -> Vec<(ProcessId, ProcessId)> {
    snapshot()
        .iter()
        .map(|entry| (entry.th32ProcessID, entry.th32ParentProcessID))
        .collect()
}

pub fn current_parent_id() -> ProcessId {
    parent_pid(std::process::id()).unwrap_or(0)
}

/// Best effort: lets administrators open processes of other users.
fn enable_debug_privilege() {
    let mut token: HANDLE = ptr::null_mut();
    let opened = unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )
    };
    let Some(token) = HandleWrapper::new(token).filter(|_| opened != 0) else {
        return;
    };

    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    if unsafe { LookupPrivilegeValueW(ptr::null(), SE_DEBUG_NAME, &mut luid) } == 0 {
        return;
    }
    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    let adjusted = unsafe {
        AdjustTokenPrivileges(
            token.raw(),
            0,
            &privileges,
            0,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    if adjusted == 0 {
        debug!("SeDebugPrivilege not available");
    }
}

fn open_process(pid: ProcessId, access: u32) -> Option<HandleWrapper> {
    enable_debug_privilege();
    HandleWrapper::new(unsafe { OpenProcess(access, 0, pid) })
}

pub fn kill(pid: ProcessId) -> bool {
    open_process(pid, PROCESS_TERMINATE)
        .is_some_and(|process| unsafe { TerminateProcess(process.raw(), 0) } != 0)
}

pub fn executable_path(pid: ProcessId) -> Result<String, ProcessError> {
    let process = open_process(pid, PROCESS_QUERY_LIMITED_INFORMATION)
        .ok_or(ProcessError::AccessDenied(pid))?;
    let mut buffer = vec![0u16; 32768];
    let mut size = buffer.len() as u32;
    let ok = unsafe {
        QueryFullProcessImageNameW(
            process.raw(),
            PROCESS_NAME_WIN32,
            buffer.as_mut_ptr(),
            &mut size,
        )
    };
    if ok == 0 {
        return Err(ProcessError::read_failure(pid, std::io::Error::last_os_error()));
    }
    Ok(String::from_utf16_lossy(&buffer[..size as usize]))
}

fn is_wow64(handle: HANDLE) -> Option<bool> {
    let mut wow64 = 0;
    if unsafe { IsWow64Process(handle, &mut wow64) } == 0 {
        return None;
    }
    Some(wow64 != 0)
}

/// An open process handle plus the target's word size.
pub struct Attachment {
    pid: ProcessId,
    process: HandleWrapper,
    bitness: Bitness,
}

impl Attachment {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Targets of the other word size are read through the helper executable.
    pub fn bridge_target(&self) -> Option<Bitness> {
        (self.bitness != Bitness::NATIVE).then_some(self.bitness)
    }
}

fn target_bitness(process: HANDLE) -> Result<Bitness, std::io::Error> {
    let target_wow64 = is_wow64(process).ok_or_else(std::io::Error::last_os_error)?;
    if target_wow64 {
        return Ok(Bitness::X86);
    }
    // Not under WOW64: the target runs at the OS word size
    if cfg!(target_pointer_width = "32") {
        let self_wow64 =
            is_wow64(unsafe { GetCurrentProcess() }).ok_or_else(std::io::Error::last_os_error)?;
        if !self_wow64 {
            return Ok(Bitness::X86);
        }
    }
    Ok(Bitness::X64)
}

pub fn attach(pid: ProcessId) -> Result<Attachment, ProcessError> {
    let process = open_process(pid, PROCESS_QUERY_INFORMATION | PROCESS_VM_READ)
        .or_else(|| open_process(pid, PROCESS_QUERY_LIMITED_INFORMATION))
        .ok_or_else(|| {
            if exists(pid) {
                ProcessError::AccessDenied(pid)
            } else {
                ProcessError::NotFound(pid)
            }
        })?;
    let bitness = target_bitness(process.raw()).map_err(|err| ProcessError::read_failure(pid, err))?;
    Ok(Attachment {
        pid,
        process,
        bitness,
    })
}

/// Copies exactly `size` bytes out of the target, or fails.
fn read_memory(attachment: &Attachment, address: usize, size: usize) -> Result<Vec<u8>, ProcessError> {
    if size == 0 {
        return Ok(Vec::new());
    }
    if address == 0 {
        return Err(ProcessError::read_failure(attachment.pid, "null remote pointer"));
    }
    let mut buffer = vec![0u8; size];
    let mut read = 0usize;
    let ok = unsafe {
        ReadProcessMemory(
            attachment.process.raw(),
            address as *const c_void,
            buffer.as_mut_ptr() as *mut c_void,
            size,
            &mut read,
        )
    };
    if ok == 0 {
        return Err(ProcessError::read_failure(
            attachment.pid,
            std::io::Error::last_os_error(),
        ));
    }
    if read != size {
        return Err(ProcessError::read_failure(
            attachment.pid,
            format!("short read at {address:#x}: {read}/{size}"),
        ));
    }
    Ok(buffer)
}

fn read_struct<T: Copy>(attachment: &Attachment, address: usize) -> Result<T, ProcessError> {
    let bytes = read_memory(attachment, address, mem::size_of::<T>())?;
    Ok(unsafe { ptr::read_unaligned(bytes.as_ptr() as *const T) })
}

fn read_wide(attachment: &Attachment, address: usize, byte_len: usize) -> Result<Vec<u16>, ProcessError> {
    let bytes = read_memory(attachment, address, byte_len)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn process_parameters(attachment: &Attachment) -> Result<UserProcessParameters, ProcessError> {
    let mut info: BasicInformation = unsafe { mem::zeroed() };
    let mut returned = 0u32;
    let status = unsafe {
        NtQueryInformationProcess(
            attachment.process.raw(),
            ProcessBasicInformation,
            &mut info as *mut _ as *mut c_void,
            mem::size_of::<BasicInformation>() as u32,
            &mut returned,
        )
    };
    if status < 0 {
        return Err(ProcessError::read_failure(
            attachment.pid,
            format!("NtQueryInformationProcess returned {status:#x}"),
        ));
    }

    let peb: Peb = read_struct(attachment, info.peb_base_address)?;
    read_struct(attachment, peb.process_parameters)
}

/// Splits a command line the way the C runtime does and lays the arguments
/// out NUL-terminated, empty arguments included.
fn split_command_line(pid: ProcessId, mut command_line: Vec<u16>) -> Result<Vec<u16>, ProcessError> {
    // An empty string would make the shell return our own image path
    if command_line.is_empty() {
        return Ok(Vec::new());
    }
    command_line.push(0);

    let mut argc = 0i32;
    let argv = unsafe { CommandLineToArgvW(command_line.as_ptr(), &mut argc) };
    if argv.is_null() {
        return Err(ProcessError::read_failure(
            pid,
            std::io::Error::last_os_error(),
        ));
    }

    let mut fields = Vec::new();
    for index in 0..argc.max(0) as usize {
        let arg = unsafe { *argv.add(index) };
        let len = (0..).take_while(|&i| unsafe { *arg.add(i) } != 0).count();
        fields.extend_from_slice(unsafe { std::slice::from_raw_parts(arg, len) });
        fields.push(0);
    }
    unsafe { LocalFree(argv as *mut c_void) };
    Ok(fields)
}

pub fn read_raw_attribute(
    attachment: &Attachment,
    kind: AttributeKind,
) -> Result<RawAttributeBuffer, ProcessError> {
    let params = process_parameters(attachment)?;
    match kind {
        AttributeKind::WorkingDirectory => {
            let dos_path = params.current_directory.dos_path;
            let path = read_wide(attachment, dos_path.buffer, dos_path.length as usize)?;
            Ok(RawAttributeBuffer::wide(path, BufferShape::Scalar))
        }
        AttributeKind::CommandLine => {
            let command_line = params.command_line;
            let raw = read_wide(attachment, command_line.buffer, command_line.length as usize)?;
            Ok(RawAttributeBuffer::wide(
                split_command_line(attachment.pid, raw)?,
                BufferShape::Delimited,
            ))
        }
        AttributeKind::Environment => {
            let block = read_wide(attachment, params.environment, params.environment_size)?;
            Ok(RawAttributeBuffer::wide(block, BufferShape::SentinelTerminated))
        }
    }
}

/// Drains this thread's message queue so windows it owns keep responding
/// while the caller blocks on the helper.
pub fn pump_messages() {
    let mut msg: MSG = unsafe { mem::zeroed() };
    unsafe {
        while PeekMessageW(&mut msg, ptr::null_mut(), 0, 0, PM_REMOVE) != 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;

    #[test]
    fn test_structure_layout() {
        let word = mem::size_of::<usize>();
        assert_eq!(mem::size_of::<UnicodeString>(), 2 * word);
        assert_eq!(mem::size_of::<DriveLetterCurDir>(), 8 + 2 * word);
        if word == 8 {
            assert_eq!(mem::offset_of!(Peb, process_parameters), 0x20);
            assert_eq!(mem::offset_of!(UserProcessParameters, command_line), 0x70);
            assert_eq!(mem::offset_of!(UserProcessParameters, environment), 0x80);
            assert_eq!(mem::offset_of!(UserProcessParameters, environment_size), 0x3f0);
        } else {
            assert_eq!(mem::offset_of!(Peb, process_parameters), 0x10);
            assert_eq!(mem::offset_of!(UserProcessParameters, command_line), 0x40);
            assert_eq!(mem::offset_of!(UserProcessParameters, environment), 0x48);
            assert_eq!(mem::offset_of!(UserProcessParameters, environment_size), 0x290);
        }
    }

    #[test]
    fn test_snapshot_contains_self() {
        assert!(pids().contains(&process::id()));
        assert!(exists(process::id()));
        assert!(!exists(u32::MAX - 1));
    }

    #[test]
    fn test_read_own_attributes() {
        let attachment = attach(process::id()).unwrap();
        assert!(attachment.bridge_target().is_none());

        let cwd = read_raw_attribute(&attachment, AttributeKind::WorkingDirectory).unwrap();
        let expected = std::env::current_dir().unwrap();
        assert_eq!(
            cwd.scalar().trim_end_matches('\\').to_lowercase(),
            expected.to_string_lossy().trim_end_matches('\\').to_lowercase()
        );

        let env = read_raw_attribute(&attachment, AttributeKind::Environment).unwrap();
        assert!(!env.fields(AttributeKind::Environment).is_empty());
    }

    #[test]
    fn test_split_command_line() {
        let line: Vec<u16> = r#"prog.exe "two words" plain"#.encode_utf16().collect();
        let expected: Vec<u16> = "prog.exe\0two words\0plain\0".encode_utf16().collect();
        assert_eq!(split_command_line(1, line).unwrap(), expected);
        assert!(split_command_line(1, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_split_command_line_keeps_empty_argument() {
        let line: Vec<u16> = r#"prog.exe "" x"#.encode_utf16().collect();
        let buffer = RawAttributeBuffer::wide(
            split_command_line(1, line).unwrap(),
            BufferShape::Delimited,
        );
        assert_eq!(
            buffer.fields(AttributeKind::CommandLine),
            vec!["prog.exe", "", "x"]
        );
    }
}
