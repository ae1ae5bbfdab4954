// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

//! Mapping top-level windows to the processes that own them.

use std::ffi::c_void;

use windows_sys::Win32::Foundation::{HWND, LPARAM};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowThreadProcessId, IsWindow,
};

use crate::common::ProcessId;

/// A top-level window handle, as an integer.
pub type WindowId = usize;

fn hwnd(window: WindowId) -> HWND {
    window as *mut c_void
}

unsafe extern "system" fn collect_window(window: HWND, state: LPARAM) -> i32 {
    let windows = unsafe { &mut *(state as *mut Vec<WindowId>) };
    windows.push(window as WindowId);
    1
}

/// Every top-level window on the current desktop.
pub fn enumerate_window_ids() -> Vec<WindowId> {
    let mut windows: Vec<WindowId> = Vec::new();
    unsafe {
        EnumWindows(
            Some(collect_window),
            &mut windows as *mut Vec<WindowId> as LPARAM,
        );
    }
    windows
}

pub fn window_exists(window: WindowId) -> bool {
    unsafe { IsWindow(hwnd(window)) != 0 }
}

/// The process that created `window`.
pub fn window_owner(window: WindowId) -> Option<ProcessId> {
    if !window_exists(window) {
        return None;
    }
    let mut pid: u32 = 0;
    let thread = unsafe { GetWindowThreadProcessId(hwnd(window), &mut pid) };
    (thread != 0).then_some(pid)
}

/// Top-level windows owned by `pid`, in enumeration order.
pub fn window_ids_of(pid: ProcessId) -> Vec<WindowId> {
    enumerate_window_ids()
        .into_iter()
        .filter(|&window| window_owner(window) == Some(pid))
        .collect()
}

/// Terminates the process owning `window`.
pub fn kill_window(window: WindowId) -> bool {
    window_owner(window).is_some_and(crate::kill_process)
}
