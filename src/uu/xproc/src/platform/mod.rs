// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

//! Per-OS readers, selected at compile time.
//!
//! Every backend exposes the same free functions and an `Attachment` type;
//! the crate root only ever talks to these re-exports.

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "windows"
)))]
mod fallback;
#[cfg(target_os = "freebsd")]
mod freebsd;
#[cfg(unix)]
mod helpers;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "windows"
)))]
pub use fallback::{
    attach, current_parent_id, executable_path, exists, kill, parent_pid, parent_table, pids,
    read_raw_attribute,
};
#[cfg(target_os = "freebsd")]
pub use freebsd::{
    attach, current_parent_id, executable_path, exists, kill, parent_pid, parent_table, pids,
    read_raw_attribute,
};
#[cfg(target_os = "linux")]
pub use linux::{
    attach, current_parent_id, executable_path, exists, kill, parent_pid, parent_table, pids,
    read_raw_attribute,
};
#[cfg(target_os = "macos")]
pub use macos::{
    attach, current_parent_id, executable_path, exists, kill, parent_pid, parent_table, pids,
    read_raw_attribute,
};
#[cfg(target_os = "windows")]
pub use windows::{
    attach, current_parent_id, executable_path, exists, kill, parent_pid, parent_table, pids,
    pump_messages, read_raw_attribute,
};
