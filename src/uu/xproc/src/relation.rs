// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

//! Parent/child lookups, optionally looking through `/bin/sh -c` wrappers.

use std::collections::HashSet;

use crate::common::ProcessId;

/// Interpreters that are considered transparent when skipping shells.
const SHELL_PATHS: &[&str] = &["/bin/sh", "/usr/bin/sh"];

/// Longest chain of nested shells that is looked through.
pub const MAX_SHELL_DEPTH: usize = 64;

/// The process relationships the resolver needs.
pub trait ProcessTable {
    fn parent_of(&self, pid: ProcessId) -> Option<ProcessId>;
    fn children_of(&self, pid: ProcessId) -> Vec<ProcessId>;
    fn command_line_of(&self, pid: ProcessId) -> Vec<String>;
}

/// The running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveProcessTable;

impl ProcessTable for LiveProcessTable {
    fn parent_of(&self, pid: ProcessId) -> Option<ProcessId> {
        crate::parent_of(pid)
    }

    fn children_of(&self, pid: ProcessId) -> Vec<ProcessId> {
        crate::children_of(pid)
    }

    fn command_line_of(&self, pid: ProcessId) -> Vec<String> {
        crate::command_line_of(pid)
    }
}

fn is_shell<T: ProcessTable + ?Sized>(table: &T, pid: ProcessId) -> bool {
    table
        .command_line_of(pid)
        .first()
        .is_some_and(|argv0| SHELL_PATHS.contains(&argv0.as_str()))
}

/// The nearest ancestor of `pid` that is not a shell.
///
/// Climbing stops at a process without a known parent (that process is
/// returned), after [`MAX_SHELL_DEPTH`] shells, or when a cycle shows up.
pub fn parent_skipping_shells<T: ProcessTable + ?Sized>(
    table: &T,
    pid: ProcessId,
) -> Option<ProcessId> {
    let mut current = table.parent_of(pid)?;
    let mut visited = HashSet::from([pid]);

    while visited.len() <= MAX_SHELL_DEPTH && is_shell(table, current) {
        if !visited.insert(current) {
            break;
        }
        match table.parent_of(current) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Some(current)
}

/// The children of `pid`, with every shell child replaced by its own
/// (shell-skipped) children.
pub fn children_skipping_shells<T: ProcessTable + ?Sized>(
    table: &T,
    pid: ProcessId,
) -> Vec<ProcessId> {
    let mut visited = HashSet::from([pid]);
    let mut result = Vec::new();
    collect_children(table, pid, 0, &mut visited, &mut result);
    result
}

fn collect_children<T: ProcessTable + ?Sized>(
    table: &T,
    pid: ProcessId,
    depth: usize,
    visited: &mut HashSet<ProcessId>,
    result: &mut Vec<ProcessId>,
) {
    for child in table.children_of(pid) {
        if !visited.insert(child) {
            continue;
        }
        if depth < MAX_SHELL_DEPTH && is_shell(table, child) {
            collect_children(table, child, depth + 1, visited, result);
        } else {
            result.push(child);
        }
    }
}
