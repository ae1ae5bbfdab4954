// This file is part of the xprocess package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

//! Reading a process of the other word size through a helper executable.
//!
//! A 64-bit caller cannot walk the structures of a 32-bit target (and vice
//! versa) with native layouts. Instead the matching `crossproc` build is
//! written to the temporary directory once, run with one query flag, and its
//! standard output becomes the raw attribute buffer.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::common::{AttributeKind, ProcessError, ProcessId};
use crate::parse::{BufferShape, RawAttributeBuffer};

/// Word size of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bitness {
    X86,
    X64,
}

impl Bitness {
    /// Word size of the running process.
    #[cfg(target_pointer_width = "64")]
    pub const NATIVE: Self = Self::X64;
    #[cfg(not(target_pointer_width = "64"))]
    pub const NATIVE: Self = Self::X86;

    pub fn helper_file_name(self) -> &'static str {
        match self {
            Self::X86 => "crossproc32.exe",
            Self::X64 => "crossproc64.exe",
        }
    }
}

/// Helper executables available for materialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelperPayloads {
    pub x86: Option<&'static [u8]>,
    pub x64: Option<&'static [u8]>,
}

impl HelperPayloads {
    /// The payloads baked in at build time, if any.
    pub fn embedded() -> Self {
        #[cfg(feature = "embed-helpers")]
        {
            Self {
                x86: Some(include_bytes!(env!("XPROC_HELPER32"))),
                x64: Some(include_bytes!(env!("XPROC_HELPER64"))),
            }
        }
        #[cfg(not(feature = "embed-helpers"))]
        {
            Self::default()
        }
    }

    fn for_bitness(&self, bitness: Bitness) -> Option<&'static [u8]> {
        match bitness {
            Bitness::X86 => self.x86,
            Bitness::X64 => self.x64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Where helper executables are written and looked up.
    pub temp_dir: PathBuf,
    /// How often the wait loop polls the helper and runs the tick callback.
    pub poll_interval: Duration,
    /// How long stdout may stay open after the helper exited, for instance
    /// held by a grandchild that inherited it.
    pub drain_timeout: Duration,
    pub payloads: HelperPayloads,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            poll_interval: Duration::from_millis(5),
            drain_timeout: Duration::from_secs(1),
            payloads: HelperPayloads::embedded(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    NotNeeded,
    HelperPathResolved,
    HelperMaterialized,
    AlreadyPresent,
    HelperInvoked,
    OutputCaptured,
    Done,
    Failed,
}

/// One helper round trip for one attribute of one process.
#[derive(Debug)]
pub struct BridgeSession<'a> {
    config: &'a BridgeConfig,
    kind: AttributeKind,
    pid: ProcessId,
    target: Option<Bitness>,
    helper: Option<PathBuf>,
    output: Vec<u8>,
    state: BridgeState,
}

impl<'a> BridgeSession<'a> {
    /// A session for `target`; `None` means the caller can read directly.
    pub fn new(
        config: &'a BridgeConfig,
        kind: AttributeKind,
        pid: ProcessId,
        target: Option<Bitness>,
    ) -> Self {
        Self {
            config,
            kind,
            pid,
            target,
            helper: None,
            output: Vec::new(),
            state: BridgeState::NotNeeded,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    fn transition(&mut self, state: BridgeState) {
        trace!(pid = self.pid, kind = %self.kind, from = ?self.state, to = ?state, "bridge");
        self.state = state;
    }

    fn fail(&mut self, detail: impl Into<String>) -> ProcessError {
        let detail = detail.into();
        debug!(pid = self.pid, kind = %self.kind, "{detail}");
        self.transition(BridgeState::Failed);
        ProcessError::BridgeFailure(detail)
    }

    pub fn resolve_helper_path(&mut self) -> Result<PathBuf, ProcessError> {
        let Some(target) = self.target else {
            return Err(self.fail("no helper needed for a same-bitness target"));
        };
        let path = self.config.temp_dir.join(target.helper_file_name());
        self.helper = Some(path.clone());
        self.transition(BridgeState::HelperPathResolved);
        Ok(path)
    }

    /// Makes sure the helper exists on disk, writing it if needed.
    ///
    /// An existing file is trusted as is. A fresh copy is written under a
    /// unique name and renamed into place without clobbering, so concurrent
    /// writers all end up with one complete file.
    pub fn materialize(&mut self) -> Result<(), ProcessError> {
        let path = match self.helper.clone() {
            Some(path) => path,
            None => self.resolve_helper_path()?,
        };

        if path.is_file() {
            self.transition(BridgeState::AlreadyPresent);
            return Ok(());
        }

        let payload = self
            .target
            .and_then(|target| self.config.payloads.for_bitness(target));
        let Some(payload) = payload else {
            return Err(self.fail(format!("no helper payload for {}", path.display())));
        };

        match write_helper(&self.config.temp_dir, &path, payload) {
            Ok(()) => {
                self.transition(BridgeState::HelperMaterialized);
                Ok(())
            }
            // Someone else won the race; their file is as good as ours
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && path.is_file() => {
                self.transition(BridgeState::AlreadyPresent);
                Ok(())
            }
            Err(err) => Err(self.fail(format!("cannot write {}: {err}", path.display()))),
        }
    }

    /// Runs the helper and collects everything it prints.
    ///
    /// `tick` runs on the calling thread between polls for as long as the
    /// helper is alive.
    pub fn invoke(&mut self, tick: &mut dyn FnMut()) -> Result<(), ProcessError> {
        let Some(path) = self.helper.clone() else {
            return Err(self.fail("helper invoked before materialization"));
        };

        let mut command = Command::new(&path);
        command
            .arg(self.kind.helper_flag())
            .arg(self.pid.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            use windows_sys::Win32::System::Threading::CREATE_NO_WINDOW;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let child = spawn(&mut command)
            .map_err(|err| self.fail(format!("cannot start {}: {err}", path.display())))?;
        self.transition(BridgeState::HelperInvoked);

        let output = wait_with_tick(
            child,
            self.config.poll_interval,
            self.config.drain_timeout,
            tick,
        )
            .map_err(|err| self.fail(format!("helper {}: {err}", path.display())))?;
        self.output = output;
        self.transition(BridgeState::OutputCaptured);
        Ok(())
    }

    /// Turns the captured output into a buffer. Empty output is a failure.
    pub fn finish(mut self) -> Result<RawAttributeBuffer, ProcessError> {
        if self.output.is_empty() {
            return Err(self.fail("helper produced no output"));
        }
        let output = std::mem::take(&mut self.output);
        let buffer = match self.kind {
            AttributeKind::WorkingDirectory => {
                let end = output
                    .iter()
                    .rposition(|&b| b != b'\r' && b != b'\n')
                    .map_or(0, |idx| idx + 1);
                RawAttributeBuffer::narrow(output[..end].to_vec(), BufferShape::Scalar)
            }
            AttributeKind::CommandLine | AttributeKind::Environment => {
                // NUL-terminated fields, then one closing NUL
                if output != b"\0" && !output.ends_with(b"\0\0") {
                    return Err(self.fail("truncated helper output"));
                }
                let mut fields = output;
                fields.pop();
                RawAttributeBuffer::narrow(fields, BufferShape::Delimited)
            }
        };
        self.transition(BridgeState::Done);
        Ok(buffer)
    }

    /// Resolve, materialize, invoke and finish in one go.
    pub fn run(mut self, tick: &mut dyn FnMut()) -> Result<RawAttributeBuffer, ProcessError> {
        self.materialize()?;
        self.invoke(tick)?;
        self.finish()
    }
}

fn write_helper(dir: &Path, path: &Path, payload: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(payload)?;
    file.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(0o755))?;
    }
    file.persist_noclobber(path).map_err(|err| err.error)?;
    Ok(())
}

/// Starts the helper, retrying while a just-written copy is still held open
/// for writing by a concurrently forked process.
fn spawn(command: &mut Command) -> io::Result<Child> {
    let mut attempts = 0;
    loop {
        match command.spawn() {
            #[cfg(unix)]
            Err(err) if err.raw_os_error() == Some(libc::ETXTBSY) && attempts < 5 => {
                attempts += 1;
                thread::sleep(Duration::from_millis(10));
            }
            result => return result,
        }
    }
}

/// Waits for `child` to exit while draining its stdout on a second thread.
///
/// Exit status is ignored: the output alone decides success. Once the child
/// is gone, the drain gets `drain_timeout` to see end of file; a pipe still
/// open after that is an error and the reader thread is left to finish alone.
pub fn wait_with_tick(
    mut child: Child,
    poll_interval: Duration,
    drain_timeout: Duration,
    tick: &mut dyn FnMut(),
) -> io::Result<Vec<u8>> {
    // No input is ever sent
    drop(child.stdin.take());

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout not captured"))?;
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut output = Vec::new();
        let _ = sender.send(stdout.read_to_end(&mut output).map(|_| output));
    });

    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                tick();
                thread::sleep(poll_interval);
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        }
    }

    match receiver.recv_timeout(drain_timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "stdout still open after exit",
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(io::Error::other("stdout reader panicked"))
        }
    }
}
