use std::{
    ffi::{OsStr, OsString},
    fmt::{Debug, Display},
    io::Read,
    process::{Child, Command, ExitStatus, Stdio},
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use bitflags::bitflags;
use tracing::{debug, trace, Level};

use crate::result::ToolError;

pub const FFXXX_DEFAULT_ARGS: [&str; 3] = ["-hide_banner", "-loglevel", "error"];

/// How often a bounded wait checks whether the child has exited
const POLL_INTERVAL: Duration = Duration::from_millis(50);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capture: u8 {
        const STDOUT = 0b0000001;
        const STDERR = 0b0000010;
    }
}

/// The base command used to reach an external tool, before any tool-specific argument.
///
/// Either the tool itself (`["ffmpeg"]`) or a wrapper running it somewhere else
/// (`["docker", "compose", "exec", "ffmpeg", "ffmpeg"]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Build from a command vector. Return None if it is empty.
    pub fn from_parts(mut parts: Vec<String>) -> Option<Self> {
        if parts.is_empty() || parts[0].trim().is_empty() {
            return None;
        }
        let program = parts.remove(0);
        Some(Self {
            program,
            args: parts,
        })
    }

    #[cfg(test)]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    /// Start an invocation of this command
    pub fn invocation(&self) -> Invocation {
        Invocation {
            program: OsString::from(&self.program),
            args: self.args.iter().map(OsString::from).collect(),
            capture: Capture::empty(),
            timeout: None,
        }
    }
}

impl Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A fully described external program call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub capture: Capture,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.capture = capture;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// What is left of a finished program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    fn from_status(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
            stdout,
            stderr,
        }
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Capability to run external programs.
///
/// Implementations return an error only if the program could not be run
/// to completion. A program that ran but returned a non-0 status code
/// is reported through [`ProcessOutput::success`].
pub trait CommandRunner: Sync + Debug {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ToolError>;
}

/// Run the invocation and verify that it has returned a success status code.
pub fn assert_success(
    runner: &dyn CommandRunner,
    invocation: &Invocation,
) -> Result<ProcessOutput, ToolError> {
    let res = runner.run(invocation)?;
    if res.success {
        Ok(res)
    } else {
        Err(ToolError::Failed {
            program: invocation.program_name(),
            code: res.code,
            stderr: res.stderr_lossy(),
        })
    }
}

/// Runs programs on the host with [`std::process::Command`]
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    /// IO handles will be captured only if the caller required it or if the log level is Debug.
    /// In that last case, `stdout` and `stderr` will be logged.
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ToolError> {
        let is_debug = tracing::enabled!(Level::DEBUG);
        let get_io = |capture| {
            if capture {
                Stdio::piped()
            } else {
                Stdio::null()
            }
        };

        let program = invocation.program_name();
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(get_io(
                is_debug || invocation.capture.contains(Capture::STDOUT),
            ))
            .stderr(get_io(
                is_debug || invocation.capture.contains(Capture::STDERR),
            ));

        debug!("Executing command: {invocation}");
        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source: Arc::new(source),
        })?;

        // Drain the pipes while waiting, or a chatty child blocks on a full pipe
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match invocation.timeout {
            Some(limit) => wait_with_deadline(&mut child, &program, limit)?,
            None => child.wait().map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source: Arc::new(source),
            })?,
        };

        let collect = |handle: Option<JoinHandle<Vec<u8>>>| {
            handle
                .map(|h| h.join().unwrap_or_default())
                .unwrap_or_default()
        };
        let res = ProcessOutput::from_status(status, collect(stdout), collect(stderr));

        if is_debug {
            debug!("status: {status}");
            debug!("stdout: {} bytes long", res.stdout.len());
            trace!("stdout: {:?}", String::from_utf8_lossy(&res.stdout));
            debug!("stderr: {} bytes long", res.stderr.len());
            trace!("stderr: {:?}", String::from_utf8_lossy(&res.stderr));
        }

        Ok(res)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error only truncates the diagnostic output
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Wait for the child to exit, killing it once `limit` has elapsed
fn wait_with_deadline(
    child: &mut Child,
    program: &str,
    limit: Duration,
) -> Result<ExitStatus, ToolError> {
    let start = Instant::now();
    loop {
        let polled = child.try_wait().map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source: Arc::new(source),
        })?;
        if let Some(status) = polled {
            return Ok(status);
        }

        if start.elapsed() >= limit {
            debug!("{program} exceeded {}s, killing it", limit.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program: program.to_string(),
                after: limit,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
