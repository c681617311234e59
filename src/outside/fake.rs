//! Scripted stand-in for the downloader and the transcoder.

use std::{
    ffi::OsString,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::result::ToolError;

use super::command::{CommandRunner, Invocation, ProcessOutput};

/// Records every invocation and simulates the tools by writing the files they would produce:
/// - a downloader call (`-o <path>`) writes a fake video at `<path>`
/// - a cut (`-ss ... -i <input> ... <output>`) writes `cut <input file name>` at `<output>`
/// - a concat (`-f concat -i <list> ... <output>`) copies the list file content to `<output>`
#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    failing: Vec<String>,
    missing: Vec<String>,
    timing_out: Vec<String>,
    empty_downloads: bool,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation whose command line contains `needle` exit with status 1
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    /// Make every invocation whose command line contains `needle` impossible to spawn
    pub fn missing(mut self, needle: &str) -> Self {
        self.missing.push(needle.to_string());
        self
    }

    /// Make every invocation whose command line contains `needle` hit its time limit
    pub fn timing_out_on(mut self, needle: &str) -> Self {
        self.timing_out.push(needle.to_string());
        self
    }

    /// Make the downloader succeed without writing anything
    pub fn with_empty_downloads(mut self) -> Self {
        self.empty_downloads = true;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations whose command line contains `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|inv| inv.to_string().contains(needle))
            .count()
    }

    fn simulate(&self, inv: &Invocation) -> io::Result<()> {
        let args = &inv.args;
        let value_after = |flag: &str| -> Option<PathBuf> {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .map(PathBuf::from)
        };
        let has = |flag: &str| args.iter().any(|a| a == flag);
        let last = args.last().map(PathBuf::from);

        if has("-version") || has("--version") {
            return Ok(());
        }

        if let Some(out) = value_after("-o") {
            if !self.empty_downloads {
                std::fs::write(out, b"fake video")?;
            }
        } else if has("concat") {
            let list = value_after("-i").unwrap_or_default();
            let out = last.unwrap_or_default();
            std::fs::write(out, std::fs::read(list)?)?;
        } else if has("-ss") {
            let input = value_after("-i").unwrap_or_default();
            let name = input.file_name().map(OsString::from).unwrap_or_default();
            let out = last.unwrap_or_default();
            std::fs::write(out, format!("cut {}", name.to_string_lossy()))?;
        }

        Ok(())
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let line = invocation.to_string();

        if self.missing.iter().any(|n| line.contains(n.as_str())) {
            return Err(ToolError::Spawn {
                program: invocation.program_name(),
                source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
            });
        }

        if self.timing_out.iter().any(|n| line.contains(n.as_str())) {
            return Err(ToolError::TimedOut {
                program: invocation.program_name(),
                after: invocation.timeout.unwrap_or(Duration::from_secs(1800)),
            });
        }

        if self.failing.iter().any(|n| line.contains(n.as_str())) {
            return Ok(ProcessOutput {
                success: false,
                code: Some(1),
                stdout: Vec::new(),
                stderr: b"scripted failure".to_vec(),
            });
        }

        self.simulate(invocation)
            .map_err(|err| ToolError::io(invocation.program_name(), err))?;

        Ok(ProcessOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        })
    }
}
