use std::{fmt::Debug, path::Path, time::Duration};

use super::{
    command::{Capture, CommandRunner, Invocation, ToolCommand},
    paths::PathTranslator,
    probe::ToolSpec,
};
use crate::result::ToolError;

/// Interface for downloading streams
pub trait StreamDownloader: Sync + Debug {
    /// Download the stream of the video at `url` into `output`,
    /// in the single encoding this downloader is configured for.
    fn download(&self, url: &str, output: &Path) -> Result<(), ToolError>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
#[derive(Debug)]
pub struct Ytdl<'a> {
    runner: &'a dyn CommandRunner,
    paths: &'a dyn PathTranslator,
    command: ToolCommand,
    format: String,
    timeout: Option<Duration>,
}

impl<'a> Ytdl<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        paths: &'a dyn PathTranslator,
        command: ToolCommand,
        format: &str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            paths,
            command,
            format: format.to_string(),
            timeout,
        }
    }

    /// How to verify that the downloader is reachable
    pub fn tool_spec(command: &ToolCommand) -> ToolSpec {
        ToolSpec {
            name: format!("yt-dlp ({command})"),
            check: command.invocation().arg("--version"),
        }
    }

    fn download_invocation(&self, url: &str, output: &Path) -> Invocation {
        self.command
            .invocation()
            .arg("-q")
            .arg("--no-warnings")
            .arg("--no-continue") // Or else fails when file already exists, even an empty one
            .arg("--force-overwrites")
            .args(["-f", self.format.as_str()])
            .arg("-o")
            .arg(self.paths.to_tool(output))
            .arg("--")
            .arg(url)
            .capture(Capture::STDERR)
            .timeout(self.timeout)
    }
}

impl StreamDownloader for Ytdl<'_> {
    fn download(&self, url: &str, output: &Path) -> Result<(), ToolError> {
        let inv = self.download_invocation(url, output);
        let res = self.runner.run(&inv)?;

        if res.success {
            return Ok(());
        }

        let stderr = res.stderr_lossy();
        let program = self.command.to_string();
        if is_unavailable(&stderr) {
            Err(ToolError::Unavailable { program, stderr })
        } else {
            Err(ToolError::Failed {
                program,
                code: res.code,
                stderr,
            })
        }
    }
}

/// Whether the downloader said the video cannot be fetched at all
/// (private, removed, region locked, ...)
fn is_unavailable(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"))
}
