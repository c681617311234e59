use std::{fmt::Debug, path::Path, time::Duration};

use super::{
    command::{assert_success, Capture, CommandRunner, ToolCommand, FFXXX_DEFAULT_ARGS},
    paths::PathTranslator,
    probe::ToolSpec,
};
use crate::{result::ToolError, types::format_seconds};

pub trait StreamTransformer: Sync + Debug {
    /// Copy `duration` seconds of the input streams, starting at `start`,
    /// to the output file without re-encoding them.
    fn extract_clip(
        &self,
        input: &Path,
        output: &Path,
        start: u64,
        duration: u64,
    ) -> Result<(), ToolError>;

    /// Join the files listed in the concat list into the output file.
    ///
    /// Video streams are copied, audio streams are re-encoded to AAC so that
    /// clips coming from different sources still give a playable file.
    fn concat(&self, list: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg<'a> {
    runner: &'a dyn CommandRunner,
    paths: &'a dyn PathTranslator,
    command: ToolCommand,
    timeout: Option<Duration>,
}

impl<'a> Ffmpeg<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        paths: &'a dyn PathTranslator,
        command: ToolCommand,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            runner,
            paths,
            command,
            timeout,
        }
    }

    /// How to verify that the `ffmpeg` binary is reachable
    pub fn tool_spec(command: &ToolCommand) -> ToolSpec {
        ToolSpec {
            name: format!("ffmpeg ({command})"),
            check: command.invocation().arg("-version"),
        }
    }

    fn with_program_name(&self, err: ToolError) -> ToolError {
        match err {
            ToolError::Failed { code, stderr, .. } => ToolError::Failed {
                program: self.command.to_string(),
                code,
                stderr,
            },
            err => err,
        }
    }
}

impl StreamTransformer for Ffmpeg<'_> {
    fn extract_clip(
        &self,
        input: &Path,
        output: &Path,
        start: u64,
        duration: u64,
    ) -> Result<(), ToolError> {
        let inv = self
            .command
            .invocation()
            .args(FFXXX_DEFAULT_ARGS)
            .arg("-y")
            .args(["-ss", &format_seconds(start)])
            .arg("-i")
            .arg(self.paths.to_tool(input))
            .args(["-t", &duration.to_string()])
            .args(["-c", "copy"])
            .arg(self.paths.to_tool(output))
            .capture(Capture::STDERR)
            .timeout(self.timeout);

        assert_success(self.runner, &inv)
            .map(drop)
            .map_err(|err| self.with_program_name(err))
    }

    fn concat(&self, list: &Path, output: &Path) -> Result<(), ToolError> {
        let inv = self
            .command
            .invocation()
            .args(FFXXX_DEFAULT_ARGS)
            .arg("-y")
            .args(["-f", "concat"])
            // The list holds plain file names, resolved next to the list itself
            .args(["-safe", "0"])
            .arg("-i")
            .arg(self.paths.to_tool(list))
            .args(["-c:v", "copy"])
            .args(["-c:a", "aac"])
            .arg(self.paths.to_tool(output))
            .capture(Capture::STDERR)
            .timeout(self.timeout);

        assert_success(self.runner, &inv)
            .map(drop)
            .map_err(|err| self.with_program_name(err))
    }
}
