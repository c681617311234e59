use std::{io, path::PathBuf, sync::Arc, time::Duration};

use miette::Diagnostic;
use thiserror::Error;

/// Errors that abort the whole run.
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error("Required tool(s) not reachable: {}", .tools.join(", "))]
    #[diagnostic(
        code(medley::missing_dependency),
        help("Install the tools or point `downloader`/`transcoder` in medley.toml to a working command")
    )]
    MissingDependency { tools: Vec<String> },

    #[error("Could not read the input manifest {}", .path.display())]
    #[diagnostic(code(medley::unreadable_input))]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid input manifest {}", .path.display())]
    #[diagnostic(
        code(medley::malformed_input),
        help("The manifest must be a JSON array of objects with `url`, `startTime` and `endTime`")
    )]
    MalformedInput {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("Could not prepare directory {}", .path.display())]
    #[diagnostic(code(medley::prepare_directory))]
    PrepareDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to join the segments")]
    #[diagnostic(code(medley::concatenation_failed))]
    ConcatenationFailed {
        #[source]
        source: ToolError,
    },

    #[error("Joined the segments but could not move the result to {}", .path.display())]
    #[diagnostic(code(medley::finalize_output))]
    FinalizeOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    /// The stderr of the external tool that caused the failure, if any
    pub fn tool_stderr(&self) -> Option<&str> {
        match self {
            RunError::ConcatenationFailed { source } => source.stderr(),
            _ => None,
        }
    }
}

/// Structural problems of the input manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("the top-level value is not an array")]
    NotAnArray,

    #[error("element {index} is not an object")]
    NotAnObject { index: usize },

    #[error("element {index} has no usable `{field}` (expected a non-empty string)")]
    MissingField { index: usize, field: &'static str },
}

/// Errors that only drop the task they belong to.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("Could not extract a video ID from URL {url}")]
    UnresolvableUrl { url: String },

    #[error("Invalid timecode '{raw}'. Expected HH:MM:SS, MM:SS, or SS")]
    InvalidTimecode { raw: String },

    #[error("End time ({end}) must be after start time ({start})")]
    NonPositiveDuration { start: String, end: String },

    #[error("Failed to download video {video_id}")]
    DownloadFailed {
        video_id: String,
        #[source]
        source: ToolError,
    },

    #[error("Failed to cut segment of video {video_id}")]
    CutFailed {
        video_id: String,
        #[source]
        source: ToolError,
    },
}

impl TaskError {
    /// The stderr of the external tool that caused the failure, if any
    pub fn tool_stderr(&self) -> Option<&str> {
        match self {
            TaskError::DownloadFailed { source, .. } | TaskError::CutFailed { source, .. } => {
                source.stderr()
            }
            _ => None,
        }
    }
}

/// Failure of a single external tool invocation.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Could not run {program}")]
    Spawn {
        program: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("{program} did run but was not successful (exit code {})", .code.map_or("none".to_string(), |c| c.to_string()))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} reports the stream as unavailable")]
    Unavailable { program: String, stderr: String },

    #[error("{program} did not finish within {}s and was killed", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("{program} reported success but produced no output at {}", .path.display())]
    NoOutput { program: String, path: PathBuf },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ToolError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            ToolError::Failed { stderr, .. } | ToolError::Unavailable { stderr, .. } => {
                Some(stderr.as_str()).filter(|s| !s.trim().is_empty())
            }
            _ => None,
        }
    }
}

pub type Result<T> = miette::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dependency_lists_every_tool() {
        let err = RunError::MissingDependency {
            tools: vec!["yt-dlp".to_string(), "ffmpeg".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Required tool(s) not reachable: yt-dlp, ffmpeg"
        );
    }

    #[test]
    fn stderr_is_only_exposed_when_not_blank() {
        let failed = ToolError::Failed {
            program: "ffmpeg".to_string(),
            code: Some(1),
            stderr: "moov atom not found".to_string(),
        };
        assert_eq!(failed.stderr(), Some("moov atom not found"));

        let blank = ToolError::Failed {
            program: "ffmpeg".to_string(),
            code: None,
            stderr: "  \n".to_string(),
        };
        assert_eq!(blank.stderr(), None);
        assert!(blank.to_string().contains("exit code none"));

        let cut = TaskError::CutFailed {
            video_id: "dQw4w9WgXcQ".to_string(),
            source: failed,
        };
        assert_eq!(cut.tool_stderr(), Some("moov atom not found"));
    }
}
