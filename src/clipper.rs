use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    outside::StreamTransformer,
    result::{TaskError, ToolError},
    types::{ResolvedTask, VideoId},
};

/// Scratch file name of a clip.
///
/// The ordinal is zero-padded so that the lexical order of the names is the task order.
pub fn clip_file_name(ordinal: usize, id: &VideoId) -> String {
    format!("segment_{ordinal:04}_{id}.mp4")
}

/// Cut the task's time range out of the cached source video into the scratch directory.
pub fn cut_segment(
    transformer: &dyn StreamTransformer,
    task: &ResolvedTask,
    source: &Path,
    temp_dir: &Path,
) -> Result<PathBuf, TaskError> {
    let output = temp_dir.join(clip_file_name(task.ordinal, &task.video_id));

    debug!(
        "Cutting {} ({} - {}) into {}",
        task.video_id,
        task.start,
        task.end,
        output.display()
    );

    let failed = |source| TaskError::CutFailed {
        video_id: task.video_id.to_string(),
        source,
    };

    transformer
        .extract_clip(source, &output, task.start.seconds(), task.duration())
        .map_err(failed)?;

    // Some containers only fail at the muxing step while still exiting with 0
    if !output.is_file() {
        return Err(failed(ToolError::NoOutput {
            program: "transcoder".to_string(),
            path: output,
        }));
    }

    info!("Segment for {} saved to {}", task.video_id, output.display());
    Ok(output)
}
