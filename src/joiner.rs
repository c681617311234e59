use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    io::{extension_or, move_file},
    outside::StreamTransformer,
    result::{RunError, ToolError},
};

pub const MANIFEST_NAME: &str = "concat_list.txt";

/// Name of the joined file while it is still in the scratch directory
const STAGED_STEM: &str = "joined";

/// One `file '<name>'` line per clip, in order.
///
/// Names are relative: the transcoder resolves them next to the manifest.
pub fn manifest_contents(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|clip| {
            let name = clip
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| clip.to_string_lossy().into_owned());
            // Quoting rules of the concat demuxer: close, escaped quote, reopen
            format!("file '{}'", name.replace('\'', r"'\''"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_manifest(clips: &[PathBuf], temp_dir: &Path) -> Result<PathBuf, ToolError> {
    let path = temp_dir.join(MANIFEST_NAME);
    fs::write(&path, manifest_contents(clips)).map_err(|err| ToolError::io(&path, err))?;
    Ok(path)
}

/// Join the clips, in order, into `output`.
///
/// The transcoder writes into the scratch directory, then the file is moved to `output`.
/// `clips` must not be empty.
pub fn concatenate(
    transformer: &dyn StreamTransformer,
    clips: &[PathBuf],
    temp_dir: &Path,
    output: &Path,
) -> Result<PathBuf, RunError> {
    debug_assert!(!clips.is_empty(), "nothing to join");
    info!("Joining {} segments...", clips.len());

    let failed = |source| RunError::ConcatenationFailed { source };

    let list = write_manifest(clips, temp_dir).map_err(failed)?;
    debug!("Concat list written to {}", list.display());

    let staged = temp_dir.join(format!("{STAGED_STEM}.{}", extension_or(output, "mp4")));
    transformer.concat(&list, &staged).map_err(failed)?;

    if !staged.is_file() {
        return Err(failed(ToolError::NoOutput {
            program: "transcoder".to_string(),
            path: staged,
        }));
    }

    move_file(&staged, output).map_err(|source| RunError::FinalizeOutput {
        path: output.to_path_buf(),
        source,
    })?;

    info!("All segments successfully merged into {}", output.display());
    Ok(output.to_path_buf())
}
