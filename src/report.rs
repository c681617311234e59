use tracing::{error, info, warn};

use crate::{
    io::display_path,
    pipeline::{Outcome, PlanEntry, RunResult},
    settings::Settings,
    types::format_seconds,
};

/// Log the summary of a finished run
pub fn log_summary(result: &RunResult, settings: &Settings) {
    let counts = &result.counts;

    info!("--- Summary ---");
    info!("Segments in manifest: {}", counts.tasks);
    info!("Resolved:             {}", counts.resolved);
    info!(
        "Downloaded:           {} ({} video(s) fetched, {} already cached)",
        counts.downloaded, counts.fetched, counts.cache_hits
    );
    info!("Cut:                  {}", counts.cut);
    info!("Joined:               {}", counts.joined);

    for dropped in &result.dropped {
        warn!(
            "Skipped #{} ({}) while {}: {}",
            dropped.ordinal, dropped.url, dropped.stage, dropped.error
        );
    }

    match &result.outcome {
        Outcome::Joined { output } => {
            info!("Final output: {}", display_path(output).display());
        }
        Outcome::NoSurvivors => warn!("Nothing to join, no output was written"),
        Outcome::Aborted(err) => match result.aborted_during() {
            Some(stage) => error!("Run aborted while {stage}: {err}"),
            None => error!("Run aborted: {err}"),
        },
    }

    info!(
        "Source videos are cached in {}",
        display_path(&settings.cache_dir).display()
    );
    if result.scratch_retained {
        info!(
            "Temporary segments kept in {}",
            display_path(&settings.temp_dir).display()
        );
    }
}

/// Log what a run would do
pub fn log_plan(entries: &[PlanEntry]) {
    info!("--- Plan ({} segment(s)) ---", entries.len());

    for entry in entries {
        match &entry.resolution {
            Ok(task) => info!(
                "#{} {} from {} for {}s ({})",
                entry.ordinal,
                task.video_id,
                task.start,
                task.duration(),
                if entry.cached { "cached" } else { "to download" }
            ),
            Err(err) => warn!("#{} {} would be skipped: {err}", entry.ordinal, entry.url),
        }
    }

    let runnable = entries.iter().filter(|e| e.resolution.is_ok()).count();
    let to_download = entries
        .iter()
        .filter(|e| e.resolution.is_ok() && !e.cached)
        .count();
    info!(
        "{runnable} segment(s) would be cut, totalling {}",
        format_seconds(
            entries
                .iter()
                .filter_map(|e| e.resolution.as_ref().ok())
                .map(|task| task.duration())
                .sum()
        )
    );
    info!("{to_download} segment(s) need a download");
}
