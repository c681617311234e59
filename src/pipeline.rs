use std::{
    collections::HashMap,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    thread,
};

use tracing::{debug, info, warn};

use crate::{
    cache::{entry_path, CacheStatus, CachedVideo, VideoCache},
    clipper::cut_segment,
    io::{display_path, ensure_dir, ensure_empty_dir},
    joiner::concatenate,
    outside::{probe, CommandRunner, Ffmpeg, PathTranslator, StreamTransformer, Ytdl},
    result::{RunError, TaskError},
    settings::Settings,
    types::{parse_manifest, ResolvedTask, Task, VideoId},
};

/// Steps of a run, in the order they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probing,
    PreparingDirs,
    ParsingInput,
    Downloading,
    Cutting,
    Joining,
    CleaningUp,
    Done,
    Aborted,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Probing => "probing",
            Stage::PreparingDirs => "preparing directories",
            Stage::ParsingInput => "parsing input",
            Stage::Downloading => "downloading",
            Stage::Cutting => "cutting",
            Stage::Joining => "joining",
            Stage::CleaningUp => "cleaning up",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Survivors after each stage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageCounts {
    /// Tasks in the input manifest
    pub tasks: usize,
    /// Tasks with a video ID and a valid time range
    pub resolved: usize,
    /// Tasks whose source video is in the cache
    pub downloaded: usize,
    /// Distinct videos downloaded during the run
    pub fetched: usize,
    /// Distinct videos that were already in the cache
    pub cache_hits: usize,
    pub cut: usize,
    /// 1 once the joined video is at the output path
    pub joined: usize,
}

/// A task that was excluded from the rest of the run
#[derive(Debug, Clone)]
pub struct DroppedTask {
    pub ordinal: usize,
    pub url: String,
    pub stage: Stage,
    pub error: TaskError,
}

#[derive(Debug)]
pub enum Outcome {
    Joined { output: PathBuf },
    /// Every task was dropped, nothing was written
    NoSurvivors,
    Aborted(RunError),
}

#[derive(Debug)]
pub struct RunResult {
    /// Every stage entered, in order
    pub stages: Vec<Stage>,
    pub counts: StageCounts,
    pub dropped: Vec<DroppedTask>,
    pub scratch_retained: bool,
    pub outcome: Outcome,
}

impl RunResult {
    /// Process exit status: a run without survivors is still a success
    pub fn exit_status(&self) -> u8 {
        match self.outcome {
            Outcome::Joined { .. } | Outcome::NoSurvivors => 0,
            Outcome::Aborted(_) => 1,
        }
    }

    /// The stage that failed, for an aborted run.
    ///
    /// Cleanup also runs after a failed join, so it is skipped over.
    pub fn aborted_during(&self) -> Option<Stage> {
        if !matches!(self.outcome, Outcome::Aborted(_)) {
            return None;
        }

        self.stages
            .iter()
            .rev()
            .find(|stage| !matches!(stage, Stage::Aborted | Stage::CleaningUp))
            .copied()
    }
}

/// Drive a whole run: probe the tools, prepare the directories, read the manifest,
/// then download, cut and join the segments.
#[derive(Debug)]
pub struct Pipeline<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    paths: &'a dyn PathTranslator,
    stages: Vec<Stage>,
    counts: StageCounts,
    dropped: Vec<DroppedTask>,
    scratch_retained: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        paths: &'a dyn PathTranslator,
    ) -> Self {
        Self {
            settings,
            runner,
            paths,
            stages: Vec::new(),
            counts: StageCounts::default(),
            dropped: Vec::new(),
            scratch_retained: false,
        }
    }

    pub fn run(mut self) -> RunResult {
        let outcome = match self.execute() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.enter(Stage::Aborted);
                Outcome::Aborted(err)
            }
        };

        RunResult {
            stages: self.stages,
            counts: self.counts,
            dropped: self.dropped,
            scratch_retained: self.scratch_retained,
            outcome,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Stage: {stage}");
        self.stages.push(stage);
    }

    fn execute(&mut self) -> Result<Outcome, RunError> {
        let settings = self.settings;

        self.enter(Stage::Probing);
        self.check_dependencies()?;

        self.enter(Stage::PreparingDirs);
        prepare_dirs(settings)?;

        self.enter(Stage::ParsingInput);
        let tasks = read_manifest(&settings.input)?;
        self.counts.tasks = tasks.len();
        info!(
            "Read {} segment(s) from {}",
            tasks.len(),
            settings.input.display()
        );

        let ytdl = Ytdl::new(
            self.runner,
            self.paths,
            settings.downloader.clone(),
            &settings.format,
            settings.timeout,
        );
        let ffmpeg = Ffmpeg::new(
            self.runner,
            self.paths,
            settings.transcoder.clone(),
            settings.timeout,
        );
        let cache = VideoCache::new(&settings.cache_dir, &settings.quality_tag, &ytdl);

        self.enter(Stage::Downloading);
        let downloaded = self.download_all(&cache, &tasks);

        self.enter(Stage::Cutting);
        let clips = self.cut_all(&ffmpeg, &downloaded);

        if clips.is_empty() {
            warn!("No segments were successfully cut, nothing to join");
            self.enter(Stage::CleaningUp);
            self.clean_up();
            self.enter(Stage::Done);
            return Ok(Outcome::NoSurvivors);
        }

        self.enter(Stage::Joining);
        let joined = concatenate(&ffmpeg, &clips, &settings.temp_dir, &settings.output);
        if let Some(stderr) = joined.as_ref().err().and_then(RunError::tool_stderr) {
            debug!("Transcoder output:\n{}", stderr.trim_end());
        }

        // Scratch is handled the same way whether the join worked or not
        self.enter(Stage::CleaningUp);
        self.clean_up();

        let output = joined?;
        self.counts.joined = 1;
        self.enter(Stage::Done);
        Ok(Outcome::Joined { output })
    }

    fn check_dependencies(&self) -> Result<(), RunError> {
        info!("Checking for dependencies...");
        let specs = [
            Ytdl::tool_spec(&self.settings.downloader),
            Ffmpeg::tool_spec(&self.settings.transcoder),
        ];

        let report = probe(self.runner, &specs);
        if report.all_present() {
            Ok(())
        } else {
            Err(RunError::MissingDependency {
                tools: report.missing,
            })
        }
    }

    /// Resolve every task then make sure their source videos are cached.
    ///
    /// Returns the surviving tasks, in manifest order, with the path of their source video.
    fn download_all(
        &mut self,
        cache: &VideoCache<'_>,
        tasks: &[Task],
    ) -> Vec<(ResolvedTask, PathBuf)> {
        let mut resolved = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.resolve() {
                Ok(task) => resolved.push(task),
                Err(err) => self.drop_task(task.ordinal, &task.url, Stage::Downloading, err),
            }
        }
        self.counts.resolved = resolved.len();

        // Each distinct video once, in order of first appearance
        let mut wanted: Vec<(VideoId, String)> = Vec::new();
        for task in &resolved {
            if !wanted.iter().any(|(id, _)| *id == task.video_id) {
                wanted.push((task.video_id.clone(), task.url.clone()));
            }
        }

        let videos = self.fetch_videos(cache, &wanted);
        for video in videos.values().flatten() {
            match video.status {
                CacheStatus::Hit => self.counts.cache_hits += 1,
                CacheStatus::Fetched => self.counts.fetched += 1,
            }
        }

        let mut survivors = Vec::with_capacity(resolved.len());
        for task in resolved {
            match videos.get(&task.video_id) {
                Some(Ok(video)) => {
                    let path = video.path.clone();
                    survivors.push((task, path));
                }
                Some(Err(err)) => {
                    let err = err.clone();
                    self.drop_task(task.ordinal, &task.url, Stage::Downloading, err);
                }
                None => unreachable!("no download attempted for {}", task.video_id),
            }
        }
        self.counts.downloaded = survivors.len();
        survivors
    }

    /// Make sure every wanted video is cached, with up to `jobs` downloads at once.
    ///
    /// There is one result per wanted video.
    fn fetch_videos(
        &self,
        cache: &VideoCache<'_>,
        wanted: &[(VideoId, String)],
    ) -> HashMap<VideoId, Result<CachedVideo, TaskError>> {
        let jobs = self.settings.jobs.min(wanted.len());
        let mut results = HashMap::with_capacity(wanted.len());

        if jobs > 1 {
            debug!("Downloading {} videos with {jobs} workers", wanted.len());
            let (send_work, receive_work) = crossbeam_channel::unbounded();
            let (send_done, receive_done) = crossbeam_channel::unbounded();

            for item in wanted {
                // Cannot fail, the receiver is still alive
                let _ = send_work.send(item);
            }
            drop(send_work);

            thread::scope(|scope| {
                for n in 0..jobs {
                    let receive_work = receive_work.clone();
                    let send_done = send_done.clone();
                    let spawned = thread::Builder::new()
                        .name(format!("download-{n}"))
                        .spawn_scoped(scope, move || {
                            for (id, url) in receive_work {
                                let res = cache.ensure_cached(id, url);
                                if send_done.send((id.clone(), res)).is_err() {
                                    break;
                                }
                            }
                        });

                    if let Err(err) = spawned {
                        warn!("Could not start download worker {n}: {err}");
                    }
                }
            });

            results.extend(receive_done.try_iter());
        }

        // Sequential mode, or what the workers could not take
        for (id, url) in wanted {
            if !results.contains_key(id) {
                let res = cache.ensure_cached(id, url);
                results.insert(id.clone(), res);
            }
        }

        results
    }

    /// Cut the segments in manifest order. Returns the clips of the surviving tasks.
    fn cut_all(
        &mut self,
        transformer: &dyn StreamTransformer,
        downloaded: &[(ResolvedTask, PathBuf)],
    ) -> Vec<PathBuf> {
        let settings = self.settings;
        let temp_dir = &settings.temp_dir;

        let mut clips = Vec::with_capacity(downloaded.len());
        for (task, source) in downloaded {
            match cut_segment(transformer, task, source, temp_dir) {
                Ok(clip) => clips.push(clip),
                Err(err) => self.drop_task(task.ordinal, &task.url, Stage::Cutting, err),
            }
        }
        self.counts.cut = clips.len();
        clips
    }

    fn clean_up(&mut self) {
        let settings = self.settings;
        let temp_dir = &settings.temp_dir;

        if settings.keep_scratch() {
            info!(
                "Verbose mode: temporary segment files retained in {}",
                display_path(temp_dir).display()
            );
            self.scratch_retained = true;
            return;
        }

        debug!("Removing temporary directory {}", temp_dir.display());
        if let Err(err) = fs::remove_dir_all(temp_dir) {
            warn!(
                "Error cleaning up temporary directory {}: {err}",
                temp_dir.display()
            );
            self.scratch_retained = temp_dir.exists();
        }
    }

    fn drop_task(&mut self, ordinal: usize, url: &str, stage: Stage, error: TaskError) {
        warn!("Skipping segment #{ordinal} ({url}): {error}");
        if let Some(stderr) = error.tool_stderr() {
            debug!("Tool output for segment #{ordinal}:\n{}", stderr.trim_end());
        }

        self.dropped.push(DroppedTask {
            ordinal,
            url: url.to_string(),
            stage,
            error,
        });
    }
}

/// The cache directory is kept, the scratch directory starts empty
fn prepare_dirs(settings: &Settings) -> Result<(), RunError> {
    let failed = |path: &Path| {
        let path = path.to_path_buf();
        move |source| RunError::PrepareDirectory { path, source }
    };

    ensure_dir(&settings.cache_dir).map_err(failed(&settings.cache_dir))?;
    ensure_empty_dir(&settings.temp_dir).map_err(failed(&settings.temp_dir))?;

    debug!("Cache directory: {}", settings.cache_dir.display());
    debug!("Temporary directory: {}", settings.temp_dir.display());
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<Task>, RunError> {
    let text = fs::read_to_string(path).map_err(|source| RunError::UnreadableInput {
        path: path.to_path_buf(),
        source,
    })?;

    parse_manifest(&text).map_err(|source| RunError::MalformedInput {
        path: path.to_path_buf(),
        source,
    })
}

/// What a run would do with one task
#[derive(Debug)]
pub struct PlanEntry {
    pub ordinal: usize,
    pub url: String,
    pub resolution: Result<ResolvedTask, TaskError>,
    /// Whether the source video is already cached
    pub cached: bool,
}

/// Read and resolve the manifest without running any tool or touching any directory.
pub fn plan(settings: &Settings) -> Result<Vec<PlanEntry>, RunError> {
    let tasks = read_manifest(&settings.input)?;

    Ok(tasks
        .iter()
        .map(|task| {
            let resolution = task.resolve();
            let cached = resolution.as_ref().is_ok_and(|resolved| {
                entry_path(&settings.cache_dir, &settings.quality_tag, &resolved.video_id)
                    .is_file()
            });

            PlanEntry {
                ordinal: task.ordinal,
                url: task.url.clone(),
                resolution,
                cached,
            }
        })
        .collect())
}
