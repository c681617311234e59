use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use miette::{miette, Context, IntoDiagnostic};
use serde::Deserialize;

use crate::{
    cli::Args,
    outside::{Identity, PathTranslator, PrefixMap, ToolCommand},
    result::Result,
};

/// Settings file read when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "medley.toml";

const DEFAULT_CACHE_DIR: &str = "media/.youtube_cache";
const DEFAULT_TEMP_DIR: &str = "media/.temp_segments";

/// yt-dlp format 18: 360p mp4 with audio
const DEFAULT_FORMAT: &str = "18";
const DEFAULT_QUALITY_TAG: &str = "360p";
const DEFAULT_TIMEOUT_SECS: i64 = 30 * 60;

/// The tools see `host_root` mounted as `tool_root`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathMapping {
    pub host_root: PathBuf,
    pub tool_root: PathBuf,
}

/// What the settings file (and `MEDLEY_*` variables) may contain
#[derive(Debug, Deserialize)]
struct FileSettings {
    downloader: Vec<String>,
    transcoder: Vec<String>,
    format: String,
    quality_tag: String,
    timeout_secs: u64,
    jobs: usize,
    cache_dir: PathBuf,
    temp_dir: PathBuf,
    #[serde(default)]
    paths: Option<PathMapping>,
}

/// Everything a run needs to know, after merging the defaults, the settings file,
/// the environment and the command line (in increasing priority).
#[derive(Debug, Clone)]
pub struct Settings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub cache_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub verbose: u8,
    pub dry_run: bool,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub format: String,
    pub quality_tag: String,
    pub downloader: ToolCommand,
    pub transcoder: ToolCommand,
    pub paths: Option<PathMapping>,
}

impl Settings {
    pub fn load(args: Args) -> Result<Self> {
        let file = read_file_settings(args.config.as_deref())?;
        Self::merge(args, file)
    }

    fn merge(args: Args, file: FileSettings) -> Result<Self> {
        let downloader = ToolCommand::from_parts(file.downloader)
            .ok_or_else(|| miette!("`downloader` must name at least a program"))?;
        let transcoder = ToolCommand::from_parts(file.transcoder)
            .ok_or_else(|| miette!("`transcoder` must name at least a program"))?;

        // The tag ends up in a file name
        let tag_is_valid = !file.quality_tag.is_empty()
            && file
                .quality_tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !tag_is_valid {
            return Err(miette!(
                "`quality_tag` must be made of letters, digits, '-' or '_', got '{}'",
                file.quality_tag
            ));
        }

        let timeout_secs = args.timeout.unwrap_or(file.timeout_secs);

        let settings = Self {
            input: args.input,
            output: args.output,
            cache_dir: args.cache_dir.unwrap_or(file.cache_dir),
            temp_dir: args.temp_dir.unwrap_or(file.temp_dir),
            verbose: args.verbose,
            dry_run: args.dry_run,
            jobs: args.jobs.map_or(file.jobs, usize::from).max(1),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            format: file.format,
            quality_tag: file.quality_tag,
            downloader,
            transcoder,
            paths: file.paths,
        };
        settings.check_layout()?;
        Ok(settings)
    }

    /// The scratch directory is emptied then removed by a run:
    /// it must not hold the cache, the input or the output.
    fn check_layout(&self) -> Result<()> {
        let absolute = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
        let temp_dir = absolute(&self.temp_dir);

        if absolute(&self.cache_dir).starts_with(&temp_dir) {
            return Err(miette!(
                "The temporary directory {} must not be or contain the cache directory {}",
                self.temp_dir.display(),
                self.cache_dir.display()
            ));
        }
        for (what, path) in [("input", &self.input), ("output", &self.output)] {
            if absolute(path).starts_with(&temp_dir) {
                return Err(miette!(
                    "The {what} {} must not be inside the temporary directory {}",
                    path.display(),
                    temp_dir.display()
                ));
            }
        }
        Ok(())
    }

    /// Scratch files are kept for inspection in verbose mode
    pub fn keep_scratch(&self) -> bool {
        self.verbose > 0
    }

    pub fn path_translator(&self) -> Result<Box<dyn PathTranslator>> {
        Ok(match &self.paths {
            Some(mapping) => Box::new(
                PrefixMap::new(&mapping.host_root, &mapping.tool_root)
                    .into_diagnostic()
                    .wrap_err("Could not resolve `paths.host_root`")?,
            ),
            None => Box::new(Identity),
        })
    }
}

fn read_file_settings(path: Option<&Path>) -> Result<FileSettings> {
    let file = match path {
        Some(path) => File::from(path).format(FileFormat::Toml).required(true),
        None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
    };

    Config::builder()
        .set_default("downloader", vec!["yt-dlp"])
        .and_then(|b| b.set_default("transcoder", vec!["ffmpeg"]))
        .and_then(|b| b.set_default("format", DEFAULT_FORMAT))
        .and_then(|b| b.set_default("quality_tag", DEFAULT_QUALITY_TAG))
        .and_then(|b| b.set_default("timeout_secs", DEFAULT_TIMEOUT_SECS))
        .and_then(|b| b.set_default("jobs", 1_i64))
        .and_then(|b| b.set_default("cache_dir", DEFAULT_CACHE_DIR))
        .and_then(|b| b.set_default("temp_dir", DEFAULT_TEMP_DIR))
        .into_diagnostic()?
        .add_source(file)
        .add_source(
            Environment::with_prefix("MEDLEY")
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("downloader")
                .with_list_parse_key("transcoder")
                .try_parsing(true),
        )
        .build()
        .into_diagnostic()
        .wrap_err("Could not read the settings")?
        .try_deserialize()
        .into_diagnostic()
        .wrap_err("Invalid settings")
}

#[cfg(test)]
impl Settings {
    /// Settings of a run with the default tools and no timeout
    pub fn for_test(input: &Path, output: &Path, cache_dir: &Path, temp_dir: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            cache_dir: cache_dir.to_path_buf(),
            temp_dir: temp_dir.to_path_buf(),
            verbose: 0,
            dry_run: false,
            jobs: 1,
            timeout: None,
            format: DEFAULT_FORMAT.to_string(),
            quality_tag: DEFAULT_QUALITY_TAG.to_string(),
            downloader: ToolCommand::new("yt-dlp"),
            transcoder: ToolCommand::new("ffmpeg"),
            paths: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use indoc::indoc;
    use tempfile::TempDir;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["medley", "-i", "in.json", "-o", "out.mp4"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn write_config(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("medley.toml");
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn defaults_without_a_settings_file() {
        let settings = Settings::load(args(&[])).unwrap();

        assert_eq!(settings.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(settings.temp_dir, PathBuf::from(DEFAULT_TEMP_DIR));
        assert_eq!(settings.downloader, ToolCommand::new("yt-dlp"));
        assert_eq!(settings.transcoder, ToolCommand::new("ffmpeg"));
        assert_eq!(settings.format, "18");
        assert_eq!(settings.quality_tag, "360p");
        assert_eq!(settings.jobs, 1);
        assert_eq!(settings.timeout, Some(Duration::from_secs(1800)));
        assert_eq!(settings.paths, None);
        assert!(!settings.keep_scratch());
    }

    #[test]
    fn settings_file_then_command_line() {
        let dir = TempDir::new().unwrap();
        let config = write_config(
            &dir,
            indoc! {r#"
                downloader = ["docker", "compose", "exec", "ytdlp", "yt-dlp"]
                transcoder = ["docker", "compose", "exec", "ffmpeg", "ffmpeg"]
                cache_dir = "from-file/cache"
                temp_dir = "from-file/tmp"
                timeout_secs = 60
                jobs = 3

                [paths]
                host_root = "media"
                tool_root = "/workdir"
            "#},
        );

        let settings =
            Settings::load(args(&["--config", &config, "-c", "cli-cache", "--timeout", "0", "-v"]))
                .unwrap();

        assert_eq!(settings.downloader.to_string(), "docker compose exec ytdlp yt-dlp");
        assert_eq!(settings.transcoder.to_string(), "docker compose exec ffmpeg ffmpeg");
        assert_eq!(settings.cache_dir, PathBuf::from("cli-cache"));
        assert_eq!(settings.temp_dir, PathBuf::from("from-file/tmp"));
        assert_eq!(settings.jobs, 3);
        assert_eq!(settings.timeout, None);
        assert!(settings.keep_scratch());
        assert_eq!(
            settings.paths,
            Some(PathMapping {
                host_root: PathBuf::from("media"),
                tool_root: PathBuf::from("/workdir"),
            })
        );
        assert!(settings.path_translator().is_ok());
    }

    #[test]
    fn explicit_settings_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Settings::load(args(&["--config", missing.to_str().unwrap()])).is_err());
    }

    #[test]
    fn scratch_must_not_hold_the_cache_nor_the_files() {
        assert!(Settings::load(args(&["-c", "media/work", "-t", "media/work"])).is_err());
        assert!(Settings::load(args(&["-c", "media/work/cache", "-t", "media/work"])).is_err());
        assert!(Settings::load(args(&["-c", "media/cache", "-t", "media/./cache"])).is_err());
        assert!(Settings::load(args(&["-t", "."])).is_err());

        // Side by side, or scratch inside the cache, is fine
        assert!(Settings::load(args(&["-c", "media/cache", "-t", "media/tmp"])).is_ok());
        assert!(Settings::load(args(&["-c", "media", "-t", "media/tmp"])).is_ok());
        assert!(Settings::load(args(&["-c", "media/cache", "-t", "media/cache-tmp"])).is_ok());
    }

    #[test]
    fn rejects_unusable_values() {
        let dir = TempDir::new().unwrap();

        let config = write_config(&dir, "transcoder = []\n");
        assert!(Settings::load(args(&["--config", &config])).is_err());

        let config = write_config(&dir, "quality_tag = \"../up\"\n");
        assert!(Settings::load(args(&["--config", &config])).is_err());
    }
}
