use std::path::PathBuf;

use clap::{ArgAction, Parser};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("MEDLEY_", $v)
    };
}

/// Assemble a medley video out of timestamped clips of web videos.
/// Download the source videos, cut the requested segments, and join them in order.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the JSON file describing the segments:
    /// an array of `{ "url", "startTime", "endTime" }` objects
    #[arg(short, long, env=arg_env!("INPUT"))]
    pub input: PathBuf,

    /// Path for the final merged video
    #[arg(short, long, env=arg_env!("OUTPUT"))]
    pub output: PathBuf,

    /// Directory storing the downloaded source videos, kept between runs
    /// [default: media/.youtube_cache]
    #[arg(short, long, env=arg_env!("CACHE_DIR"))]
    pub cache_dir: Option<PathBuf>,

    /// Directory for the temporary segments, emptied at the start of every run
    /// [default: media/.temp_segments]
    #[arg(short, long, env=arg_env!("TEMP_DIR"))]
    pub temp_dir: Option<PathBuf>,

    /// Log more details and keep the temporary segments.
    /// Can be repeated to also log the external programs output
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Settings file describing how to reach the external programs
    /// [default: medley.toml, if it exists]
    #[arg(long, env=arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// Number of videos downloaded concurrently [default: 1]
    #[arg(short, long, env=arg_env!("JOBS"), value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Maximum number of seconds an external program may run, 0 to wait forever
    /// [default: 1800]
    #[arg(long, env=arg_env!("TIMEOUT"))]
    pub timeout: Option<u64>,

    /// Only read the input and print what would be done
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let args = Args::try_parse_from([
            "medley", "-i", "in.json", "-o", "out.mp4", "-c", "cache", "-t", "tmp", "-vv", "-j", "4",
        ])
        .unwrap();

        assert_eq!(args.input, PathBuf::from("in.json"));
        assert_eq!(args.output, PathBuf::from("out.mp4"));
        assert_eq!(args.cache_dir, Some(PathBuf::from("cache")));
        assert_eq!(args.temp_dir, Some(PathBuf::from("tmp")));
        assert_eq!(args.verbose, 2);
        assert_eq!(args.jobs, Some(4));
        assert!(!args.dry_run);
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(Args::try_parse_from(["medley", "-i", "a", "-o", "b", "-j", "0"]).is_err());
    }
}
