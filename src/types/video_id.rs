use std::{fmt::Display, ops::Deref, sync::OnceLock};

use regex::Regex;

/// Length of every YouTube video ID
pub const ID_LEN: usize = 11;

/// The path or query markers after which the video ID is found.
/// Example: "https://youtu.be/dQw4w9WgXcQ", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
macro_rules! id_marker {
    () => {
        r#"(?:youtu\.be/|v/|u/\w/|embed/|shorts/|live/|watch\?v=|&v=)"#
    };
}
/// Everything up to the next query separator or fragment
macro_rules! id_candidate {
    () => {
        r#"(?P<id>[^#&?]*)"#
    };
}
/// Take the last marker of the URL, as the ID is never followed by another one
const PATTERN: &str = concat!("^.*", id_marker!(), id_candidate!());

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_regex() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(PATTERN).expect("video ID pattern is valid"))
}

/// The 11 characters identifying a video on the hosting site
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VideoId(String);

impl VideoId {
    /// Extract the video ID from the common URL shapes.
    ///
    /// Returns `None` when nothing that looks like an ID is found;
    /// the caller decides what to do with the URL.
    pub fn extract(url: &str) -> Option<Self> {
        let candidate = id_regex().captures(url.trim())?.name("id")?.as_str();

        let is_valid = candidate.len() == ID_LEN
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        is_valid.then(|| Self(candidate.to_string()))
    }
}

impl Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for VideoId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
