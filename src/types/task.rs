use serde_json::Value;

use crate::result::{ManifestError, TaskError};

use super::{duration, Timecode, VideoId};

/// One requested clip, as written in the input manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// 1-based position in the manifest
    pub ordinal: usize,
    pub url: String,
    pub start_time: String,
    pub end_time: String,
}

/// A task whose URL and timecodes have been understood
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub ordinal: usize,
    pub url: String,
    pub video_id: VideoId,
    pub start: Timecode,
    pub end: Timecode,
}

impl Task {
    /// Resolve the video ID then the timecodes.
    pub fn resolve(&self) -> Result<ResolvedTask, TaskError> {
        let video_id = VideoId::extract(&self.url).ok_or_else(|| TaskError::UnresolvableUrl {
            url: self.url.clone(),
        })?;

        let length = duration(&self.start_time, &self.end_time)?;
        let start = Timecode::parse(&self.start_time)?;
        let end = Timecode::from_seconds(start.seconds() + length);

        Ok(ResolvedTask {
            ordinal: self.ordinal,
            url: self.url.clone(),
            video_id,
            start,
            end,
        })
    }
}

impl ResolvedTask {
    /// Length of the clip in seconds, always positive
    pub fn duration(&self) -> u64 {
        self.end.seconds() - self.start.seconds()
    }
}

/// Parse the input manifest.
///
/// The whole manifest is rejected at the first structural problem.
/// Fields other than `url`, `startTime` and `endTime` are ignored.
pub fn parse_manifest(text: &str) -> Result<Vec<Task>, ManifestError> {
    let json: Value = serde_json::from_str(text)?;
    let items = json.as_array().ok_or(ManifestError::NotAnArray)?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let object = item
                .as_object()
                .ok_or(ManifestError::NotAnObject { index })?;

            let get_field = |field: &'static str| -> Result<String, ManifestError> {
                object
                    .get(field)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .ok_or(ManifestError::MissingField { index, field })
            };

            Ok(Task {
                ordinal: index + 1,
                url: get_field("url")?,
                start_time: get_field("startTime")?,
                end_time: get_field("endTime")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn parses_an_editor_export() {
        let tasks = parse_manifest(indoc! {r#"
            [
              { "url": "https://youtu.be/dQw4w9WgXcQ", "startTime": "00:00:10", "endTime": "00:00:20" },
              { "url": "https://www.youtube.com/watch?v=9bZkp7q19f0", "startTime": "01:05", "endTime": "90",
                "songTitle": "ignored", "verified": true }
            ]
        "#})
        .unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].ordinal, 1);
        assert_eq!(tasks[1].ordinal, 2);
        assert_eq!(tasks[1].start_time, "01:05");
        assert_eq!(tasks[1].end_time, "90");
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_manifest("[]").unwrap().is_empty());
    }

    #[test]
    fn structural_violations_are_rejected() {
        assert!(matches!(
            parse_manifest("{\"url\": \"x\"}"),
            Err(ManifestError::NotAnArray)
        ));
        assert!(matches!(parse_manifest("[1, 2"), Err(ManifestError::Json(_))));
        assert!(matches!(
            parse_manifest("[\"https://youtu.be/dQw4w9WgXcQ\"]"),
            Err(ManifestError::NotAnObject { index: 0 })
        ));

        let missing_end = indoc! {r#"
            [
              { "url": "https://youtu.be/dQw4w9WgXcQ", "startTime": "1", "endTime": "2" },
              { "url": "https://youtu.be/dQw4w9WgXcQ", "startTime": "1" }
            ]
        "#};
        assert!(matches!(
            parse_manifest(missing_end),
            Err(ManifestError::MissingField { index: 1, field: "endTime" })
        ));

        let empty_url = r#"[{ "url": "", "startTime": "1", "endTime": "2" }]"#;
        assert!(matches!(
            parse_manifest(empty_url),
            Err(ManifestError::MissingField { index: 0, field: "url" })
        ));

        let numeric_start = r#"[{ "url": "u", "startTime": 5, "endTime": "6" }]"#;
        assert!(matches!(
            parse_manifest(numeric_start),
            Err(ManifestError::MissingField { index: 0, field: "startTime" })
        ));
    }

    fn task(url: &str, start: &str, end: &str) -> Task {
        Task {
            ordinal: 3,
            url: url.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn resolves_a_valid_task() {
        let resolved = task("https://youtu.be/dQw4w9WgXcQ", "00:01:00", "01:30")
            .resolve()
            .unwrap();

        assert_eq!(resolved.ordinal, 3);
        assert_eq!(&*resolved.video_id, "dQw4w9WgXcQ");
        assert_eq!(resolved.start.seconds(), 60);
        assert_eq!(resolved.duration(), 30);
    }

    #[test]
    fn resolution_errors_are_task_level() {
        assert!(matches!(
            task("https://example.com", "0", "1").resolve(),
            Err(TaskError::UnresolvableUrl { .. })
        ));
        assert!(matches!(
            task("https://youtu.be/dQw4w9WgXcQ", "1:2:3:4", "1").resolve(),
            Err(TaskError::InvalidTimecode { .. })
        ));
        assert!(matches!(
            task("https://youtu.be/dQw4w9WgXcQ", "00:00:20", "00:00:20").resolve(),
            Err(TaskError::NonPositiveDuration { .. })
        ));
    }
}
