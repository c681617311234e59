use std::fmt::Display;

use crate::result::TaskError;

/// A non-negative point in a video, with a precision of one second.
///
/// Accepted textual forms are `HH:MM:SS`, `MM:SS` and `SS`.
/// Fields are not range checked, so `01:90` is 150 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timecode(u64);

impl Timecode {
    pub fn from_seconds(seconds: u64) -> Self {
        Self(seconds)
    }

    pub fn parse(text: &str) -> Result<Self, TaskError> {
        let invalid = || TaskError::InvalidTimecode {
            raw: text.to_string(),
        };

        let parts: Vec<&str> = text.trim().split(':').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }

        let mut seconds: u64 = 0;
        for part in parts {
            // `u64::from_str` accepts a leading '+', only plain digits are wanted here
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let n: u64 = part.parse().map_err(|_| invalid())?;
            seconds = seconds
                .checked_mul(60)
                .and_then(|s| s.checked_add(n))
                .ok_or_else(invalid)?;
        }

        Ok(Self(seconds))
    }

    pub fn seconds(self) -> u64 {
        self.0
    }
}

impl Display for Timecode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_seconds(self.0))
    }
}

/// Canonical zero-padded `HH:MM:SS` form
pub fn format_seconds(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Number of seconds between two textual timecodes
pub fn duration(start: &str, end: &str) -> Result<u64, TaskError> {
    let start_tc = Timecode::parse(start)?;
    let end_tc = Timecode::parse(end)?;

    if end_tc <= start_tc {
        return Err(TaskError::NonPositiveDuration {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok(end_tc.seconds() - start_tc.seconds())
}
