mod task;
mod timecode;
mod video_id;

pub use task::{parse_manifest, ResolvedTask, Task};
pub use timecode::{duration, format_seconds, Timecode};
pub use video_id::VideoId;
