mod command;
#[cfg(test)]
pub mod fake;
mod ffmpeg;
mod paths;
mod probe;
mod ytdl;

pub use command::{CommandRunner, SystemRunner, ToolCommand};
pub use ffmpeg::{Ffmpeg, StreamTransformer};
pub use paths::{Identity, PathTranslator, PrefixMap};
pub use probe::probe;
pub use ytdl::{StreamDownloader, Ytdl};
