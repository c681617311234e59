use std::{
    fmt::Debug,
    io,
    path::{Path, PathBuf},
};

use tracing::trace;

/// Translate a path as seen by this program into the path the external tools must be given.
///
/// The tools may run in another environment (e.g. a container) where the same
/// files are mounted under another root.
pub trait PathTranslator: Sync + Debug {
    fn to_tool(&self, host: &Path) -> PathBuf;
}

/// The tools see the same filesystem as we do
#[derive(Debug, Default)]
pub struct Identity;

impl PathTranslator for Identity {
    fn to_tool(&self, host: &Path) -> PathBuf {
        host.to_path_buf()
    }
}

/// The tools see `host_root` mounted as `tool_root`.
///
/// Paths outside of `host_root` are handed over unchanged.
#[derive(Debug)]
pub struct PrefixMap {
    host_root: PathBuf,
    tool_root: PathBuf,
}

impl PrefixMap {
    pub fn new(host_root: &Path, tool_root: &Path) -> io::Result<Self> {
        Ok(Self {
            host_root: std::path::absolute(host_root)?,
            tool_root: tool_root.to_path_buf(),
        })
    }
}

impl PathTranslator for PrefixMap {
    fn to_tool(&self, host: &Path) -> PathBuf {
        let absolute = std::path::absolute(host).unwrap_or_else(|_| host.to_path_buf());
        match absolute.strip_prefix(&self.host_root) {
            Ok(relative) => self.tool_root.join(relative),
            Err(_) => {
                trace!("{} is not under the mapped root", host.display());
                host.to_path_buf()
            }
        }
    }
}
