use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    io::named_tempfile_beside,
    outside::StreamDownloader,
    result::{TaskError, ToolError},
    types::VideoId,
};

/// Container of every cached source video
const CONTAINER: &str = "mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Already on disk, nothing was downloaded
    Hit,
    /// Downloaded during this call
    Fetched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedVideo {
    pub path: PathBuf,
    pub status: CacheStatus,
}

/// `<id>.<quality tag>`, the name of an entry without its extension
fn entry_stem(quality_tag: &str, id: &VideoId) -> String {
    format!("{id}.{quality_tag}")
}

/// Where the copy of the video lives in the cache directory
pub fn entry_path(dir: &Path, quality_tag: &str, id: &VideoId) -> PathBuf {
    dir.join(format!("{}.{CONTAINER}", entry_stem(quality_tag, id)))
}

/// Local copies of source videos, shared between runs.
///
/// Entries are only ever added: a file at an entry path is always complete,
/// as downloads are written to a temporary file that is renamed into place.
#[derive(Debug)]
pub struct VideoCache<'a> {
    dir: PathBuf,
    quality_tag: String,
    downloader: &'a dyn StreamDownloader,
}

impl<'a> VideoCache<'a> {
    pub fn new(dir: &Path, quality_tag: &str, downloader: &'a dyn StreamDownloader) -> Self {
        Self {
            dir: dir.to_path_buf(),
            quality_tag: quality_tag.to_string(),
            downloader,
        }
    }

    pub fn entry_path(&self, id: &VideoId) -> PathBuf {
        entry_path(&self.dir, &self.quality_tag, id)
    }

    /// Return the path of the cached copy of the video, downloading it first on a cache miss.
    pub fn ensure_cached(&self, id: &VideoId, url: &str) -> Result<CachedVideo, TaskError> {
        let path = self.entry_path(id);
        if path.is_file() {
            debug!("{} for {id} already in cache", self.quality_tag);
            return Ok(CachedVideo {
                path,
                status: CacheStatus::Hit,
            });
        }

        self.fetch(id, url, &path)
            .map_err(|source| TaskError::DownloadFailed {
                video_id: id.to_string(),
                source,
            })?;

        info!("Downloaded {} for {url}", self.quality_tag);
        Ok(CachedVideo {
            path,
            status: CacheStatus::Fetched,
        })
    }

    fn fetch(&self, id: &VideoId, url: &str, path: &Path) -> Result<(), ToolError> {
        let tmp = named_tempfile_beside(&self.dir, &entry_stem(&self.quality_tag, id), CONTAINER)
            .map_err(|err| ToolError::io(&self.dir, err))?;

        debug!("Downloading {url} to {}", tmp.path().display());
        // The temporary file is removed on drop if anything goes wrong
        self.downloader.download(url, tmp.path())?;

        let size = std::fs::metadata(tmp.path())
            .map_err(|err| ToolError::io(tmp.path(), err))?
            .len();
        if size == 0 {
            return Err(ToolError::NoOutput {
                program: "downloader".to_string(),
                path: path.to_path_buf(),
            });
        }

        tmp.persist(path)
            .map_err(|err| ToolError::io(path, err.error))?;
        Ok(())
    }
}
