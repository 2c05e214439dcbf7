use std::fmt::Debug;
use std::fs;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

/// Where feeds land on disk and how the marketplace reaches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub public_root: PathBuf,
    pub public_host: String,
}

impl PublishTarget {
    pub fn new(public_root: impl Into<PathBuf>, public_host: impl Into<String>) -> Self {
        Self {
            public_root: public_root.into(),
            public_host: public_host.into(),
        }
    }

    /// Resolves a configured relative path to the file path and public URL.
    pub fn resolve(&self, relative: &str) -> Result<(PathBuf, String), PublishError> {
        let trimmed = relative.trim().trim_start_matches('/');
        let mut segments = Vec::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(PublishError::InvalidPath(relative.to_string()));
                }
            }
        }
        if segments.is_empty() {
            return Err(PublishError::InvalidPath(relative.to_string()));
        }

        let path = segments
            .iter()
            .fold(self.public_root.clone(), |path, segment| path.join(segment));
        let url = format!(
            "{}/{}",
            self.public_host.trim_end_matches('/'),
            segments.join("/")
        );
        Ok((path, url))
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedFeed {
    pub path: PathBuf,
    pub url: String,
    pub last_update: DateTime<Utc>,
    pub bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("feed path '{0}' must be a relative path inside the public root")]
    InvalidPath(String),
    #[error("unable to create feed directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to write feed {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Storage for published feed files.
pub trait FeedSink: Send + Sync + Debug {
    /// Replaces the file at `path`. Readers must observe either the previous
    /// contents or `contents`, never a mix, and a failed call leaves the
    /// previous file untouched.
    fn replace(&self, path: &Path, contents: &[u8]) -> Result<(), PublishError>;
}

/// Local filesystem sink: stages the feed in a sibling temp file and renames
/// it over the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemSink;

impl FeedSink for FileSystemSink {
    fn replace(&self, path: &Path, contents: &[u8]) -> Result<(), PublishError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| PublishError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;

        let write_error = |source: std::io::Error| PublishError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut staged = NamedTempFile::new_in(parent).map_err(write_error)?;
        staged.write_all(contents).map_err(write_error)?;
        staged.as_file().sync_all().map_err(write_error)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staged
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(write_error)?;
        }
        staged
            .persist(path)
            .map_err(|err| write_error(err.error))?;
        Ok(())
    }
}

/// Writes assembled feeds through a [`FeedSink`].
#[derive(Debug)]
pub struct FeedPublisher<S> {
    sink: Arc<S>,
    target: PublishTarget,
}

impl<S> FeedPublisher<S>
where
    S: FeedSink,
{
    pub fn new(sink: Arc<S>, target: PublishTarget) -> Self {
        Self { sink, target }
    }

    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    /// Publishes the complete document under `relative_path`.
    pub fn publish(&self, xml: &str, relative_path: &str) -> Result<PublishedFeed, PublishError> {
        let (path, url) = self.target.resolve(relative_path)?;
        self.sink.replace(&path, xml.as_bytes())?;

        let published = PublishedFeed {
            path,
            url,
            last_update: Utc::now(),
            bytes: xml.len(),
        };
        info!(url = %published.url, path = %published.path.display(), bytes = published.bytes, "feed published");
        Ok(published)
    }
}
