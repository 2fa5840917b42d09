use crate::error::Result;
use chrono::{DateTime, Utc};

/// Whether a resource is a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A collection with listable children.
    Directory,
    /// A leaf with a byte body.
    File,
}

/// Metadata about a resource inside a backend.
///
/// Directories carry no size or content type; files always carry both.
/// `mtime` is the source's last-modified instant when the format records
/// one, otherwise the instant the backend was opened.
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    /// Directory or file.
    pub kind: ResourceKind,
    /// Body length in bytes; `None` for directories.
    pub size: Option<u64>,
    /// Last-modified instant, if known.
    pub mtime: Option<DateTime<Utc>>,
    /// MIME type; `None` for directories.
    pub content_type: Option<String>,
}

impl ResourceInfo {
    /// Describe a directory.
    pub fn directory() -> Self {
        Self {
            kind: ResourceKind::Directory,
            size: None,
            mtime: None,
            content_type: None,
        }
    }

    /// Describe a file of the given size and MIME type.
    pub fn file(size: u64, content_type: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::File,
            size: Some(size),
            mtime: None,
            content_type: Some(content_type.into()),
        }
    }

    /// Attach a last-modified instant.
    pub fn with_mtime(mut self, mtime: DateTime<Utc>) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// True for directories.
    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}

/// Read-only virtual filesystem over one data source.
///
/// Paths are canonical segment sequences; the empty slice is the root,
/// which is always a directory. Implementations must be safe for
/// concurrent calls; adapters wrapping non-thread-safe native handles
/// serialise access behind an internal mutex.
pub trait Backend: Send + Sync {
    /// Metadata for the resource at `path`.
    fn info(&self, path: &[String]) -> Result<ResourceInfo>;

    /// Child names of the directory at `path`, without recursion.
    ///
    /// Fails with not-found when `path` is missing or is a file. The
    /// returned order is stable for a given handle.
    fn list(&self, path: &[String]) -> Result<Vec<String>>;

    /// Full body of the file at `path`.
    ///
    /// Fails with not-found when `path` is missing or is a directory.
    fn get(&self, path: &[String]) -> Result<Vec<u8>>;

    /// Release any underlying resources. Idempotent; the default is a
    /// no-op for adapters that hold nothing beyond parsed data.
    fn close(&self) {}
}

/// Guess a MIME type from a file name, falling back to octet-stream.
pub(crate) fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Replace characters that cannot appear in a path segment.
///
/// Archive adapters run untrusted entry names through this before
/// exposing them.
pub(crate) fn sanitize_segment(name: &str) -> String {
    name.replace(['\0', '/'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_info_carries_size_and_type() {
        let info = ResourceInfo::file(12, "text/plain");
        assert_eq!(info.kind, ResourceKind::File);
        assert_eq!(info.size, Some(12));
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn directory_info_omits_size_and_type() {
        let info = ResourceInfo::directory();
        assert!(info.is_dir());
        assert!(info.size.is_none());
        assert!(info.content_type.is_none());
    }

    #[test]
    fn sanitize_replaces_separator_bytes() {
        assert_eq!(sanitize_segment("a/b\0c"), "a_b_c");
        assert_eq!(sanitize_segment("plain"), "plain");
    }
}
