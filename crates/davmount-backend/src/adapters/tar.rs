//! TAR archive backend, including gzip/bzip2/xz compressed variants.
//!
//! Compressed tar streams cannot seek, so the whole archive is decoded
//! once at construction into an in-memory index; afterwards no lock or
//! file handle is needed.

use crate::backend::{guess_content_type, sanitize_segment, Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::{Archive, EntryType};

struct TarEntry {
    body: Vec<u8>,
    mtime: Option<DateTime<Utc>>,
    content_type: String,
}

/// Backend over the contents of a TAR archive.
pub struct TarBackend {
    files: HashMap<Vec<String>, TarEntry>,
    dirs: HashSet<Vec<String>>,
    opened: DateTime<Utc>,
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let lower = path.to_string_lossy().to_lowercase();
    Ok(if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        Box::new(flate2::read::GzDecoder::new(file))
    } else if lower.ends_with(".tar.bz2") {
        Box::new(bzip2::read::BzDecoder::new(file))
    } else if lower.ends_with(".tar.xz") {
        Box::new(xz2::read::XzDecoder::new(file))
    } else {
        Box::new(file)
    })
}

impl TarBackend {
    /// Open a TAR archive, decoding every member into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut archive = Archive::new(open_reader(path)?);

        let mut files = HashMap::new();
        let mut dirs = HashSet::new();
        dirs.insert(Vec::new());

        for entry in archive
            .entries()
            .map_err(|e| Error::InvalidSource(format!("cannot open tar file: {}", e)))?
        {
            let mut entry =
                entry.map_err(|e| Error::InvalidSource(format!("corrupt tar entry: {}", e)))?;
            let name = entry.path()?.to_string_lossy().into_owned();
            let parts: Vec<String> = name
                .split('/')
                .filter(|p| !p.is_empty())
                .map(sanitize_segment)
                .collect();
            if parts.is_empty() {
                continue;
            }
            match entry.header().entry_type() {
                EntryType::Directory => {
                    dirs.insert(parts);
                }
                EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                    let mut body = Vec::with_capacity(entry.size() as usize);
                    entry
                        .read_to_end(&mut body)
                        .map_err(|e| Error::InvalidSource(format!("corrupt tar entry: {}", e)))?;
                    let mtime = entry
                        .header()
                        .mtime()
                        .ok()
                        .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single());
                    for depth in 1..parts.len() {
                        dirs.insert(parts[..depth].to_vec());
                    }
                    let content_type = guess_content_type(&name);
                    files.insert(
                        parts,
                        TarEntry {
                            body,
                            mtime,
                            content_type,
                        },
                    );
                }
                // Links and special files have no byte body to serve.
                _ => {}
            }
        }

        Ok(Self {
            files,
            dirs,
            opened: Utc::now(),
        })
    }
}

impl Backend for TarBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        if self.dirs.contains(path) {
            return Ok(ResourceInfo::directory().with_mtime(self.opened));
        }
        match self.files.get(path) {
            Some(entry) => Ok(
                ResourceInfo::file(entry.body.len() as u64, entry.content_type.clone())
                    .with_mtime(entry.mtime.unwrap_or(self.opened)),
            ),
            None => Err(Error::not_found(path)),
        }
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        if !self.dirs.contains(path) {
            return Err(Error::not_found(path));
        }
        let depth = path.len();
        let mut children = BTreeSet::new();
        for candidate in self.files.keys().chain(self.dirs.iter()) {
            if candidate.len() == depth + 1 && candidate[..depth] == *path {
                children.insert(candidate[depth].clone());
            }
        }
        Ok(children.into_iter().collect())
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        if self.dirs.contains(path) {
            return Err(Error::not_found(path));
        }
        self.files
            .get(path)
            .map(|entry| entry.body.clone())
            .ok_or_else(|| Error::not_found(path))
    }
}
