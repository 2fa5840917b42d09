//! ZIP archive backend.
//!
//! The central directory is scanned once at construction into a path
//! index; entry bodies are decompressed on demand. ZIP files do not
//! always carry explicit directory entries, so directories are also
//! inferred from file path prefixes.

use crate::backend::{guess_content_type, sanitize_segment, Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;
use zip::ZipArchive;

struct ZipEntry {
    index: usize,
    size: u64,
    mtime: Option<DateTime<Utc>>,
    content_type: String,
}

/// Backend over the contents of a ZIP archive.
pub struct ZipBackend {
    // The zip reader seeks within the underlying file, so concurrent
    // reads are serialised through the mutex.
    archive: Mutex<Option<ZipArchive<File>>>,
    files: HashMap<Vec<String>, ZipEntry>,
    dirs: HashSet<Vec<String>>,
    opened: DateTime<Utc>,
}

fn entry_mtime(dt: Option<zip::DateTime>) -> Option<DateTime<Utc>> {
    let dt = dt?;
    Utc.with_ymd_and_hms(
        dt.year() as i32,
        dt.month() as u32,
        dt.day() as u32,
        dt.hour() as u32,
        dt.minute() as u32,
        dt.second() as u32,
    )
    .single()
}

fn split_entry_name(name: &str) -> Vec<String> {
    name.split('/')
        .filter(|p| !p.is_empty())
        .map(sanitize_segment)
        .collect()
}

impl ZipBackend {
    /// Open a ZIP archive and index its entries.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let mut files = HashMap::new();
        let mut dirs = HashSet::new();
        dirs.insert(Vec::new());

        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            let parts = split_entry_name(entry.name());
            if parts.is_empty() {
                continue;
            }
            if entry.is_dir() {
                dirs.insert(parts);
            } else {
                for depth in 1..parts.len() {
                    dirs.insert(parts[..depth].to_vec());
                }
                let content_type = guess_content_type(entry.name());
                files.insert(
                    parts,
                    ZipEntry {
                        index,
                        size: entry.size(),
                        mtime: entry_mtime(entry.last_modified()),
                        content_type,
                    },
                );
            }
        }

        Ok(Self {
            archive: Mutex::new(Some(archive)),
            files,
            dirs,
            opened: Utc::now(),
        })
    }
}

impl Backend for ZipBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        if self.dirs.contains(path) {
            return Ok(ResourceInfo::directory().with_mtime(self.opened));
        }
        match self.files.get(path) {
            Some(entry) => Ok(ResourceInfo::file(entry.size, entry.content_type.clone())
                .with_mtime(entry.mtime.unwrap_or(self.opened))),
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
        let entry = self.files.get(path).ok_or_else(|| Error::not_found(path))?;

        let mut guard = self.archive.lock().unwrap_or_else(|e| e.into_inner());
        let archive = guard
            .as_mut()
            .ok_or_else(|| Error::Read("archive handle closed".to_string()))?;
        let mut file = archive.by_index(entry.index)?;
        let mut body = Vec::with_capacity(entry.size as usize);
        file.read_to_end(&mut body)
            .map_err(|e| Error::Read(format!("cannot read zip entry: {}", e)))?;
        Ok(body)
    }

    fn close(&self) {
        let mut guard = self.archive.lock().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            debug!("zip archive closed");
        }
    }
}
