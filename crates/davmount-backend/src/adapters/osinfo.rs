//! OS information backend.
//!
//! A synthetic read-only tree of small text files describing the host:
//!
//! ```text
//! /
//!   platform/{os,arch,family,kernel,hostname}
//!   env/<VAR>
//!   cpu/count
//!   cwd
//!   pid
//!   uid
//!   uptime
//! ```
//!
//! No source file is required. Values are re-sampled on every read;
//! only the tree shape is fixed.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

const ROOT_ENTRIES: &[&str] = &["cpu", "cwd", "env", "pid", "platform", "uid", "uptime"];
const PLATFORM_ENTRIES: &[&str] = &["arch", "family", "hostname", "kernel", "os"];

enum Sample {
    Dir(Vec<String>),
    File(String),
}

/// Backend over live host information.
pub struct OsInfoBackend {
    opened: DateTime<Utc>,
}

impl Default for OsInfoBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn read_proc(path: &str) -> Option<String> {
    std::fs::read_to_string(Path::new(path))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn hostname() -> String {
    read_proc("/proc/sys/kernel/hostname")
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn kernel() -> String {
    read_proc("/proc/version").unwrap_or_else(|| "unknown".to_string())
}

fn uptime() -> String {
    read_proc("/proc/uptime")
        .and_then(|s| s.split_whitespace().next().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn uid() -> String {
    read_proc("/proc/self/status")
        .and_then(|status| {
            status
                .lines()
                .find(|line| line.starts_with("Uid:"))
                .and_then(|line| line.split_whitespace().nth(1).map(str::to_string))
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn cpu_count() -> String {
    std::thread::available_parallelism()
        .map(|n| n.get().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn cwd() -> String {
    std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Environment variable names that survive as path segments unchanged.
fn env_names() -> Vec<String> {
    let mut names: Vec<String> = std::env::vars_os()
        .filter_map(|(name, _)| name.into_string().ok())
        .filter(|name| !name.is_empty() && !name.contains(['/', '\0']))
        .collect();
    names.sort();
    names.dedup();
    names
}

fn env_value(name: &str) -> Option<String> {
    std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
}

fn sample(path: &[String]) -> Result<Sample> {
    let parts: Vec<&str> = path.iter().map(String::as_str).collect();
    Ok(match parts.as_slice() {
        [] => Sample::Dir(ROOT_ENTRIES.iter().map(|s| s.to_string()).collect()),
        ["platform"] => Sample::Dir(PLATFORM_ENTRIES.iter().map(|s| s.to_string()).collect()),
        ["platform", "os"] => Sample::File(std::env::consts::OS.to_string()),
        ["platform", "arch"] => Sample::File(std::env::consts::ARCH.to_string()),
        ["platform", "family"] => Sample::File(std::env::consts::FAMILY.to_string()),
        ["platform", "kernel"] => Sample::File(kernel()),
        ["platform", "hostname"] => Sample::File(hostname()),
        ["env"] => Sample::Dir(env_names()),
        ["env", name] => {
            Sample::File(env_value(name).ok_or_else(|| Error::not_found(path))?)
        }
        ["cpu"] => Sample::Dir(vec!["count".to_string()]),
        ["cpu", "count"] => Sample::File(cpu_count()),
        ["cwd"] => Sample::File(cwd()),
        ["pid"] => Sample::File(std::process::id().to_string()),
        ["uid"] => Sample::File(uid()),
        ["uptime"] => Sample::File(uptime()),
        _ => return Err(Error::not_found(path)),
    })
}

impl OsInfoBackend {
    /// Create the backend; there is nothing to open.
    pub fn new() -> Self {
        Self {
            opened: Utc::now(),
        }
    }
}

impl Backend for OsInfoBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        Ok(match sample(path)? {
            Sample::Dir(_) => ResourceInfo::directory().with_mtime(self.opened),
            Sample::File(value) => {
                ResourceInfo::file(value.len() as u64, "text/plain").with_mtime(self.opened)
            }
        })
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        match sample(path)? {
            Sample::Dir(names) => Ok(names),
            Sample::File(_) => Err(Error::not_found(path)),
        }
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match sample(path)? {
            Sample::Dir(_) => Err(Error::not_found(path)),
            Sample::File(value) => Ok(value.into_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tree_shape_is_fixed() {
        let backend = OsInfoBackend::new();
        assert_eq!(
            backend.list(&[]).unwrap(),
            vec!["cpu", "cwd", "env", "pid", "platform", "uid", "uptime"]
        );
        assert_eq!(
            backend.list(&p(&["platform"])).unwrap(),
            vec!["arch", "family", "hostname", "kernel", "os"]
        );
    }

    #[test]
    fn pid_matches_process() {
        let backend = OsInfoBackend::new();
        assert_eq!(
            backend.get(&p(&["pid"])).unwrap(),
            std::process::id().to_string().into_bytes()
        );
    }

    #[test]
    fn env_values_are_live() {
        std::env::set_var("DAVMOUNT_TEST_VAR", "live");
        let backend = OsInfoBackend::new();
        assert_eq!(
            backend.get(&p(&["env", "DAVMOUNT_TEST_VAR"])).unwrap(),
            b"live".to_vec()
        );
        assert!(backend.list(&p(&["env"])).unwrap().contains(&"DAVMOUNT_TEST_VAR".to_string()));
    }

    #[test]
    fn info_size_matches_get_length() {
        let backend = OsInfoBackend::new();
        for leaf in [p(&["platform", "os"]), p(&["cpu", "count"]), p(&["uptime"])] {
            let info = backend.info(&leaf).unwrap();
            let body = backend.get(&leaf).unwrap();
            assert_eq!(info.size, Some(body.len() as u64));
        }
    }
}
