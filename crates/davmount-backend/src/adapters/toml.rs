//! TOML document backend.
//!
//! Same mapping rules as the JSON backend over the TOML value tree:
//! tables and arrays become directories, scalars become files.

use super::json::parse_index;
use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use toml::Value;

/// Backend over a parsed TOML document.
pub struct TomlBackend {
    root: Value,
    opened: DateTime<Utc>,
}

fn scalar_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.clone().into_bytes(),
        Value::Integer(v) => v.to_string().into_bytes(),
        Value::Float(v) => v.to_string().into_bytes(),
        Value::Boolean(true) => b"true".to_vec(),
        Value::Boolean(false) => b"false".to_vec(),
        Value::Datetime(dt) => dt.to_string().into_bytes(),
        Value::Table(_) | Value::Array(_) => unreachable!("containers are directories"),
    }
}

impl TomlBackend {
    /// Parse a TOML file.
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let root: Value = text
            .parse()
            .map_err(|e| Error::InvalidSource(format!("cannot parse TOML file: {}", e)))?;
        Ok(Self {
            root,
            opened: Utc::now(),
        })
    }

    fn resolve(&self, path: &[String]) -> Result<&Value> {
        let mut node = &self.root;
        for part in path {
            node = match node {
                Value::Table(map) => map.get(part),
                Value::Array(items) => {
                    parse_index(part, items.len()).and_then(|index| items.get(index))
                }
                _ => None,
            }
            .ok_or_else(|| Error::not_found(path))?;
        }
        Ok(node)
    }
}

impl Backend for TomlBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        let node = self.resolve(path)?;
        Ok(match node {
            Value::Table(_) | Value::Array(_) => ResourceInfo::directory().with_mtime(self.opened),
            scalar => ResourceInfo::file(scalar_bytes(scalar).len() as u64, "text/plain")
                .with_mtime(self.opened),
        })
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        match self.resolve(path)? {
            Value::Table(map) => Ok(map.keys().cloned().collect()),
            Value::Array(items) => Ok((0..items.len()).map(|i| i.to_string()).collect()),
            _ => Err(Error::not_found(path)),
        }
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match self.resolve(path)? {
            Value::Table(_) | Value::Array(_) => Err(Error::not_found(path)),
            scalar => Ok(scalar_bytes(scalar)),
        }
    }
}
