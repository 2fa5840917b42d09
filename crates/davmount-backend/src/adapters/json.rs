//! JSON document backend.
//!
//! Objects become directories keyed by member name, arrays become
//! directories with decimal indices `0…n-1`, scalars become
//! `text/plain` files holding the value's textual form.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;

/// Backend over a parsed JSON document.
pub struct JsonBackend {
    root: Value,
    opened: DateTime<Utc>,
}

/// Index lookup for array children; rejects aliases like `01`.
pub(crate) fn parse_index(segment: &str, len: usize) -> Option<usize> {
    let index: usize = segment.parse().ok()?;
    (index < len && index.to_string() == segment).then_some(index)
}

/// Textual form of a scalar: `null`, `true`/`false`, the number
/// literal, or the raw string bytes.
pub(crate) fn scalar_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => b"null".to_vec(),
        Value::Bool(true) => b"true".to_vec(),
        Value::Bool(false) => b"false".to_vec(),
        Value::Number(n) => n.to_string().into_bytes(),
        Value::String(s) => s.clone().into_bytes(),
        Value::Object(_) | Value::Array(_) => unreachable!("containers are directories"),
    }
}

impl JsonBackend {
    /// Parse a JSON file. The document root must be an object or array.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let root: Value = serde_json::from_slice(&data)
            .map_err(|e| Error::InvalidSource(format!("cannot parse JSON file: {}", e)))?;
        if !matches!(root, Value::Object(_) | Value::Array(_)) {
            return Err(Error::InvalidSource(
                "JSON root must be an object or array".to_string(),
            ));
        }
        Ok(Self {
            root,
            opened: Utc::now(),
        })
    }

    fn resolve(&self, path: &[String]) -> Result<&Value> {
        let mut node = &self.root;
        for part in path {
            node = match node {
                Value::Object(map) => map.get(part),
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

impl Backend for JsonBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        let node = self.resolve(path)?;
        Ok(match node {
            Value::Object(_) | Value::Array(_) => ResourceInfo::directory().with_mtime(self.opened),
            scalar => ResourceInfo::file(scalar_bytes(scalar).len() as u64, "text/plain")
                .with_mtime(self.opened),
        })
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        match self.resolve(path)? {
            Value::Object(map) => Ok(map.keys().cloned().collect()),
            Value::Array(items) => Ok((0..items.len()).map(|i| i.to_string()).collect()),
            _ => Err(Error::not_found(path)),
        }
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match self.resolve(path)? {
            Value::Object(_) | Value::Array(_) => Err(Error::not_found(path)),
            scalar => Ok(scalar_bytes(scalar)),
        }
    }
}
