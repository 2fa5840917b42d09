//! CSV file backend.
//!
//! The root holds `_headers.txt` (one column name per line) and one
//! `row_NNNN.json` file per record, zero-padded to the width of the
//! largest index; the body is a JSON object keyed by header name.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

const HEADERS_FILE: &str = "_headers.txt";

/// Backend over a CSV file with a header row.
pub struct CsvBackend {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    width: usize,
    opened: DateTime<Utc>,
}

fn pad_width(count: usize) -> usize {
    count.to_string().len().max(4)
}

impl CsvBackend {
    /// Read and index a CSV file.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| Error::InvalidSource(format!("cannot read CSV file: {}", e)))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::InvalidSource(format!("cannot read CSV headers: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| Error::InvalidSource(format!("corrupt CSV record: {}", e)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        let width = pad_width(rows.len());
        Ok(Self {
            headers,
            rows,
            width,
            opened: Utc::now(),
        })
    }

    fn row_file_name(&self, index: usize) -> String {
        format!("row_{:0width$}.json", index, width = self.width)
    }

    /// Parse `row_NNNN.json`, accepting only the exact padded spelling.
    fn parse_row_name(&self, name: &str) -> Option<usize> {
        let index: usize = name.strip_prefix("row_")?.strip_suffix(".json")?.parse().ok()?;
        (index < self.rows.len() && self.row_file_name(index) == name).then_some(index)
    }

    fn headers_bytes(&self) -> Vec<u8> {
        self.headers.join("\n").into_bytes()
    }

    fn row_json(&self, index: usize) -> Result<Vec<u8>> {
        let row = &self.rows[index];
        let mut object = serde_json::Map::new();
        for (column, header) in self.headers.iter().enumerate() {
            let value = row.get(column).cloned().unwrap_or_default();
            object.insert(header.clone(), serde_json::Value::String(value));
        }
        Ok(serde_json::to_vec(&serde_json::Value::Object(object))?)
    }
}

impl Backend for CsvBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        match path {
            [] => Ok(ResourceInfo::directory().with_mtime(self.opened)),
            [name] if name.as_str() == HEADERS_FILE => Ok(ResourceInfo::file(
                self.headers_bytes().len() as u64,
                "text/plain",
            )
            .with_mtime(self.opened)),
            [name] => match self.parse_row_name(name) {
                Some(index) => {
                    let body = self.row_json(index)?;
                    Ok(ResourceInfo::file(body.len() as u64, "application/json")
                        .with_mtime(self.opened))
                }
                None => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        if !path.is_empty() {
            return Err(Error::not_found(path));
        }
        let mut names = vec![HEADERS_FILE.to_string()];
        names.extend((0..self.rows.len()).map(|index| self.row_file_name(index)));
        Ok(names)
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match path {
            [name] if name.as_str() == HEADERS_FILE => Ok(self.headers_bytes()),
            [name] => match self.parse_row_name(name) {
                Some(index) => self.row_json(index),
                None => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }
}
