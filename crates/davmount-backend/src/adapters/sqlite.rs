//! SQLite database backend.
//!
//! The root lists one directory per table. Each table directory holds a
//! synthetic `_schema.sql` file with the verbatim `CREATE TABLE`
//! statement plus one `row_<rowid>.json` file per row, the body being
//! the row as a JSON object keyed by column name.
//!
//! Table names, column order and rowids are indexed at construction so
//! `info` and `list` stay cheap; row bodies are fetched by rowid on
//! demand. The single connection is not thread-safe and is serialised
//! behind a mutex.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA_FILE: &str = "_schema.sql";

struct Table {
    schema: Vec<u8>,
    columns: Vec<String>,
    rowids: Vec<i64>,
    rowid_set: HashSet<i64>,
}

/// Backend over a SQLite database file.
pub struct SqliteBackend {
    conn: Mutex<Option<Connection>>,
    tables: BTreeMap<String, Table>,
    opened: DateTime<Utc>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn row_file_name(rowid: i64) -> String {
    format!("row_{}.json", rowid)
}

/// Parse `row_<rowid>.json`, rejecting aliases like `row_01.json`.
fn parse_row_name(name: &str) -> Option<i64> {
    let rowid: i64 = name.strip_prefix("row_")?.strip_suffix(".json")?.parse().ok()?;
    (row_file_name(rowid) == name).then_some(rowid)
}

fn json_value(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(v) => serde_json::Value::from(v),
        ValueRef::Real(v) => serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(v) => serde_json::Value::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => serde_json::Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            v,
        )),
    }
}

impl SqliteBackend {
    /// Open a database read-only and index its tables.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| Error::InvalidSource(format!("cannot open sqlite database: {}", e)))?;

        let names: Vec<(String, Option<String>)> = {
            let mut stmt = conn
                .prepare("SELECT name, sql FROM sqlite_master WHERE type='table' ORDER BY name")
                .map_err(|e| Error::InvalidSource(format!("cannot read schema: {}", e)))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(|e| Error::InvalidSource(format!("cannot read schema: {}", e)))?;
            rows.collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::InvalidSource(format!("cannot read schema: {}", e)))?
        };

        let mut tables = BTreeMap::new();
        for (name, sql) in names {
            let mut columns = Vec::new();
            {
                let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(&name)))?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
                for column in rows {
                    columns.push(column?);
                }
            }

            // `WITHOUT ROWID` tables have no rowid column; they degrade
            // to a schema-only directory.
            let mut rowids = Vec::new();
            if let Ok(mut stmt) = conn.prepare(&format!("SELECT rowid FROM {}", quote_ident(&name)))
            {
                let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
                for rowid in rows {
                    rowids.push(rowid?);
                }
            } else {
                debug!("table {} has no rowid, exposing schema only", name);
            }

            let rowid_set = rowids.iter().copied().collect();
            tables.insert(
                name,
                Table {
                    schema: sql.unwrap_or_default().into_bytes(),
                    columns,
                    rowids,
                    rowid_set,
                },
            );
        }

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            tables,
            opened: Utc::now(),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::Read("database handle closed".to_string()))?;
        f(conn)
    }

    fn row_json(&self, table: &str, rowid: i64) -> Result<Vec<u8>> {
        let columns = &self.tables[table].columns;
        self.with_conn(|conn| {
            let sql = format!("SELECT * FROM {} WHERE rowid = ?1", quote_ident(table));
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![rowid])?;
            let row = rows.next()?.ok_or_else(|| {
                Error::NotFound(format!("/{}/{}", table, row_file_name(rowid)))
            })?;
            let mut object = serde_json::Map::new();
            for (index, column) in columns.iter().enumerate() {
                object.insert(column.clone(), json_value(row.get_ref(index)?));
            }
            Ok(serde_json::to_vec(&serde_json::Value::Object(object))?)
        })
    }
}

impl Backend for SqliteBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        match path {
            [] => Ok(ResourceInfo::directory().with_mtime(self.opened)),
            [table] if self.tables.contains_key(table) => {
                Ok(ResourceInfo::directory().with_mtime(self.opened))
            }
            [table, name] => {
                let entry = self.tables.get(table).ok_or_else(|| Error::not_found(path))?;
                if name.as_str() == SCHEMA_FILE {
                    return Ok(
                        ResourceInfo::file(entry.schema.len() as u64, "text/plain")
                            .with_mtime(self.opened),
                    );
                }
                match parse_row_name(name) {
                    Some(rowid) if entry.rowid_set.contains(&rowid) => {
                        let body = self.row_json(table, rowid)?;
                        Ok(ResourceInfo::file(body.len() as u64, "application/json")
                            .with_mtime(self.opened))
                    }
                    _ => Err(Error::not_found(path)),
                }
            }
            _ => Err(Error::not_found(path)),
        }
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        match path {
            [] => Ok(self.tables.keys().cloned().collect()),
            [table] => {
                let entry = self.tables.get(table).ok_or_else(|| Error::not_found(path))?;
                let mut names = vec![SCHEMA_FILE.to_string()];
                names.extend(entry.rowids.iter().map(|rowid| row_file_name(*rowid)));
                Ok(names)
            }
            _ => Err(Error::not_found(path)),
        }
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match path {
            [table, name] => {
                let entry = self.tables.get(table).ok_or_else(|| Error::not_found(path))?;
                if name.as_str() == SCHEMA_FILE {
                    return Ok(entry.schema.clone());
                }
                match parse_row_name(name) {
                    Some(rowid) if entry.rowid_set.contains(&rowid) => self.row_json(table, rowid),
                    _ => Err(Error::not_found(path)),
                }
            }
            _ => Err(Error::not_found(path)),
        }
    }

    fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(conn) = guard.take() {
            if let Err((_, e)) = conn.close() {
                debug!("sqlite close failed: {}", e);
            }
        }
    }
}
