//! Source structure backend for Python files.
//!
//! The root holds one `<name>.src` file per top-level function and one
//! directory per top-level class; a class directory holds one file per
//! method. File bodies are the verbatim source span of the definition.
//!
//! The scanner is indentation-based: a definition runs from its
//! `def`/`class` line to the next non-blank line at or below the
//! definition's indent level, with trailing blank lines trimmed.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

const SOURCE_EXT: &str = ".src";

enum AstEntry {
    Function(Vec<u8>),
    Class(BTreeMap<String, Vec<u8>>),
}

/// Backend over the top-level structure of a Python source file.
pub struct AstBackend {
    entries: BTreeMap<String, AstEntry>,
    opened: DateTime<Utc>,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Name of the function or class defined on `line`, if any.
fn definition_name(line: &str) -> Option<(&'static str, String)> {
    let trimmed = line.trim_start();
    let (keyword, rest) = if let Some(rest) = trimmed.strip_prefix("def ") {
        ("def", rest)
    } else if let Some(rest) = trimmed.strip_prefix("async def ") {
        ("def", rest)
    } else if let Some(rest) = trimmed.strip_prefix("class ") {
        ("class", rest)
    } else {
        return None;
    };
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some((keyword, name))
}

/// Index of the line after the definition block starting at `start`.
fn block_end(lines: &[&str], start: usize, indent: usize) -> usize {
    let mut end = start + 1;
    while end < lines.len() && (is_blank(lines[end]) || indent_of(lines[end]) > indent) {
        end += 1;
    }
    // Trailing blank lines belong to the enclosing scope.
    while end > start + 1 && is_blank(lines[end - 1]) {
        end -= 1;
    }
    end
}

fn span_bytes(lines: &[&str], start: usize, end: usize, dedent: usize) -> Vec<u8> {
    let mut out = String::new();
    for line in &lines[start..end] {
        if is_blank(line) {
            out.push('\n');
        } else {
            out.push_str(&line[dedent.min(indent_of(line))..]);
            out.push('\n');
        }
    }
    out.into_bytes()
}

fn scan_methods(lines: &[&str], start: usize, end: usize) -> BTreeMap<String, Vec<u8>> {
    let mut methods = BTreeMap::new();
    // The class body indent is set by its first non-blank line.
    let body_indent = (start..end)
        .find(|i| !is_blank(lines[*i]))
        .map(|i| indent_of(lines[i]));
    let body_indent = match body_indent {
        Some(indent) if indent > 0 => indent,
        _ => return methods,
    };

    let mut line = start;
    while line < end {
        if !is_blank(lines[line]) && indent_of(lines[line]) == body_indent {
            if let Some(("def", name)) = definition_name(lines[line]) {
                let method_end = block_end(&lines[..end], line, body_indent);
                methods.insert(
                    format!("{}{}", name, SOURCE_EXT),
                    span_bytes(lines, line, method_end, body_indent),
                );
                line = method_end;
                continue;
            }
        }
        line += 1;
    }
    methods
}

impl AstBackend {
    /// Read and scan a Python source file.
    pub fn open(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidSource(format!("cannot read source file: {}", e)))?;
        Ok(Self::from_source(&source))
    }

    fn from_source(source: &str) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        let mut entries = BTreeMap::new();

        let mut line = 0;
        while line < lines.len() {
            if !is_blank(lines[line]) && indent_of(lines[line]) == 0 {
                if let Some((keyword, name)) = definition_name(lines[line]) {
                    let end = block_end(&lines, line, 0);
                    match keyword {
                        "def" => {
                            entries.insert(
                                format!("{}{}", name, SOURCE_EXT),
                                AstEntry::Function(span_bytes(&lines, line, end, 0)),
                            );
                        }
                        _ => {
                            entries.insert(
                                name,
                                AstEntry::Class(scan_methods(&lines, line + 1, end)),
                            );
                        }
                    }
                    line = end;
                    continue;
                }
            }
            line += 1;
        }

        Self {
            entries,
            opened: Utc::now(),
        }
    }
}

impl Backend for AstBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        match path {
            [] => Ok(ResourceInfo::directory().with_mtime(self.opened)),
            [name] => match self.entries.get(name) {
                Some(AstEntry::Function(body)) => {
                    Ok(ResourceInfo::file(body.len() as u64, "text/plain")
                        .with_mtime(self.opened))
                }
                Some(AstEntry::Class(_)) => Ok(ResourceInfo::directory().with_mtime(self.opened)),
                None => Err(Error::not_found(path)),
            },
            [class, method] => match self.entries.get(class) {
                Some(AstEntry::Class(methods)) => match methods.get(method) {
                    Some(body) => Ok(ResourceInfo::file(body.len() as u64, "text/plain")
                        .with_mtime(self.opened)),
                    None => Err(Error::not_found(path)),
                },
                _ => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        match path {
            [] => Ok(self.entries.keys().cloned().collect()),
            [name] => match self.entries.get(name) {
                Some(AstEntry::Class(methods)) => Ok(methods.keys().cloned().collect()),
                _ => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match path {
            [name] => match self.entries.get(name) {
                Some(AstEntry::Function(body)) => Ok(body.clone()),
                _ => Err(Error::not_found(path)),
            },
            [class, method] => match self.entries.get(class) {
                Some(AstEntry::Class(methods)) => methods
                    .get(method)
                    .cloned()
                    .ok_or_else(|| Error::not_found(path)),
                _ => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }
}
