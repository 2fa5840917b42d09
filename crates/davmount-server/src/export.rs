//! Recursive subtree exports.
//!
//! `?json` mirrors a directory as a JSON object; `?zip` packs a subtree
//! into a deflate-compressed archive. Both are fully materialised
//! before sending and bounded by the shared depth cap.

use crate::propfind::MAX_TREE_DEPTH;
use davmount_backend::{Backend, Error, Result};
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Text-ish bodies are exported as strings, everything else as base64.
fn is_text(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => ct.starts_with("text/") || ct.starts_with("application/json"),
        None => false,
    }
}

fn file_value(body: Vec<u8>, content_type: Option<&str>) -> serde_json::Value {
    if is_text(content_type) {
        serde_json::Value::String(String::from_utf8_lossy(&body).into_owned())
    } else {
        serde_json::Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            body,
        ))
    }
}

/// Build the JSON mirror of the subtree at `path`.
///
/// Directories become objects keyed by child name; files become
/// strings. The caller handles the file-target case separately (raw
/// body pass-through).
pub fn json_subtree(backend: &dyn Backend, path: &[String]) -> Result<serde_json::Value> {
    fn build(backend: &dyn Backend, path: &[String], depth: usize) -> Result<serde_json::Value> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::Read("subtree exceeds depth limit".to_string()));
        }
        let info = backend.info(path)?;
        if !info.is_dir() {
            let body = backend.get(path)?;
            return Ok(file_value(body, info.content_type.as_deref()));
        }
        let mut object = serde_json::Map::new();
        for name in backend.list(path)? {
            let mut child = path.to_vec();
            child.push(name.clone());
            object.insert(name, build(backend, &child, depth + 1)?);
        }
        Ok(serde_json::Value::Object(object))
    }
    build(backend, path, 0)
}

/// Pack the subtree at `path` into a ZIP archive. A file target
/// produces a single-entry archive named after its last segment.
pub fn zip_subtree(backend: &dyn Backend, path: &[String]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let info = backend.info(path)?;
    if !info.is_dir() {
        let name = path.last().map(String::as_str).unwrap_or("data");
        zip.start_file(name, options)?;
        zip.write_all(&backend.get(path)?)?;
    } else {
        recurse(backend, &mut zip, options, path, &[], 0)?;
    }
    Ok(zip.finish()?.into_inner())
}

fn recurse(
    backend: &dyn Backend,
    zip: &mut ZipWriter<std::io::Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    base: &[String],
    relative: &[String],
    depth: usize,
) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        return Err(Error::Read("subtree exceeds depth limit".to_string()));
    }
    for name in backend.list(&[base, relative].concat())? {
        let mut child_rel = relative.to_vec();
        child_rel.push(name);
        let child = [base, child_rel.as_slice()].concat();
        if backend.info(&child)?.is_dir() {
            recurse(backend, zip, options, base, &child_rel, depth + 1)?;
        } else {
            zip.start_file(child_rel.join("/"), options)?;
            zip.write_all(&backend.get(&child)?)?;
        }
    }
    Ok(())
}
