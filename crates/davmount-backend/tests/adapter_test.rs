//! Cross-adapter tests: the universal tree invariants plus per-format
//! fixtures built on the fly.

use davmount_backend::{Backend, BackendKind, MemoryBackend, Node};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn p(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Walk the whole tree checking the backend contract:
/// distinct stable listings, info/list/get kind agreement, size
/// equality, and not-found for absent names.
fn check_invariants(backend: &dyn Backend) {
    assert!(backend.info(&[]).unwrap().is_dir(), "root must be a directory");
    let mut path = Vec::new();
    walk(backend, &mut path, 0);
}

fn walk(backend: &dyn Backend, path: &mut Vec<String>, depth: usize) {
    assert!(depth < 64, "fixture tree unexpectedly deep at {:?}", path);

    let children = backend.list(path).unwrap();
    let distinct: HashSet<&String> = children.iter().collect();
    assert_eq!(distinct.len(), children.len(), "duplicate names in {:?}", path);
    assert_eq!(
        children,
        backend.list(path).unwrap(),
        "unstable listing in {:?}",
        path
    );

    for name in children {
        path.push(name);
        let info = backend.info(path).unwrap();
        if info.is_dir() {
            assert!(info.size.is_none(), "directory with size at {:?}", path);
            assert!(
                backend.get(path).unwrap_err().is_not_found(),
                "get on directory must fail at {:?}",
                path
            );
            walk(backend, path, depth + 1);
        } else {
            let body = backend.get(path).unwrap();
            assert_eq!(
                Some(body.len() as u64),
                info.size,
                "size mismatch at {:?}",
                path
            );
            assert_eq!(body, backend.get(path).unwrap(), "unstable body at {:?}", path);
            assert!(
                backend.list(path).unwrap_err().is_not_found(),
                "list on file must fail at {:?}",
                path
            );
        }
        path.pop();
    }

    path.push("no_such_entry_here.bin".to_string());
    assert!(backend.info(path).unwrap_err().is_not_found());
    path.pop();
}

fn write_fixture(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(content).unwrap();
    path
}

fn open(kind: BackendKind, path: &Path) -> Box<dyn Backend> {
    kind.open(Some(path)).unwrap()
}

// --- ZIP ---

fn build_zip(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.zip");
    let file = File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("a.txt", options).unwrap();
    zip.write_all(b"hi\n").unwrap();
    zip.add_directory("explicit", options).unwrap();
    zip.start_file("sub/b.txt", options).unwrap();
    zip.write_all(b"bytes").unwrap();
    zip.finish().unwrap();
    path
}

#[test]
fn zip_tree_shape() {
    let dir = TempDir::new().unwrap();
    let backend = open(BackendKind::Zip, &build_zip(dir.path()));

    assert_eq!(backend.list(&[]).unwrap(), vec!["a.txt", "explicit", "sub"]);
    let info = backend.info(&p(&["a.txt"])).unwrap();
    assert_eq!(info.size, Some(3));
    assert_eq!(info.content_type.as_deref(), Some("text/plain"));
    assert!(info.mtime.is_some());
    assert!(backend.info(&p(&["sub"])).unwrap().is_dir());
    assert_eq!(backend.get(&p(&["sub", "b.txt"])).unwrap(), b"bytes");
    check_invariants(backend.as_ref());
}

#[test]
fn zip_close_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let backend = open(BackendKind::Zip, &build_zip(dir.path()));
    backend.close();
    backend.close();
    // The index survives close; only reads need the file handle.
    assert!(backend.info(&p(&["a.txt"])).is_ok());
    assert!(backend.get(&p(&["a.txt"])).is_err());
}

#[test]
fn zip_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "broken.zip", b"this is not a zip archive");
    assert!(BackendKind::Zip.open(Some(&path)).is_err());
}

// --- TAR ---

fn append_tar_file<W: Write>(builder: &mut tar::Builder<W>, name: &str, content: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(1_700_000_000);
    header.set_cksum();
    builder.append_data(&mut header, name, content).unwrap();
}

#[test]
fn tar_tree_shape() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.tar");
    let mut builder = tar::Builder::new(File::create(&path).unwrap());
    append_tar_file(&mut builder, "a.txt", b"hi\n");
    append_tar_file(&mut builder, "sub/b.txt", b"bytes");
    builder.finish().unwrap();

    let backend = open(BackendKind::Tar, &path);
    assert_eq!(backend.list(&[]).unwrap(), vec!["a.txt", "sub"]);
    let info = backend.info(&p(&["a.txt"])).unwrap();
    assert_eq!(info.size, Some(3));
    assert_eq!(
        info.mtime.unwrap().timestamp(),
        1_700_000_000,
        "mtime comes from the entry header"
    );
    check_invariants(backend.as_ref());
}

#[test]
fn tar_gz_is_transparent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.tar.gz");
    let gz = flate2::write::GzEncoder::new(File::create(&path).unwrap(), Default::default());
    let mut builder = tar::Builder::new(gz);
    append_tar_file(&mut builder, "inner.txt", b"compressed");
    builder.into_inner().unwrap().finish().unwrap();

    let backend = open(BackendKind::Tar, &path);
    assert_eq!(backend.get(&p(&["inner.txt"])).unwrap(), b"compressed");
    check_invariants(backend.as_ref());
}

// --- SQLite ---

#[test]
fn sqlite_tables_rows_and_schema() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fixture.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE t(id int, name text)", []).unwrap();
        conn.execute("INSERT INTO t VALUES (1, 'x')", []).unwrap();
    }

    let backend = open(BackendKind::Sqlite, &path);
    assert_eq!(backend.list(&[]).unwrap(), vec!["t"]);
    assert_eq!(
        backend.list(&p(&["t"])).unwrap(),
        vec!["_schema.sql", "row_1.json"]
    );
    assert_eq!(
        backend.get(&p(&["t", "_schema.sql"])).unwrap(),
        b"CREATE TABLE t(id int, name text)"
    );
    assert_eq!(
        backend.get(&p(&["t", "row_1.json"])).unwrap(),
        br#"{"id":1,"name":"x"}"#
    );
    check_invariants(backend.as_ref());
}

#[test]
fn sqlite_value_types_serialise() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("types.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE v(i int, f real, s text, n text, b blob)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO v VALUES (7, 1.5, 'txt', NULL, x'00ff')",
            [],
        )
        .unwrap();
    }

    let backend = open(BackendKind::Sqlite, &path);
    let body = backend.get(&p(&["v", "row_1.json"])).unwrap();
    let row: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(row["i"], 7);
    assert_eq!(row["f"], 1.5);
    assert_eq!(row["s"], "txt");
    assert!(row["n"].is_null());
    assert_eq!(row["b"], "AP8=");
}

#[test]
fn sqlite_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "broken.db", b"definitely not sqlite");
    assert!(BackendKind::Sqlite.open(Some(&path)).is_err());
}

// --- Remaining formats, via the shared invariant walker ---

#[test]
fn json_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "fixture.json",
        br#"{"k":42,"sub":{"x":"y"},"list":[1,2,3]}"#,
    );
    let backend = open(BackendKind::Json, &path);
    assert_eq!(backend.get(&p(&["k"])).unwrap(), b"42");
    assert!(backend.info(&p(&["sub"])).unwrap().is_dir());
    check_invariants(backend.as_ref());
}

#[test]
fn toml_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "fixture.toml",
        b"name = \"demo\"\n\n[server]\nport = 8080\ntags = [\"a\", \"b\"]\n",
    );
    check_invariants(open(BackendKind::Toml, &path).as_ref());
}

#[test]
fn csv_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "fixture.csv", b"h1,h2\nr1a,r1b\nr2a,r2b\n");
    check_invariants(open(BackendKind::Csv, &path).as_ref());
}

#[test]
fn ini_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "fixture.ini", b"[sec]\nkey = value\nempty =\n");
    check_invariants(open(BackendKind::Ini, &path).as_ref());
}

#[test]
fn xml_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "fixture.xml",
        br#"<r a="1"><i>a</i><i>b</i><solo>text</solo></r>"#,
    );
    let backend = open(BackendKind::Xml, &path);
    assert_eq!(backend.list(&p(&["r"])).unwrap().len(), 4); // _attribs.json, i_0, i_1, solo
    check_invariants(backend.as_ref());
}

#[test]
fn html_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "fixture.html",
        b"<html><head><title>T</title></head><body><p class=\"x\">one</p><p>two</p></body></html>",
    );
    let backend = open(BackendKind::Html, &path);
    assert_eq!(backend.list(&[]).unwrap(), vec!["html"]);
    assert_eq!(
        backend.get(&p(&["html", "head", "title", "_text"])).unwrap(),
        b"T"
    );
    check_invariants(backend.as_ref());
}

#[test]
fn mailbox_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "fixture.mbox",
        b"From a@b Thu Jan  1 00:00:00 2026\nSubject: One\n\nbody one\n\
From c@d Thu Jan  2 00:00:00 2026\nSubject: Two\n\nbody two\n",
    );
    let backend = open(BackendKind::Mailbox, &path);
    assert_eq!(backend.list(&[]).unwrap().len(), 2);
    check_invariants(backend.as_ref());
}

#[test]
fn ast_invariants() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "fixture.py",
        b"def f():\n    return 1\n\nclass C:\n    def m(self):\n        pass\n",
    );
    let backend = open(BackendKind::Ast, &path);
    assert_eq!(backend.list(&[]).unwrap(), vec!["C", "f.src"]);
    check_invariants(backend.as_ref());
}

#[test]
fn memory_invariants() {
    let backend = MemoryBackend::new(Node::dir([
        ("a.txt", Node::file("alpha")),
        ("sub", Node::dir([("b.txt", Node::file("beta"))])),
    ]));
    check_invariants(&backend);
}
