//! In-memory reference backend backed by a nested map.
//!
//! Interior nodes are directories, leaves are byte buffers. Used as the
//! frontend's reference backend in tests.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One node of the in-memory tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// Directory with named children.
    Dir(BTreeMap<String, Node>),
    /// File body.
    File(Vec<u8>),
}

impl Node {
    /// Build a directory node from `(name, child)` pairs.
    pub fn dir<N: Into<String>>(entries: impl IntoIterator<Item = (N, Node)>) -> Node {
        Node::Dir(
            entries
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        )
    }

    /// Build a file node.
    pub fn file(body: impl Into<Vec<u8>>) -> Node {
        Node::File(body.into())
    }
}

/// Backend over an in-memory [`Node`] tree.
pub struct MemoryBackend {
    root: Node,
    opened: DateTime<Utc>,
}

impl MemoryBackend {
    /// Wrap a node tree. The root should be a [`Node::Dir`].
    pub fn new(root: Node) -> Self {
        Self {
            root,
            opened: Utc::now(),
        }
    }

    fn resolve(&self, path: &[String]) -> Result<&Node> {
        let mut node = &self.root;
        for part in path {
            match node {
                Node::Dir(children) => {
                    node = children.get(part).ok_or_else(|| Error::not_found(path))?;
                }
                Node::File(_) => return Err(Error::not_found(path)),
            }
        }
        Ok(node)
    }
}

impl Backend for MemoryBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        Ok(match self.resolve(path)? {
            Node::Dir(_) => ResourceInfo::directory().with_mtime(self.opened),
            Node::File(body) => {
                ResourceInfo::file(body.len() as u64, "text/plain").with_mtime(self.opened)
            }
        })
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        match self.resolve(path)? {
            Node::Dir(children) => Ok(children.keys().cloned().collect()),
            Node::File(_) => Err(Error::not_found(path)),
        }
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match self.resolve(path)? {
            Node::Dir(_) => Err(Error::not_found(path)),
            Node::File(body) => Ok(body.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryBackend {
        MemoryBackend::new(Node::dir([
            ("hello.txt", Node::file("Hello, world!")),
            ("empty.txt", Node::file("")),
            (
                "docs",
                Node::dir([
                    ("guide.txt", Node::file("A guide to things")),
                    ("nested", Node::dir([("deep.txt", Node::file("Deep"))])),
                ]),
            ),
        ]))
    }

    fn p(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn root_is_directory() {
        assert!(sample().info(&[]).unwrap().is_dir());
    }

    #[test]
    fn list_is_sorted_and_distinct() {
        let names = sample().list(&[]).unwrap();
        assert_eq!(names, vec!["docs", "empty.txt", "hello.txt"]);
    }

    #[test]
    fn get_matches_info_size() {
        let backend = sample();
        let path = p(&["hello.txt"]);
        let body = backend.get(&path).unwrap();
        assert_eq!(body, b"Hello, world!");
        assert_eq!(backend.info(&path).unwrap().size, Some(body.len() as u64));
    }

    #[test]
    fn nested_lookup() {
        let backend = sample();
        assert_eq!(
            backend.get(&p(&["docs", "nested", "deep.txt"])).unwrap(),
            b"Deep"
        );
    }

    #[test]
    fn wrong_kind_is_not_found() {
        let backend = sample();
        assert!(backend.get(&p(&["docs"])).unwrap_err().is_not_found());
        assert!(backend
            .list(&p(&["hello.txt"]))
            .unwrap_err()
            .is_not_found());
        assert!(backend.info(&p(&["missing"])).unwrap_err().is_not_found());
    }
}
