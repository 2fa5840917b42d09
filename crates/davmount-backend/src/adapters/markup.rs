//! XML and HTML backends over a shared element tree.
//!
//! Elements become directories. Inside an element directory: `_text`
//! (non-whitespace text, collapsed per element), `_attribs.json` (the
//! attribute map) when present, and one directory per child element.
//! Tags repeated under one parent are disambiguated as `tag_0`,
//! `tag_1`, … in document order; unique tags keep their bare name. An
//! element child whose name would collide with a synthetic file gets a
//! numeric suffix; the synthetic name itself is never changed.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const TEXT_FILE: &str = "_text";
const ATTRIBS_FILE: &str = "_attribs.json";

struct Element {
    text: Option<String>,
    attribs: Vec<(String, String)>,
    children: Vec<(String, Element)>,
}

/// Backend over a parsed XML or HTML document.
pub struct MarkupBackend {
    // Virtual node above the document element, so the backend root
    // lists one directory named after the root tag.
    root: Element,
    opened: DateTime<Utc>,
}

/// Assign final child names: duplicate-tag suffixes first, then bump
/// anything that still collides with a synthetic file or a sibling.
fn assign_names(children: Vec<(String, Element)>) -> Vec<(String, Element)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (tag, _) in &children {
        *counts.entry(tag.clone()).or_insert(0) += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();

    children
        .into_iter()
        .map(|(tag, element)| {
            let mut name = if counts[&tag] > 1 {
                let next = seen.entry(tag.clone()).or_insert(0);
                let name = format!("{}_{}", tag, next);
                *next += 1;
                name
            } else {
                tag
            };
            let base = name.clone();
            let mut bump = 0;
            while name == TEXT_FILE || name == ATTRIBS_FILE || used.contains(&name) {
                name = format!("{}_{}", base, bump);
                bump += 1;
            }
            used.insert(name.clone());
            (name, element)
        })
        .collect()
}

fn append_text(buffer: &mut String, piece: &str) {
    let piece = piece.trim();
    if piece.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push(' ');
    }
    buffer.push_str(piece);
}

struct Frame {
    tag: String,
    attribs: Vec<(String, String)>,
    text: String,
    children: Vec<(String, Element)>,
}

impl Frame {
    fn finish(self) -> (String, Element) {
        (
            self.tag,
            Element {
                text: (!self.text.is_empty()).then_some(self.text),
                attribs: self.attribs,
                children: assign_names(self.children),
            },
        )
    }
}

fn frame_from(start: &quick_xml::events::BytesStart<'_>) -> Result<Frame> {
    let tag = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attribs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attribs.push((key, value));
    }
    Ok(Frame {
        tag,
        attribs,
        text: String::new(),
        children: Vec::new(),
    })
}

impl MarkupBackend {
    /// Parse an XML file.
    pub fn open_xml(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidSource(format!("cannot read XML file: {}", e)))?;
        Self::from_xml_str(&text)
            .map_err(|e| Error::InvalidSource(format!("cannot parse XML file: {}", e)))
    }

    fn from_xml_str(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);

        let mut stack = vec![Frame {
            tag: String::new(),
            attribs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }];

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(frame_from(&e)?),
                Event::Empty(e) => {
                    let child = frame_from(&e)?.finish();
                    stack.last_mut().expect("virtual root").children.push(child);
                }
                Event::End(_) => {
                    if stack.len() < 2 {
                        return Err(Error::Read("unbalanced end tag".to_string()));
                    }
                    let child = stack.pop().expect("checked depth").finish();
                    stack.last_mut().expect("checked depth").children.push(child);
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    if let Some(frame) = stack.last_mut() {
                        append_text(&mut frame.text, &text);
                    }
                }
                Event::CData(t) => {
                    let raw = t.into_inner();
                    if let Some(frame) = stack.last_mut() {
                        append_text(&mut frame.text, &String::from_utf8_lossy(&raw));
                    }
                }
                Event::Eof => break,
                // Declarations, comments, doctypes and PIs carry no tree content.
                _ => {}
            }
        }

        let (_, root) = stack.pop().expect("virtual root").finish();
        if root.children.is_empty() {
            return Err(Error::Read("document has no root element".to_string()));
        }
        Ok(Self {
            root,
            opened: Utc::now(),
        })
    }

    /// Parse an HTML file leniently.
    pub fn open_html(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidSource(format!("cannot read HTML file: {}", e)))?;
        let document = scraper::Html::parse_document(&text);

        let mut children = Vec::new();
        for child in document.tree.root().children() {
            if let Some(element) = html_element(child) {
                children.push(element);
            }
        }
        Ok(Self {
            root: Element {
                text: None,
                attribs: Vec::new(),
                children: assign_names(children),
            },
            opened: Utc::now(),
        })
    }

    fn resolve(&self, path: &[String]) -> Result<&Element> {
        let mut node = &self.root;
        for part in path {
            if part.as_str() == TEXT_FILE || part.as_str() == ATTRIBS_FILE {
                return Err(Error::not_found(path));
            }
            node = node
                .children
                .iter()
                .find(|(name, _)| name == part)
                .map(|(_, element)| element)
                .ok_or_else(|| Error::not_found(path))?;
        }
        Ok(node)
    }
}

fn html_element(node: ego_tree::NodeRef<'_, scraper::Node>) -> Option<(String, Element)> {
    let element = match node.value() {
        scraper::Node::Element(element) => element,
        _ => return None,
    };
    let tag = element.name().to_string();
    let attribs: Vec<(String, String)> = element
        .attrs()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let mut text = String::new();
    let mut children = Vec::new();
    for child in node.children() {
        match child.value() {
            scraper::Node::Text(piece) => append_text(&mut text, &piece),
            _ => {
                if let Some(element) = html_element(child) {
                    children.push(element);
                }
            }
        }
    }
    Some((
        tag,
        Element {
            text: (!text.is_empty()).then_some(text),
            attribs,
            children: assign_names(children),
        },
    ))
}

fn attribs_json(element: &Element) -> Result<Vec<u8>> {
    let mut object = serde_json::Map::new();
    for (key, value) in &element.attribs {
        object.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    Ok(serde_json::to_vec_pretty(&serde_json::Value::Object(
        object,
    ))?)
}

impl Backend for MarkupBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        if let Some((last, parent)) = path.split_last() {
            if last.as_str() == TEXT_FILE {
                let element = self.resolve(parent)?;
                let text = element.text.as_ref().ok_or_else(|| Error::not_found(path))?;
                return Ok(ResourceInfo::file(text.len() as u64, "text/plain")
                    .with_mtime(self.opened));
            }
            if last.as_str() == ATTRIBS_FILE {
                let element = self.resolve(parent)?;
                if element.attribs.is_empty() {
                    return Err(Error::not_found(path));
                }
                let body = attribs_json(element)?;
                return Ok(ResourceInfo::file(body.len() as u64, "application/json")
                    .with_mtime(self.opened));
            }
        }
        self.resolve(path)?;
        Ok(ResourceInfo::directory().with_mtime(self.opened))
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        let element = self.resolve(path)?;
        let mut names = Vec::new();
        if element.text.is_some() {
            names.push(TEXT_FILE.to_string());
        }
        if !element.attribs.is_empty() {
            names.push(ATTRIBS_FILE.to_string());
        }
        names.extend(element.children.iter().map(|(name, _)| name.clone()));
        Ok(names)
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        if let Some((last, parent)) = path.split_last() {
            if last.as_str() == TEXT_FILE {
                let element = self.resolve(parent)?;
                let text = element.text.as_ref().ok_or_else(|| Error::not_found(path))?;
                return Ok(text.clone().into_bytes());
            }
            if last.as_str() == ATTRIBS_FILE {
                let element = self.resolve(parent)?;
                if element.attribs.is_empty() {
                    return Err(Error::not_found(path));
                }
                return attribs_json(element);
            }
        }
        Err(Error::not_found(path))
    }
}
