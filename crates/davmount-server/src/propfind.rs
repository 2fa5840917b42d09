//! PROPFIND enumeration and multistatus rendering.
//!
//! The multistatus body is assembled as XML writer events and
//! serialised once; text content is escaped by the writer.

use crate::path::{display_name, to_href};
use davmount_backend::{Backend, ResourceInfo};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Bound on pathological tree depth during Depth: infinity walks.
pub(crate) const MAX_TREE_DEPTH: usize = 1024;

/// The five properties the server reports.
const SUPPORTED_PROPS: &[&str] = &[
    "displayname",
    "getcontentlength",
    "getcontenttype",
    "resourcetype",
    "getlastmodified",
];

/// Recursion selected by the `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    /// Parse a `Depth` header value. The default when the header is
    /// absent is `infinity`, per RFC 4918.
    pub fn parse(header: Option<&str>) -> Option<Depth> {
        match header {
            None => Some(Depth::Infinity),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "0" => Some(Depth::Zero),
                "1" => Some(Depth::One),
                "infinity" => Some(Depth::Infinity),
                _ => None,
            },
        }
    }
}

/// Property selection from the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropRequest {
    /// Empty body, empty propfind, or `allprop`.
    All,
    /// Explicit `prop` list of local names.
    Named(Vec<String>),
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Parse a PROPFIND request body. `None` means the body is not
/// well-formed XML and the request should be rejected with 400.
pub fn parse_propfind(body: &[u8]) -> Option<PropRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(PropRequest::All);
    }

    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut in_prop = false;
    let mut saw_prop = false;
    let mut named = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                saw_root = true;
                if depth == 1 && local_name(&e) == "prop" {
                    saw_prop = true;
                    in_prop = true;
                } else if in_prop && depth == 2 {
                    named.push(local_name(&e));
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                saw_root = true;
                if depth == 1 && local_name(&e) == "prop" {
                    saw_prop = true;
                } else if in_prop && depth == 2 {
                    named.push(local_name(&e));
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.checked_sub(1)?;
                if depth == 1 {
                    in_prop = false;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
        buf.clear();
    }

    if !saw_root {
        return None;
    }
    Some(if saw_prop {
        PropRequest::Named(named)
    } else {
        PropRequest::All
    })
}

/// One `response` element of the multistatus.
pub struct MsEntry {
    pub path: Vec<String>,
    pub outcome: Outcome,
}

/// Per-resource result inside the multistatus.
pub enum Outcome {
    Found(ResourceInfo),
    NotFound,
    Failed,
}

enum Work {
    Visit(Vec<String>, ResourceInfo, usize),
    Emit(MsEntry),
}

/// Enumerate the subtree at `path` for the given depth.
///
/// Children appear in `list` order directly after their parent. A
/// backend failure on one resource becomes a 500 entry for that
/// resource without aborting the walk.
pub fn enumerate(backend: &dyn Backend, path: &[String], info: ResourceInfo, depth: Depth) -> Vec<MsEntry> {
    let mut out = Vec::new();
    let mut stack = vec![Work::Visit(path.to_vec(), info, 0)];

    while let Some(work) = stack.pop() {
        let (path, info, level) = match work {
            Work::Emit(entry) => {
                out.push(entry);
                continue;
            }
            Work::Visit(path, info, level) => (path, info, level),
        };

        let descend = info.is_dir()
            && match depth {
                Depth::Zero => false,
                Depth::One => level == 0,
                Depth::Infinity => level < MAX_TREE_DEPTH,
            };
        if !descend {
            out.push(MsEntry {
                path,
                outcome: Outcome::Found(info),
            });
            continue;
        }

        match backend.list(&path) {
            Err(e) => {
                log::warn!("list failed during propfind at /{}: {}", path.join("/"), e);
                out.push(MsEntry {
                    path,
                    outcome: if e.is_not_found() {
                        Outcome::NotFound
                    } else {
                        Outcome::Failed
                    },
                });
            }
            Ok(children) => {
                let mut pending = Vec::with_capacity(children.len());
                for name in children {
                    let mut child = path.clone();
                    child.push(name);
                    match backend.info(&child) {
                        Ok(child_info) => {
                            pending.push(Work::Visit(child, child_info, level + 1))
                        }
                        Err(e) if e.is_not_found() => pending.push(Work::Emit(MsEntry {
                            path: child,
                            outcome: Outcome::NotFound,
                        })),
                        Err(_) => pending.push(Work::Emit(MsEntry {
                            path: child,
                            outcome: Outcome::Failed,
                        })),
                    }
                }
                out.push(MsEntry {
                    path,
                    outcome: Outcome::Found(info),
                });
                // Reversed so the stack pops children in list order.
                stack.extend(pending.into_iter().rev());
            }
        }
    }
    out
}

type XmlResult = Result<(), quick_xml::Error>;

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> XmlResult {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_empty(writer: &mut Writer<Vec<u8>>, name: &str) -> XmlResult {
    writer.write_event(Event::Empty(BytesStart::new(name)))?;
    Ok(())
}

fn write_status(writer: &mut Writer<Vec<u8>>, code: u16, reason: &str) -> XmlResult {
    write_text_element(writer, "D:status", &format!("HTTP/1.1 {} {}", code, reason))
}

fn write_known_prop(
    writer: &mut Writer<Vec<u8>>,
    prop: &str,
    entry: &MsEntry,
    info: &ResourceInfo,
) -> XmlResult {
    match prop {
        "displayname" => {
            write_text_element(writer, "D:displayname", display_name(&entry.path))?;
        }
        "getcontentlength" => {
            if let Some(size) = info.size {
                write_text_element(writer, "D:getcontentlength", &size.to_string())?;
            }
        }
        "getcontenttype" => {
            if let Some(content_type) = &info.content_type {
                write_text_element(writer, "D:getcontenttype", content_type)?;
            }
        }
        "resourcetype" => {
            if info.is_dir() {
                writer.write_event(Event::Start(BytesStart::new("D:resourcetype")))?;
                write_empty(writer, "D:collection")?;
                writer.write_event(Event::End(BytesEnd::new("D:resourcetype")))?;
            } else {
                write_empty(writer, "D:resourcetype")?;
            }
        }
        "getlastmodified" => {
            if let Some(mtime) = info.mtime {
                write_text_element(
                    writer,
                    "D:getlastmodified",
                    &mtime.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                )?;
            }
        }
        _ => unreachable!("not a supported property"),
    }
    Ok(())
}

/// True when the property applies to this resource and will render a
/// value: size and content type exist only on files.
fn prop_applies(prop: &str, info: &ResourceInfo) -> bool {
    match prop {
        "getcontentlength" => info.size.is_some(),
        "getcontenttype" => info.content_type.is_some(),
        "getlastmodified" => info.mtime.is_some(),
        _ => SUPPORTED_PROPS.contains(&prop),
    }
}

fn write_response(
    writer: &mut Writer<Vec<u8>>,
    entry: &MsEntry,
    request: &PropRequest,
) -> XmlResult {
    writer.write_event(Event::Start(BytesStart::new("D:response")))?;
    let (href, status_only) = match &entry.outcome {
        Outcome::Found(info) => (to_href(&entry.path, info.is_dir()), None),
        Outcome::NotFound => (to_href(&entry.path, false), Some((404u16, "Not Found"))),
        Outcome::Failed => (
            to_href(&entry.path, false),
            Some((500u16, "Internal Server Error")),
        ),
    };
    write_text_element(writer, "D:href", &href)?;

    if let Some((code, reason)) = status_only {
        writer.write_event(Event::Start(BytesStart::new("D:propstat")))?;
        write_empty(writer, "D:prop")?;
        write_status(writer, code, reason)?;
        writer.write_event(Event::End(BytesEnd::new("D:propstat")))?;
        writer.write_event(Event::End(BytesEnd::new("D:response")))?;
        return Ok(());
    }
    let info = match &entry.outcome {
        Outcome::Found(info) => info,
        _ => unreachable!("status handled above"),
    };

    let requested: Vec<&str> = match request {
        PropRequest::All => SUPPORTED_PROPS.to_vec(),
        PropRequest::Named(names) => names.iter().map(String::as_str).collect(),
    };
    let (found, mut missing): (Vec<&str>, Vec<&str>) = requested
        .into_iter()
        .partition(|prop| prop_applies(prop, info));
    // Inapplicable properties are only reported when explicitly asked
    // for; allprop silently omits them.
    if matches!(request, PropRequest::All) {
        missing.clear();
    }

    writer.write_event(Event::Start(BytesStart::new("D:propstat")))?;
    writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
    for prop in &found {
        write_known_prop(writer, prop, entry, info)?;
    }
    writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
    write_status(writer, 200, "OK")?;
    writer.write_event(Event::End(BytesEnd::new("D:propstat")))?;

    // Unknown or inapplicable properties that were explicitly requested
    // get their own 404 propstat block.
    if !missing.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("D:propstat")))?;
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        for prop in &missing {
            write_empty(writer, prop)?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
        write_status(writer, 404, "Not Found")?;
        writer.write_event(Event::End(BytesEnd::new("D:propstat")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("D:response")))?;
    Ok(())
}

/// Serialise a multistatus document for the given entries.
pub fn render_multistatus(
    entries: &[MsEntry],
    request: &PropRequest,
) -> Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut multistatus = BytesStart::new("D:multistatus");
    multistatus.push_attribute(("xmlns:D", "DAV:"));
    writer.write_event(Event::Start(multistatus))?;
    for entry in entries {
        write_response(&mut writer, entry, request)?;
    }
    writer.write_event(Event::End(BytesEnd::new("D:multistatus")))?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_defaults_to_infinity() {
        assert_eq!(Depth::parse(None), Some(Depth::Infinity));
        assert_eq!(Depth::parse(Some("0")), Some(Depth::Zero));
        assert_eq!(Depth::parse(Some("1")), Some(Depth::One));
        assert_eq!(Depth::parse(Some("Infinity")), Some(Depth::Infinity));
        assert_eq!(Depth::parse(Some("2")), None);
    }

    #[test]
    fn empty_body_means_allprop() {
        assert_eq!(parse_propfind(b""), Some(PropRequest::All));
        assert_eq!(parse_propfind(b"  \n"), Some(PropRequest::All));
    }

    #[test]
    fn allprop_body_means_allprop() {
        let body = br#"<?xml version="1.0"?><D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#;
        assert_eq!(parse_propfind(body), Some(PropRequest::All));
    }

    #[test]
    fn named_props_are_collected() {
        let body = br#"<?xml version="1.0"?>
<D:propfind xmlns:D="DAV:">
  <D:prop><D:displayname/><D:getcontentlength/><X:wishes xmlns:X="urn:x"/></D:prop>
</D:propfind>"#;
        assert_eq!(
            parse_propfind(body),
            Some(PropRequest::Named(vec![
                "displayname".to_string(),
                "getcontentlength".to_string(),
                "wishes".to_string(),
            ]))
        );
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert_eq!(parse_propfind(b"<propfind><prop></propfind>"), None);
        assert_eq!(parse_propfind(b"not xml"), None);
    }
}
