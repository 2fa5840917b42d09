//! Request dispatch for the read-only WebDAV frontend.
//!
//! Each request is parsed, translated into backend calls, and rendered
//! as HTTP plus WebDAV XML. Mutating verbs are uniformly refused with
//! 405 before the backend is consulted.

use crate::export::{json_subtree, zip_subtree};
use crate::path::{dump_format, encode_segment, parse_path, DumpFormat};
use crate::propfind::{enumerate, parse_propfind, render_multistatus, Depth, MsEntry, Outcome};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use davmount_backend::{Backend, Error};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use hyper::{Request, Response, StatusCode, Uri};
use log::debug;
use std::sync::Arc;

/// Methods accepted by this server; everything else is 405.
const ALLOW_METHODS: &str = "OPTIONS, GET, HEAD, PROPFIND";

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";

type DavResponse = Response<Full<Bytes>>;

/// Shared per-server state: the backend handle and the open instant
/// used when a resource has no modification time of its own.
pub(crate) struct DavHandler {
    backend: Arc<dyn Backend>,
    started: DateTime<Utc>,
}

fn response(
    status: StatusCode,
    content_type: &str,
    body: Vec<u8>,
    include_body: bool,
) -> DavResponse {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, body.len().to_string())
        .body(Full::new(if include_body {
            Bytes::from(body)
        } else {
            Bytes::new()
        }))
        .expect("static response parts")
}

fn bad_request(include_body: bool) -> DavResponse {
    response(
        StatusCode::BAD_REQUEST,
        "text/plain",
        b"Bad Request".to_vec(),
        include_body,
    )
}

/// Map a backend error to 404 or 500.
fn error_response(error: &Error, include_body: bool) -> DavResponse {
    if error.is_not_found() {
        response(
            StatusCode::NOT_FOUND,
            "text/plain",
            b"Not Found".to_vec(),
            include_body,
        )
    } else {
        response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            error.to_string().into_bytes(),
            include_body,
        )
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl DavHandler {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            started: Utc::now(),
        }
    }

    /// Dispatch one request.
    pub async fn handle(&self, req: Request<Incoming>) -> DavResponse {
        debug!("{} {}", req.method(), req.uri());
        let method = req.method().clone();
        match method.as_str() {
            "OPTIONS" => self.options(),
            "GET" => self.get_or_head(req.uri(), true),
            "HEAD" => self.get_or_head(req.uri(), false),
            "PROPFIND" => {
                let uri = req.uri().clone();
                let depth = req
                    .headers()
                    .get("depth")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let body = match req.into_body().collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(_) => return bad_request(true),
                };
                self.propfind(&uri, depth.as_deref(), &body)
            }
            _ => self.method_not_allowed(),
        }
    }

    fn options(&self) -> DavResponse {
        Response::builder()
            .status(StatusCode::OK)
            .header("DAV", "1")
            .header(ALLOW, ALLOW_METHODS)
            .header(CONTENT_LENGTH, "0")
            .body(Full::new(Bytes::new()))
            .expect("static response parts")
    }

    fn method_not_allowed(&self) -> DavResponse {
        Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header(ALLOW, ALLOW_METHODS)
            .header(CONTENT_LENGTH, "0")
            .body(Full::new(Bytes::new()))
            .expect("static response parts")
    }

    fn get_or_head(&self, uri: &Uri, include_body: bool) -> DavResponse {
        let Some(path) = parse_path(uri.path()) else {
            return bad_request(include_body);
        };
        match dump_format(uri.query()) {
            Some(DumpFormat::Json) => return self.json_dump(&path, include_body),
            Some(DumpFormat::Zip) => return self.zip_dump(&path, include_body),
            None => {}
        }

        let info = match self.backend.info(&path) {
            Ok(info) => info,
            Err(e) => return error_response(&e, include_body),
        };

        if info.is_dir() {
            return match self.html_index(&path) {
                Ok(body) => response(
                    StatusCode::OK,
                    "text/html; charset=utf-8",
                    body,
                    include_body,
                ),
                Err(e) => error_response(&e, include_body),
            };
        }

        let body = match self.backend.get(&path) {
            Ok(body) => body,
            Err(e) => return error_response(&e, include_body),
        };
        let content_type = info
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let mtime = info.mtime.unwrap_or(self.started);
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, body.len().to_string())
            .header(LAST_MODIFIED, mtime.format(RFC1123).to_string())
            .body(Full::new(if include_body {
                Bytes::from(body)
            } else {
                Bytes::new()
            }))
            .expect("static response parts")
    }

    /// `?json`: raw pass-through for files, recursive mirror for
    /// directories.
    fn json_dump(&self, path: &[String], include_body: bool) -> DavResponse {
        match self.backend.info(path) {
            Ok(info) if !info.is_dir() => match self.backend.get(path) {
                Ok(body) => response(
                    StatusCode::OK,
                    info.content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream"),
                    body,
                    include_body,
                ),
                Err(e) => error_response(&e, include_body),
            },
            Ok(_) => match json_subtree(self.backend.as_ref(), path) {
                Ok(value) => {
                    let body = serde_json::to_vec_pretty(&value).unwrap_or_default();
                    response(
                        StatusCode::OK,
                        "application/json; charset=utf-8",
                        body,
                        include_body,
                    )
                }
                Err(e) => error_response(&e, include_body),
            },
            Err(e) => error_response(&e, include_body),
        }
    }

    fn zip_dump(&self, path: &[String], include_body: bool) -> DavResponse {
        match zip_subtree(self.backend.as_ref(), path) {
            Ok(body) => response(StatusCode::OK, "application/zip", body, include_body),
            Err(e) => error_response(&e, include_body),
        }
    }

    /// Small HTML index for directory GETs: one anchor per child, with
    /// a `..` link on non-root directories.
    fn html_index(&self, path: &[String]) -> davmount_backend::Result<Vec<u8>> {
        let children = self.backend.list(path)?;
        let title = format!("/{}", path.join("/"));
        let title = if path.is_empty() { "/".to_string() } else { title };

        let mut out = String::new();
        out.push_str(&format!(
            "<html><head><title>{}</title></head><body>\n",
            html_escape(&title)
        ));
        out.push_str(&format!("<h1>{}</h1>\n<ul>\n", html_escape(&title)));
        if !path.is_empty() {
            out.push_str("<li><a href=\"../\">..</a></li>\n");
        }
        for name in children {
            let mut child = path.to_vec();
            child.push(name.clone());
            let is_dir = self
                .backend
                .info(&child)
                .map(|info| info.is_dir())
                .unwrap_or(false);
            let mut href = encode_segment(&name);
            if is_dir {
                href.push('/');
            }
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                href,
                html_escape(&name)
            ));
        }
        out.push_str("</ul></body></html>\n");
        Ok(out.into_bytes())
    }

    fn propfind(&self, uri: &Uri, depth: Option<&str>, body: &[u8]) -> DavResponse {
        let Some(path) = parse_path(uri.path()) else {
            return bad_request(true);
        };
        let Some(depth) = Depth::parse(depth) else {
            return bad_request(true);
        };
        let Some(request) = parse_propfind(body) else {
            return bad_request(true);
        };

        let entries = match self.backend.info(&path) {
            Ok(info) => enumerate(self.backend.as_ref(), &path, info, depth),
            Err(e) if e.is_not_found() => vec![MsEntry {
                path,
                outcome: Outcome::NotFound,
            }],
            Err(e) => return error_response(&e, true),
        };

        match render_multistatus(&entries, &request) {
            Ok(xml) => response(
                StatusCode::MULTI_STATUS,
                "application/xml; charset=utf-8",
                xml,
                true,
            ),
            Err(e) => response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                e.to_string().into_bytes(),
                true,
            ),
        }
    }
}
