//! Mailbox (mbox) backend.
//!
//! Messages are split on `From ` separator lines at construction; the
//! root holds one `NNNN_<subject>.eml` file per message, the body being
//! the raw RFC 822 message without the envelope line.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use mailparse::MailHeaderMap;
use std::collections::HashMap;
use std::path::Path;

const SUBJECT_MAX: usize = 60;

struct Message {
    body: Vec<u8>,
    mtime: Option<DateTime<Utc>>,
}

/// Backend over an mbox mailbox file.
pub struct MailboxBackend {
    messages: Vec<Message>,
    // Insertion order of names mirrors `messages`.
    order: Vec<String>,
    index: HashMap<String, usize>,
    opened: DateTime<Utc>,
}

/// Flatten a subject line to filesystem-safe characters.
fn safe_subject(subject: &str) -> String {
    let mut out = String::new();
    let mut last_was_space = false;
    for ch in subject.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push('_');
            }
            last_was_space = true;
        } else if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
            out.push(ch);
            last_was_space = false;
        } else {
            last_was_space = false;
        }
    }
    let out: String = out.chars().take(SUBJECT_MAX).collect();
    if out.is_empty() {
        "no_subject".to_string()
    } else {
        out
    }
}

/// Split an mbox stream into messages, excluding the separator lines.
fn split_mbox(data: &[u8]) -> Vec<Vec<u8>> {
    let mut messages: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    for line in data.split_inclusive(|b| *b == b'\n') {
        if line.starts_with(b"From ") {
            if let Some(message) = current.take() {
                messages.push(message);
            }
            current = Some(Vec::new());
        } else if let Some(message) = current.as_mut() {
            message.extend_from_slice(line);
        } else {
            // Leniency for files that do not start with a separator:
            // treat the leading content as a message of its own.
            current = Some(line.to_vec());
        }
    }
    if let Some(message) = current {
        messages.push(message);
    }
    messages
}

impl MailboxBackend {
    /// Read an mbox file and index its messages.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::InvalidSource(format!("cannot open mailbox: {}", e)))?;
        let bodies = split_mbox(&data);
        let width = bodies.len().to_string().len().max(4);

        let mut messages = Vec::new();
        let mut order = Vec::new();
        let mut index = HashMap::new();
        for (ordinal, body) in bodies.into_iter().enumerate() {
            let headers = mailparse::parse_headers(&body).ok();
            let subject = headers
                .as_ref()
                .and_then(|(headers, _)| headers.get_first_value("Subject"))
                .unwrap_or_default();
            let mtime = headers
                .as_ref()
                .and_then(|(headers, _)| headers.get_first_value("Date"))
                .and_then(|date| mailparse::dateparse(&date).ok())
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

            let name = format!(
                "{:0width$}_{}.eml",
                ordinal,
                safe_subject(&subject),
                width = width
            );
            index.insert(name.clone(), messages.len());
            order.push(name);
            messages.push(Message { body, mtime });
        }

        Ok(Self {
            messages,
            order,
            index,
            opened: Utc::now(),
        })
    }

    fn message(&self, path: &[String]) -> Result<&Message> {
        match path {
            [name] => self
                .index
                .get(name)
                .map(|i| &self.messages[*i])
                .ok_or_else(|| Error::not_found(path)),
            _ => Err(Error::not_found(path)),
        }
    }
}

impl Backend for MailboxBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        if path.is_empty() {
            return Ok(ResourceInfo::directory().with_mtime(self.opened));
        }
        let message = self.message(path)?;
        Ok(
            ResourceInfo::file(message.body.len() as u64, "message/rfc822")
                .with_mtime(message.mtime.unwrap_or(self.opened)),
        )
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        if !path.is_empty() {
            return Err(Error::not_found(path));
        }
        Ok(self.order.clone())
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        Ok(self.message(path)?.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &[u8] = b"From alice@example.org Thu Jan  1 00:00:00 2026\n\
Subject: Hello there!\n\
Date: Thu, 01 Jan 2026 12:00:00 +0000\n\
\n\
First body.\n\
From bob@example.org Thu Jan  2 00:00:00 2026\n\
Subject: Re: [list] status?\n\
\n\
Second body.\n";

    fn sample() -> MailboxBackend {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE).unwrap();
        MailboxBackend::open(file.path()).unwrap()
    }

    #[test]
    fn messages_are_ordinal_named() {
        let names = sample().list(&[]).unwrap();
        assert_eq!(names, vec!["0000_Hello_there.eml", "0001_Re_list_status.eml"]);
    }

    #[test]
    fn body_excludes_envelope_line() {
        let backend = sample();
        let body = backend.get(&["0000_Hello_there.eml".to_string()]).unwrap();
        assert!(body.starts_with(b"Subject: Hello there!"));
        assert!(body.ends_with(b"First body.\n"));
    }

    #[test]
    fn subjects_flatten_to_safe_names() {
        assert_eq!(safe_subject("  a  b\tc "), "a_b_c");
        assert_eq!(safe_subject("!!!"), "no_subject");
        assert_eq!(safe_subject(""), "no_subject");
    }

    #[test]
    fn date_header_becomes_mtime() {
        let backend = sample();
        let info = backend.info(&["0000_Hello_there.eml".to_string()]).unwrap();
        assert_eq!(
            info.mtime.unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
        );
    }
}
