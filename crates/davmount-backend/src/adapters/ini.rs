//! INI / config file backend.
//!
//! One directory per section, one file per key; the body is the key's
//! raw string value. Keys are matched case-sensitively.

use crate::backend::{Backend, ResourceInfo};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use configparser::ini::Ini;
use std::collections::BTreeMap;
use std::path::Path;

/// Backend over an INI-style config file.
pub struct IniBackend {
    sections: BTreeMap<String, BTreeMap<String, String>>,
    opened: DateTime<Utc>,
}

impl IniBackend {
    /// Parse an INI file.
    pub fn open(path: &Path) -> Result<Self> {
        let mut parser = Ini::new_cs();
        let parsed = parser
            .load(path)
            .map_err(|e| Error::InvalidSource(format!("cannot read INI file: {}", e)))?;

        let mut sections = BTreeMap::new();
        for (section, keys) in parsed {
            let mut values = BTreeMap::new();
            for (key, value) in keys {
                // Keys without a value read back as empty files.
                values.insert(key, value.unwrap_or_default());
            }
            sections.insert(section, values);
        }
        Ok(Self {
            sections,
            opened: Utc::now(),
        })
    }

    fn value(&self, section: &str, key: &str) -> Option<&String> {
        self.sections.get(section).and_then(|keys| keys.get(key))
    }
}

impl Backend for IniBackend {
    fn info(&self, path: &[String]) -> Result<ResourceInfo> {
        match path {
            [] => Ok(ResourceInfo::directory().with_mtime(self.opened)),
            [section] if self.sections.contains_key(section) => {
                Ok(ResourceInfo::directory().with_mtime(self.opened))
            }
            [section, key] => match self.value(section, key) {
                Some(value) => Ok(ResourceInfo::file(value.len() as u64, "text/plain")
                    .with_mtime(self.opened)),
                None => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }

    fn list(&self, path: &[String]) -> Result<Vec<String>> {
        match path {
            [] => Ok(self.sections.keys().cloned().collect()),
            [section] => match self.sections.get(section) {
                Some(keys) => Ok(keys.keys().cloned().collect()),
                None => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>> {
        match path {
            [section, key] => match self.value(section, key) {
                Some(value) => Ok(value.clone().into_bytes()),
                None => Err(Error::not_found(path)),
            },
            _ => Err(Error::not_found(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sections_and_keys_map_to_dirs_and_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[server]\nHost = example.org\nport = 8080\n\n[Auth]\ntoken = s3cret\n")
            .unwrap();
        let backend = IniBackend::open(file.path()).unwrap();

        assert_eq!(backend.list(&[]).unwrap(), vec!["Auth", "server"]);
        assert_eq!(
            backend.list(&["server".to_string()]).unwrap(),
            vec!["Host", "port"]
        );
        assert_eq!(
            backend
                .get(&["server".to_string(), "Host".to_string()])
                .unwrap(),
            b"example.org".to_vec()
        );
        assert!(backend
            .get(&["server".to_string(), "host".to_string()])
            .unwrap_err()
            .is_not_found());
    }
}
