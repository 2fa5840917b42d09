use crate::adapters::{
    AstBackend, CsvBackend, IniBackend, JsonBackend, MailboxBackend, MarkupBackend, OsInfoBackend,
    SqliteBackend, TarBackend, TomlBackend, ZipBackend,
};
use crate::backend::Backend;
use crate::error::{Error, Result};
use std::path::Path;

/// The set of available backend adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Zip,
    Tar,
    Sqlite,
    Json,
    Csv,
    Ini,
    Xml,
    Toml,
    Html,
    Mailbox,
    Ast,
    OsInfo,
}

/// Extension → adapter map. Compound extensions must precede their
/// suffixes so that longest-match wins.
const EXTENSIONS: &[(&str, BackendKind)] = &[
    (".tar.gz", BackendKind::Tar),
    (".tar.bz2", BackendKind::Tar),
    (".tar.xz", BackendKind::Tar),
    (".tgz", BackendKind::Tar),
    (".tar", BackendKind::Tar),
    (".zip", BackendKind::Zip),
    (".sqlite3", BackendKind::Sqlite),
    (".sqlite", BackendKind::Sqlite),
    (".db", BackendKind::Sqlite),
    (".json", BackendKind::Json),
    (".csv", BackendKind::Csv),
    (".ini", BackendKind::Ini),
    (".cfg", BackendKind::Ini),
    (".xml", BackendKind::Xml),
    (".toml", BackendKind::Toml),
    (".html", BackendKind::Html),
    (".htm", BackendKind::Html),
    (".mbox", BackendKind::Mailbox),
    (".py", BackendKind::Ast),
];

impl BackendKind {
    /// Detect the adapter for a file from its extension.
    pub fn for_path(path: &Path) -> Option<BackendKind> {
        let lower = path.to_string_lossy().to_lowercase();
        EXTENSIONS
            .iter()
            .find(|(ext, _)| lower.ends_with(ext))
            .map(|(_, kind)| *kind)
    }

    /// True when this adapter needs a source file.
    pub fn needs_source(&self) -> bool {
        !matches!(self, BackendKind::OsInfo)
    }

    /// Construct the backend, opening `source` where one is required.
    pub fn open(&self, source: Option<&Path>) -> Result<Box<dyn Backend>> {
        let file = || {
            source.ok_or_else(|| {
                Error::InvalidSource(format!("backend '{}' requires a source file", self))
            })
        };
        Ok(match self {
            BackendKind::Zip => Box::new(ZipBackend::open(file()?)?),
            BackendKind::Tar => Box::new(TarBackend::open(file()?)?),
            BackendKind::Sqlite => Box::new(SqliteBackend::open(file()?)?),
            BackendKind::Json => Box::new(JsonBackend::open(file()?)?),
            BackendKind::Csv => Box::new(CsvBackend::open(file()?)?),
            BackendKind::Ini => Box::new(IniBackend::open(file()?)?),
            BackendKind::Xml => Box::new(MarkupBackend::open_xml(file()?)?),
            BackendKind::Toml => Box::new(TomlBackend::open(file()?)?),
            BackendKind::Html => Box::new(MarkupBackend::open_html(file()?)?),
            BackendKind::Mailbox => Box::new(MailboxBackend::open(file()?)?),
            BackendKind::Ast => Box::new(AstBackend::open(file()?)?),
            BackendKind::OsInfo => Box::new(OsInfoBackend::new()),
        })
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Zip => "zip",
            BackendKind::Tar => "tar",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Json => "json",
            BackendKind::Csv => "csv",
            BackendKind::Ini => "ini",
            BackendKind::Xml => "xml",
            BackendKind::Toml => "toml",
            BackendKind::Html => "html",
            BackendKind::Mailbox => "mailbox",
            BackendKind::Ast => "ast",
            BackendKind::OsInfo => "osinfo",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zip" => Ok(BackendKind::Zip),
            "tar" => Ok(BackendKind::Tar),
            "sqlite" => Ok(BackendKind::Sqlite),
            "json" => Ok(BackendKind::Json),
            "csv" => Ok(BackendKind::Csv),
            "ini" => Ok(BackendKind::Ini),
            "xml" => Ok(BackendKind::Xml),
            "toml" => Ok(BackendKind::Toml),
            "html" => Ok(BackendKind::Html),
            "mailbox" | "mbox" => Ok(BackendKind::Mailbox),
            "ast" => Ok(BackendKind::Ast),
            "osinfo" => Ok(BackendKind::OsInfo),
            other => Err(format!("unknown backend type: {}", other)),
        }
    }
}
