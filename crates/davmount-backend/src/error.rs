use thiserror::Error;

/// Errors that can occur while constructing or querying a backend.
///
/// `NotFound` means the requested virtual path does not exist and maps to
/// HTTP 404. Every other variant is a backend failure and maps to HTTP 500.
#[derive(Debug, Error)]
pub enum Error {
    /// The virtual path does not exist in this backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// The source file is malformed or not usable by the selected backend.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// A record or entry could not be read after the backend was opened.
    #[error("read error: {0}")]
    Read(String),

    /// Error from the zip library.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error from the SQLite driver.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON parsing or serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// XML parsing error.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// CSV parsing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Not-found error for a virtual path.
    pub fn not_found(path: &[String]) -> Self {
        Error::NotFound(format!("/{}", path.join("/")))
    }

    /// True when this error means "the path does not exist" rather than
    /// "the backend failed".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
