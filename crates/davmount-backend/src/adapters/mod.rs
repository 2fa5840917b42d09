//! Format adapters implementing the [`Backend`](crate::Backend) contract.
//!
//! Each adapter maps one source format onto the virtual directory tree.
//! Adapters are independent of each other and of the protocol frontend.

mod ast;
mod csv;
mod ini;
mod json;
mod mailbox;
mod markup;
mod memory;
mod osinfo;
mod sqlite;
mod tar;
mod toml;
mod zip;

pub use self::ast::AstBackend;
pub use self::csv::CsvBackend;
pub use self::ini::IniBackend;
pub use self::json::JsonBackend;
pub use self::mailbox::MailboxBackend;
pub use self::markup::MarkupBackend;
pub use self::memory::{MemoryBackend, Node};
pub use self::osinfo::OsInfoBackend;
pub use self::sqlite::SqliteBackend;
pub use self::tar::TarBackend;
pub use self::toml::TomlBackend;
pub use self::zip::ZipBackend;
