//! # davmount-backend
//!
//! Backend abstraction and format adapters for davmount.
//!
//! This crate provides:
//! - The read-only [`Backend`] contract (`info` / `list` / `get` / `close`)
//! - [`ResourceInfo`] metadata shared with the protocol frontend
//! - Adapters mapping archives, databases, markup, config formats,
//!   mailboxes and source files onto a virtual directory tree
//! - Extension-based adapter selection via [`BackendKind`]
//!
//! ## Example
//!
//! ```ignore
//! use davmount_backend::{Backend, BackendKind};
//! use std::path::Path;
//!
//! let backend = BackendKind::Zip.open(Some(Path::new("data.zip")))?;
//! for name in backend.list(&[])? {
//!     println!("{}", name);
//! }
//! ```

mod adapters;
mod backend;
mod detect;
mod error;

pub use adapters::{
    AstBackend, CsvBackend, IniBackend, JsonBackend, MailboxBackend, MarkupBackend, MemoryBackend,
    Node, OsInfoBackend, SqliteBackend, TarBackend, TomlBackend, ZipBackend,
};
pub use backend::{Backend, ResourceInfo, ResourceKind};
pub use detect::BackendKind;
pub use error::{Error, Result};
