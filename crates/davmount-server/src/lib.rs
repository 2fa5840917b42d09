//! # davmount-server
//!
//! Read-only WebDAV frontend for davmount backends.
//!
//! This crate provides:
//! - The HTTP request handler: `OPTIONS`, `GET`, `HEAD` and `PROPFIND`
//!   with Depth 0/1/infinity, uniform 405 for everything else
//! - Multistatus XML rendering and PROPFIND body parsing
//! - `?json` and `?zip` subtree exports and an HTML directory index
//! - The tokio accept loop, foreground and background
//!
//! ## Example
//!
//! ```ignore
//! use davmount_backend::{BackendKind, Backend};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let backend: Arc<dyn Backend> =
//!         Arc::from(BackendKind::Zip.open(Some("data.zip".as_ref())).unwrap());
//!     davmount_server::serve(backend, "0.0.0.0".parse().unwrap(), 8080).await
//! }
//! ```

mod export;
mod handler;
mod path;
mod propfind;
mod server;

pub use server::{serve, serve_background, DavServer};
