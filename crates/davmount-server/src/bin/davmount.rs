//! davmount: serve structured data files as a read-only WebDAV tree.
//!
//! Any WebDAV-capable client can browse the mounted file:
//!
//! ```bash
//! # Serve an archive on the default port
//! davmount data.zip
//!
//! # Serve a SQLite database on another port
//! davmount -p 9000 records.db
//!
//! # Force the adapter and serve host information without a file
//! davmount --type osinfo
//! ```

use clap::error::ErrorKind;
use clap::Parser;
use davmount_backend::{Backend, BackendKind};
use env_logger::Env;
use log::{error, info};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

// Exit codes: 1 for configuration errors, 2 for backend construction
// failures.
const EXIT_CONFIG: i32 = 1;
const EXIT_BACKEND: i32 = 2;

/// Read-only WebDAV server for structured data files.
///
/// Mounts archives, databases, config and markup formats, mailboxes
/// and source files as browsable directory trees.
#[derive(Parser, Debug)]
#[command(name = "davmount")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to serve (not needed with --type osinfo)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Force a backend type instead of extension-based detection
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    backend_type: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn resolve_kind(args: &Args) -> Result<BackendKind, String> {
    if let Some(tag) = &args.backend_type {
        return tag.parse();
    }
    let file = args
        .file
        .as_ref()
        .ok_or_else(|| "a file argument is required".to_string())?;
    BackendKind::for_path(file).ok_or_else(|| {
        format!(
            "cannot detect backend for '{}'; use --type to select one",
            file.display()
        )
    })
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            process::exit(EXIT_CONFIG);
        }
    };

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let kind = match resolve_kind(&args) {
        Ok(kind) => kind,
        Err(message) => {
            error!("{}", message);
            process::exit(EXIT_CONFIG);
        }
    };

    let source = if kind.needs_source() {
        let file = match &args.file {
            Some(file) => file,
            None => {
                error!("backend '{}' requires a file argument", kind);
                process::exit(EXIT_CONFIG);
            }
        };
        if !file.is_file() {
            error!("{}: not a readable file", file.display());
            process::exit(EXIT_CONFIG);
        }
        Some(file.as_path())
    } else {
        None
    };

    let label = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| kind.to_string());
    info!("opening {} ({} backend)", label, kind);
    let backend: Arc<dyn Backend> = match kind.open(source) {
        Ok(backend) => Arc::from(backend),
        Err(e) => {
            error!("cannot open {}: {}", label, e);
            process::exit(EXIT_BACKEND);
        }
    };

    info!("serving {} on http://{}:{}/", label, args.host, args.port);
    info!("press Ctrl+C to stop");

    let served = tokio::select! {
        result = davmount_server::serve(backend.clone(), args.host, args.port) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };

    // The backend is released on every exit path, including listener
    // start-up failure.
    backend.close();

    if let Err(e) = served {
        error!("server error: {}", e);
        process::exit(EXIT_CONFIG);
    }
}
