//! HTTP server hosting the WebDAV frontend.
//!
//! A plain accept loop: each connection is served on its own task, each
//! request handled synchronously against the shared backend handle.

use crate::handler::DavHandler;
use davmount_backend::Backend;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, error, info};
use std::convert::Infallible;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Handle to a server started in the background.
pub struct DavServer {
    /// Bound listen address.
    addr: SocketAddr,
    /// Shutdown signal sender.
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl DavServer {
    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL clients can mount.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve_connection(handler: Arc<DavHandler>, stream: tokio::net::TcpStream) {
    let io = TokioIo::new(stream);
    if let Err(err) = http1::Builder::new()
        .serve_connection(
            io,
            service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler.handle(req).await) }
            }),
        )
        .await
    {
        // Client disconnects mid-response land here; nothing to clean up.
        debug!("connection error: {:?}", err);
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(backend: Arc<dyn Backend>, host: IpAddr, port: u16) -> io::Result<()> {
    let addr = SocketAddr::new(host, port);
    let handler = Arc::new(DavHandler::new(backend));

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("WebDAV server listening on http://{}", local_addr);

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        debug!("connection from {}", remote_addr);
        let handler = handler.clone();
        tokio::spawn(serve_connection(handler, stream));
    }
}

/// Start a server in the background and return a handle to it.
///
/// Binding port 0 picks a free port; the bound address is available on
/// the returned handle. Used by tests and embedders.
pub async fn serve_background(
    backend: Arc<dyn Backend>,
    host: IpAddr,
    port: u16,
) -> io::Result<DavServer> {
    let addr = SocketAddr::new(host, port);
    let handler = Arc::new(DavHandler::new(backend));

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    info!("WebDAV server started on http://{}", local_addr);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            debug!("connection from {}", remote_addr);
                            let handler = handler.clone();
                            tokio::spawn(serve_connection(handler, stream));
                        }
                        Err(e) => error!("accept error: {:?}", e),
                    }
                }
                _ = &mut shutdown_rx => {
                    info!("WebDAV server shutting down");
                    break;
                }
            }
        }
    });

    Ok(DavServer {
        addr: local_addr,
        shutdown_tx: Some(shutdown_tx),
    })
}
