//! TCP helpers: dialing, accepting, and an accept loop with graceful shutdown.
//!
//! Accepted connections are handed out as sessions that start `Connected`,
//! the same as any other pre-existing transport.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::service::session::Session;

/// How long the accept loop waits for live sessions after a shutdown signal
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Listening socket that produces sessions
#[derive(Debug)]
pub struct Acceptor {
    listener: TcpListener,
    config: SessionConfig,
}

impl Acceptor {
    #[instrument(skip(addr, config))]
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: SessionConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = ?listener.local_addr().ok(), "Listening");
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Wait for the next peer and wrap it in a `Connected` session.
    pub async fn accept(&self) -> Result<Session<TcpStream>> {
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not set TCP_NODELAY");
        }
        info!(peer = %peer, "Accepted connection");
        Ok(Session::from_stream(stream, self.config.clone()))
    }
}

/// Dial `host:port` and return the connected session.
pub async fn connect(host: &str, port: u16, config: SessionConfig) -> Result<Session<TcpStream>> {
    let session = Session::new(host, port, config);
    session.connect().await?;
    Ok(session)
}

/// Accept peers until `shutdown_rx` fires, running `handler` on its own task per session.
///
/// After the signal, no new peers are accepted and the loop waits up to
/// [`SHUTDOWN_GRACE`] for running handlers to finish. A handler that panics
/// counts as finished.
#[instrument(skip_all)]
pub async fn serve_with_shutdown<H, Fut>(
    acceptor: Acceptor,
    mut shutdown_rx: mpsc::Receiver<()>,
    handler: H,
) -> Result<()>
where
    H: Fn(Session<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handler = Arc::new(handler);
    let sessions = TaskTracker::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                sessions.close();
                info!(sessions = sessions.len(), "Shutting down. Waiting for sessions to close...");

                match tokio::time::timeout(SHUTDOWN_GRACE, sessions.wait()).await {
                    Ok(()) => info!("All sessions closed"),
                    Err(_) => warn!(sessions = sessions.len(), "Shutdown timeout reached, forcing exit"),
                }

                return Ok(());
            }

            accepted = acceptor.accept() => {
                match accepted {
                    Ok(session) => {
                        let handler = Arc::clone(&handler);
                        sessions.spawn(async move {
                            handler(session.clone()).await;
                            session.disconnect().await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}
