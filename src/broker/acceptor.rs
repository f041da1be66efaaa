//! Acceptor loop of a server connection.
//!
//! One task per server. The task races three things:
//!
//! - the shutdown signal from `Device::close`
//! - the next inbound socket from the listener
//! - completion of a pending session handshake
//!
//! Handshakes run in a [`JoinSet`] so a slow peer never stalls accepting.
//! A child joins its server's list only after its handshake succeeded.
//! Stopping the acceptor aborts unfinished handshakes and drops the
//! listener, which closes the listening socket.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::transport::{Listener, Session, SessionHandler};

use super::connection::Connection;

// ============================================================================
// Types
// ============================================================================

/// Output of one handshake task.
type Handshake = (Arc<Connection>, Result<Arc<dyn Session>>);

// ============================================================================
// AcceptorHandle
// ============================================================================

/// Handle to a running acceptor loop.
pub(crate) struct AcceptorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AcceptorHandle {
    /// Spawns the acceptor loop for `server`.
    pub(crate) fn spawn(server: &Arc<Connection>, listener: Box<dyn Listener>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(Arc::downgrade(server), listener, shutdown_rx));

        Self { shutdown_tx, task }
    }

    /// Signals the loop and waits until it exited.
    ///
    /// No child is added after this returns.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.task.await {
            warn!(error = %e, "Acceptor task ended abnormally");
        }
    }
}

// ============================================================================
// Accept Loop
// ============================================================================

/// Background task that accepts children for one server.
async fn accept_loop(
    server: Weak<Connection>,
    mut listener: Box<dyn Listener>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let local = listener.local_endpoint();
    debug!(%local, "Acceptor loop started");

    let mut handshakes: JoinSet<Handshake> = JoinSet::new();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            biased;

            // Sender dropped counts as shutdown too
            _ = shutdown_rx.changed() => {
                debug!(%local, "Acceptor shutdown signalled");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok(incoming) => {
                        let Some(server) = server.upgrade() else {
                            break;
                        };

                        let child = Connection::accepted(&server);
                        debug!(
                            server = %server.id(),
                            child = %child.id(),
                            peer = %incoming.peer(),
                            "Socket accepted"
                        );

                        let handler: Arc<dyn SessionHandler> = child.inbox().clone();
                        handshakes.spawn(async move {
                            let session = incoming.establish(handler).await;
                            (child, session)
                        });
                    }

                    Err(e) => {
                        error!(error = %e, %local, "Accept failed");
                    }
                }
            }

            Some(joined) = handshakes.join_next() => {
                match joined {
                    Ok((child, Ok(session))) => {
                        let Some(server) = server.upgrade() else {
                            session.hangup();
                            break;
                        };

                        child.attach_session(session);
                        server.add_child(Arc::clone(&child));

                        info!(
                            server = %server.id(),
                            child = %child.id(),
                            endpoint = %child.endpoint(),
                            "websock SRVACCEPT online"
                        );
                    }

                    Ok((child, Err(e))) => {
                        warn!(child = %child.id(), error = %e, "Session handshake failed");
                        child.release();
                    }

                    Err(e) => {
                        warn!(error = %e, "Handshake task failed");
                    }
                }
            }
        }
    }

    handshakes.shutdown().await;
    drop(listener);

    debug!(%local, "Acceptor loop terminated");
}
