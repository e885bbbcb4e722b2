//! Shared TCP accept loop for the network bindings.

use crate::error::{ServerError, ServerResult};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Binds a listener, mapping failure to a startup error.
pub(crate) async fn bind(binding: &'static str, addr: SocketAddr) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::startup(binding, format!("cannot bind {addr}: {e}")))
}

/// Dials `addr`, giving up after `timeout`.
pub(crate) async fn connect(addr: &str, timeout: Duration) -> ServerResult<TcpStream> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ServerError::Timeout {
            addr: addr.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })??;
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

/// A running accept loop.
///
/// Shutting down stops accepting; connections already accepted run to
/// completion on their own tasks.
#[derive(Debug)]
pub struct ServeHandle {
    binding: &'static str,
    local_addr: SocketAddr,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServeHandle {
    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    pub async fn shutdown(self) -> ServerResult<()> {
        // A closed receiver means the loop already exited.
        let _ = self.stop.send(true);
        self.task
            .await
            .map_err(|e| ServerError::shutdown(self.binding, e.to_string()))?;
        info!(binding = self.binding, addr = %self.local_addr, "binding stopped");
        Ok(())
    }
}

/// Spawns an accept loop that runs `handler` on its own task per connection.
pub(crate) fn serve<F, Fut>(
    binding: &'static str,
    listener: TcpListener,
    max_connections: usize,
    handler: F,
) -> ServerResult<ServeHandle>
where
    F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServerError::startup(binding, e.to_string()))?;
    let (stop, mut stopped) = watch::channel(false);
    let limit = Arc::new(Semaphore::new(max_connections.max(1)));

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let Ok(permit) = Arc::clone(&limit).try_acquire_owned() else {
                            warn!(binding, peer = %peer, "connection limit reached, dropping");
                            continue;
                        };
                        let _ = stream.set_nodelay(true);
                        debug!(binding, peer = %peer, "connection accepted");
                        let connection = handler(stream, peer);
                        tokio::spawn(async move {
                            connection.await;
                            drop(permit);
                            debug!(binding, peer = %peer, "connection closed");
                        });
                    }
                    Err(e) => {
                        warn!(binding, error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
        }
    });

    info!(binding, addr = %local_addr, "binding started");
    Ok(ServeHandle {
        binding,
        local_addr,
        stop,
        task,
    })
}
