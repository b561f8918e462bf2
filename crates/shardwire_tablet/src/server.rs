//! TCP listener for a tablet service.

use crate::error::{ServerResult, TabletServerError};
use crate::service::{Response, TabletService};
use bytes::Bytes;
use shardwire_tabletconn::{read_frame, write_frame, FrameService, SessionId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Serves a [`TabletService`] over length-delimited TCP frames.
///
/// Each connection carries sequential unary calls, or one streaming call
/// whose frames are written until the end marker. A connection is one
/// session: transactions it leaves open are rolled back when it ends.
///
/// # Example
///
/// ```no_run
/// use shardwire_tablet::{MemoryEngine, ServerConfig, TabletServer, TabletService};
/// use std::sync::Arc;
///
/// # async fn demo() -> shardwire_tablet::ServerResult<()> {
/// let config = ServerConfig::default();
/// let service = Arc::new(TabletService::new(config, Arc::new(MemoryEngine::new())));
/// let server = TabletServer::new(service);
/// let listener = server.bind().await?;
/// server.serve(listener, async { let _ = tokio::signal::ctrl_c().await; }).await
/// # }
/// ```
pub struct TabletServer {
    service: Arc<TabletService>,
}

impl TabletServer {
    /// Creates a server for `service`.
    pub fn new(service: Arc<TabletService>) -> Self {
        Self { service }
    }

    /// Returns the served service.
    pub fn service(&self) -> &Arc<TabletService> {
        &self.service
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        Ok(TcpListener::bind(self.service.config().bind_addr).await?)
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Health snapshots are refreshed from the engine every
    /// `health_interval`. Open connections are dropped at shutdown.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        info!(%addr, target = %self.service.target(), "tablet serving");

        let period = self.service.config().health_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.service.publish_health(),
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        debug!(%peer, "client connected");
                        let service = Arc::clone(&self.service);
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(service, socket).await {
                                warn!(%peer, error = %e, "connection failed");
                            }
                            debug!(%peer, "client disconnected");
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        connections.abort_all();
        while connections.join_next().await.is_some() {}
        info!(%addr, "tablet stopped");
        Ok(())
    }
}

/// Closes a connection's session however the connection ends.
struct SessionGuard {
    service: Arc<TabletService>,
    session: SessionId,
}

impl SessionGuard {
    fn open(service: Arc<TabletService>) -> Self {
        let session = service.open_session();
        Self { service, session }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.service.close_session(self.session);
    }
}

async fn serve_connection(service: Arc<TabletService>, mut socket: TcpStream) -> ServerResult<()> {
    socket.set_nodelay(true)?;
    let max_frame_len = service.config().max_frame_len;
    let guard = SessionGuard::open(service);
    while let Some(request) = read_frame(&mut socket, max_frame_len).await? {
        match guard.service.respond(guard.session, &request) {
            Response::Unary(reply) => write_frame(&mut socket, &reply).await?,
            Response::Stream(frames) => forward_stream(&mut socket, frames).await?,
        }
    }
    Ok(())
}

/// Writes stream frames until the producer finishes or the client hangs up.
async fn forward_stream(socket: &mut TcpStream, mut frames: mpsc::Receiver<Bytes>) -> ServerResult<()> {
    let (mut reader, mut writer) = socket.split();
    let mut peek = [0u8; 1];
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => write_frame(&mut writer, &frame).await?,
                None => return Ok(()),
            },
            read = reader.read(&mut peek) => {
                return match read? {
                    0 => Ok(()),
                    _ => Err(TabletServerError::InvalidRequest(
                        "unexpected data on a streaming connection".into(),
                    )),
                };
            }
        }
    }
}
