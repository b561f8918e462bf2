//! In-process transport that hands frames straight to a tablet service.
//!
//! Useful for tests and for embedding a tablet in the same process without
//! network overhead. Behaviour matches the TCP transport frame for frame.

use crate::channel::{FrameReceiver, RpcChannel};
use crate::config::ConnConfig;
use crate::conn::TabletConn;
use crate::context::Context;
use crate::dialer::TabletDialer;
use crate::error::{TabletError, TabletResult};
use crate::rpc_conn::RpcTabletConn;
use crate::tcp::RPC_PORT;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use shardwire_types::{EndPoint, Target};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one client connection to a [`FrameService`].
pub type SessionId = u64;

/// Server side of the frame protocol.
///
/// A tablet implements this once and is then reachable over every
/// transport: the loopback channel calls it directly and the TCP listener
/// calls it per decoded frame.
///
/// Each client connection is a session. Transports open one when the
/// client connects and close it when the client goes away, whether or not
/// it said goodbye, so state tied to the connection is never stranded.
#[async_trait]
pub trait FrameService: Send + Sync + 'static {
    /// Starts a session for a new client connection.
    fn open_session(&self) -> SessionId {
        0
    }

    /// Ends `session` and releases whatever it still holds.
    fn close_session(&self, _session: SessionId) {}

    /// Answers a unary request of `session` with exactly one encoded frame.
    async fn unary(&self, session: SessionId, request: Bytes) -> Bytes;

    /// Answers a streaming request. The service pushes encoded frames into
    /// the returned receiver and stops once the receiver is dropped.
    async fn stream(&self, request: Bytes) -> mpsc::Receiver<Bytes>;
}

/// Address book mapping `host:port` strings to in-process services.
#[derive(Clone, Default)]
pub struct LoopbackDirectory {
    services: Arc<RwLock<HashMap<String, Arc<dyn FrameService>>>>,
}

impl fmt::Debug for LoopbackDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.services.read().keys()).finish()
    }
}

impl LoopbackDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `service` reachable at `endpoint`.
    pub fn register(&self, endpoint: &EndPoint, service: Arc<dyn FrameService>) -> TabletResult<()> {
        let addr = rpc_addr(endpoint)?;
        let mut services = self.services.write();
        if services.contains_key(&addr) {
            return Err(TabletError::config(format!("loopback address {addr} is taken")));
        }
        debug!(%addr, "loopback tablet registered");
        services.insert(addr, service);
        Ok(())
    }

    /// Removes the service at `endpoint`. Existing connections keep working.
    pub fn remove(&self, endpoint: &EndPoint) -> bool {
        match rpc_addr(endpoint) {
            Ok(addr) => self.services.write().remove(&addr).is_some(),
            Err(_) => false,
        }
    }

    fn lookup(&self, addr: &str) -> Option<Arc<dyn FrameService>> {
        self.services.read().get(addr).cloned()
    }
}

fn rpc_addr(endpoint: &EndPoint) -> TabletResult<String> {
    endpoint.addr(RPC_PORT).ok_or_else(|| {
        TabletError::config(format!("endpoint {} has no '{RPC_PORT}' port", endpoint.uid))
    })
}

/// Loopback implementation of [`RpcChannel`].
///
/// Holds one session on the service for its whole life; the session is
/// closed by [`RpcChannel::close`] or when the channel is dropped.
pub struct LoopbackChannel {
    service: Arc<dyn FrameService>,
    session: Option<SessionId>,
}

impl LoopbackChannel {
    /// Creates a channel to `service`.
    pub fn new(service: Arc<dyn FrameService>) -> Self {
        let session = service.open_session();
        Self {
            service,
            session: Some(session),
        }
    }

    fn session(&self) -> TabletResult<SessionId> {
        self.session.ok_or(TabletError::ConnClosed)
    }

    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.service.close_session(session);
        }
    }
}

impl Drop for LoopbackChannel {
    fn drop(&mut self) {
        self.end_session();
    }
}

#[async_trait]
impl RpcChannel for LoopbackChannel {
    async fn call(&mut self, request: Bytes) -> TabletResult<Bytes> {
        let session = self.session()?;
        Ok(self.service.unary(session, request).await)
    }

    async fn open_stream(&mut self, request: Bytes) -> TabletResult<Box<dyn FrameReceiver>> {
        self.session()?;
        Ok(Box::new(LoopbackFrames(self.service.stream(request).await)))
    }

    async fn close(&mut self) {
        self.end_session();
    }
}

struct LoopbackFrames(mpsc::Receiver<Bytes>);

#[async_trait]
impl FrameReceiver for LoopbackFrames {
    async fn recv(&mut self) -> TabletResult<Option<Bytes>> {
        Ok(self.0.recv().await)
    }
}

/// Dials services registered in a [`LoopbackDirectory`].
#[derive(Debug, Clone)]
pub struct LoopbackDialer {
    directory: LoopbackDirectory,
    config: ConnConfig,
}

impl LoopbackDialer {
    /// Creates a dialer over `directory`.
    pub fn new(directory: LoopbackDirectory, config: ConnConfig) -> Self {
        Self { directory, config }
    }
}

#[async_trait]
impl TabletDialer for LoopbackDialer {
    async fn dial(
        &self,
        ctx: &Context,
        endpoint: &EndPoint,
        target: &Target,
        _timeout: Duration,
    ) -> TabletResult<Box<dyn TabletConn>> {
        ctx.check()?;
        let addr = rpc_addr(endpoint)?;
        let service = self.directory.lookup(&addr).ok_or_else(|| {
            TabletError::transport_retryable(format!("no loopback tablet at {addr}"))
        })?;
        debug!(%addr, %target, "dialed loopback tablet");
        Ok(Box::new(RpcTabletConn::new(
            LoopbackChannel::new(service),
            endpoint.clone(),
            target.clone(),
            self.config.clone(),
        )))
    }
}
