//! Length-delimited CBOR frames over TCP.
//!
//! Each frame is a big-endian `u32` length followed by that many payload
//! bytes. A unary call writes one request frame and reads one reply frame on
//! the connection's socket. A streaming call opens a dedicated socket, writes
//! its request and then reads frames until the end marker.

use crate::channel::{FrameReceiver, RpcChannel};
use crate::config::ConnConfig;
use crate::conn::TabletConn;
use crate::context::Context;
use crate::dialer::TabletDialer;
use crate::error::{TabletError, TabletResult};
use crate::rpc_conn::RpcTabletConn;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use shardwire_types::{EndPoint, Target};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Name of the port in an [`EndPoint`] port map that serves tablet RPC.
pub const RPC_PORT: &str = "rpc";

/// Reads one frame.
///
/// Returns `Ok(None)` if the peer closed the stream at a frame boundary.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> TabletResult<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(TabletError::Protocol(format!(
            "frame of {len} bytes exceeds limit of {max_len}"
        )));
    }
    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload.freeze()))
}

/// Writes one frame and flushes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> TabletResult<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| TabletError::Protocol(format!("frame of {} bytes is too large", payload.len())))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

async fn connect(addr: &str) -> TabletResult<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| TabletError::transport_retryable(format!("connect {addr}: {e}")))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// TCP implementation of [`RpcChannel`].
#[derive(Debug)]
pub struct TcpChannel {
    addr: String,
    stream: Option<TcpStream>,
    in_flight: bool,
    max_frame_len: usize,
}

impl TcpChannel {
    /// Connects to `addr`.
    pub async fn connect(addr: impl Into<String>, max_frame_len: usize) -> TabletResult<Self> {
        let addr = addr.into();
        let stream = connect(&addr).await?;
        Ok(Self {
            addr,
            stream: Some(stream),
            in_flight: false,
            max_frame_len,
        })
    }

    /// Returns the remote address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn roundtrip(&mut self, request: &[u8]) -> TabletResult<Bytes> {
        // A call dropped mid-flight leaves its reply unread on the socket.
        if self.in_flight {
            debug!(addr = %self.addr, "discarding socket of an abandoned call");
            self.stream = None;
        }
        if self.stream.is_none() {
            self.stream = Some(connect(&self.addr).await?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(TabletError::ConnClosed);
        };
        self.in_flight = true;
        write_frame(stream, request).await?;
        let reply = read_frame(stream, self.max_frame_len)
            .await?
            .ok_or_else(|| TabletError::transport_retryable("tablet closed the connection"))?;
        self.in_flight = false;
        Ok(reply)
    }
}

#[async_trait]
impl RpcChannel for TcpChannel {
    async fn call(&mut self, request: Bytes) -> TabletResult<Bytes> {
        let res = self.roundtrip(&request).await;
        if res.is_err() {
            self.stream = None;
            self.in_flight = false;
        }
        res
    }

    async fn open_stream(&mut self, request: Bytes) -> TabletResult<Box<dyn FrameReceiver>> {
        let mut stream = connect(&self.addr).await?;
        write_frame(&mut stream, &request).await?;
        Ok(Box::new(TcpFrames {
            stream,
            max_frame_len: self.max_frame_len,
        }))
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!(addr = %self.addr, error = %e, "socket shutdown failed");
            }
        }
    }
}

struct TcpFrames {
    stream: TcpStream,
    max_frame_len: usize,
}

#[async_trait]
impl FrameReceiver for TcpFrames {
    async fn recv(&mut self) -> TabletResult<Option<Bytes>> {
        read_frame(&mut self.stream, self.max_frame_len).await
    }
}

/// Dials tablets over TCP.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    config: ConnConfig,
}

impl TcpDialer {
    /// Creates a dialer using `config` for every connection.
    pub fn new(config: ConnConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TabletDialer for TcpDialer {
    async fn dial(
        &self,
        ctx: &Context,
        endpoint: &EndPoint,
        target: &Target,
        timeout: Duration,
    ) -> TabletResult<Box<dyn TabletConn>> {
        let addr = endpoint.addr(RPC_PORT).ok_or_else(|| {
            TabletError::config(format!("endpoint {} has no '{RPC_PORT}' port", endpoint.uid))
        })?;
        let channel = ctx
            .with_timeout(timeout)
            .run(TcpChannel::connect(addr.clone(), self.config.max_frame_len))
            .await?;
        debug!(%addr, %target, "dialed tablet over tcp");
        Ok(Box::new(RpcTabletConn::new(
            channel,
            endpoint.clone(),
            target.clone(),
            self.config.clone(),
        )))
    }
}
