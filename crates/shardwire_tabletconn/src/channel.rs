//! Wire channel abstraction underneath [`RpcTabletConn`].
//!
//! A channel moves opaque encoded frames. Unary calls send one request and
//! read back one frame; streaming calls get their own [`FrameReceiver`] so a
//! long-lived stream never blocks unary traffic.
//!
//! [`RpcTabletConn`]: crate::RpcTabletConn

use crate::error::TabletResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Request/response transport for encoded frames.
#[async_trait]
pub trait RpcChannel: Send {
    /// Sends a unary request and waits for its single reply frame.
    async fn call(&mut self, request: Bytes) -> TabletResult<Bytes>;

    /// Sends a streaming request and returns the receiver for its frames.
    async fn open_stream(&mut self, request: Bytes) -> TabletResult<Box<dyn FrameReceiver>>;

    /// Releases the channel.
    async fn close(&mut self);
}

/// Receiving half of a streaming call.
#[async_trait]
pub trait FrameReceiver: Send {
    /// Waits for the next frame. `Ok(None)` means the peer hung up.
    async fn recv(&mut self) -> TabletResult<Option<Bytes>>;
}
