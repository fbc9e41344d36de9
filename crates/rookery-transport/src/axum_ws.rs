//! WebSocket transport implementation backed by an already-upgraded
//! `axum` socket, for servers that need their WebSocket endpoint to share a
//! port with an ordinary HTTP router.
//!
//! [`WebSocketTransport`] owns its own [`tokio::net::TcpListener`] and is a
//! complete [`Transport`] on its own; this module is the other half of the
//! same [`Connection`] contract for callers who instead bind one `axum`
//! router (HTTP routes plus a `/ws` upgrade route) and construct a
//! connection per upgraded socket themselves, bypassing `Transport::accept`
//! entirely.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh [`ConnectionId`], shared with [`WebSocketTransport`]'s
/// counter only in spirit — each binds its own atomic, since the two paths
/// never accept connections into the same process role at once.
pub fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// A WebSocket connection that was upgraded by an `axum` router rather than
/// accepted from a raw [`tokio::net::TcpListener`].
///
/// `axum::extract::ws::WebSocket` splits into two independently-owned
/// halves, so each gets its own mutex rather than sharing one the way
/// [`crate::WebSocketConnection`] shares a single stream — the sink and the
/// stream are never contended against each other here.
pub struct AxumWsConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
}

impl AxumWsConnection {
    pub fn new(id: ConnectionId, socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        AxumWsConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

impl Connection for AxumWsConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Binary(data.to_vec().into()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
