// WebSocket listener: one text frame per input line, one text frame per
// outbound message.

use std::fmt::Display;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::server::{finish_writer, run_session, LineStream, Server};

/// Accept WebSocket clients forever, one session task per connection.
///
/// The handshake runs inside the connection task, so a slow or broken client
/// never holds up the accept loop.
pub async fn run(listener: TcpListener, server: Arc<Server>) -> anyhow::Result<()> {
    info!("WebSocket listener on {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Accepted TCP connection from {addr}");

        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr}: {e}");
                    return;
                }
            };
            serve(server, ws_stream, addr.to_string()).await;
            info!("WebSocket client {addr} closed");
        });
    }
}

/// Run one session over an established WebSocket.
pub async fn serve<S>(server: Arc<Server>, ws_stream: WebSocketStream<S>, addr: String)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (write, read) = ws_stream.split();
    let (mailbox, rx) = server.open_mailbox();
    let writer = tokio::spawn(forward_mailbox(rx, write));

    let mut lines = text_lines(read, addr);
    run_session(&server, &mut lines, mailbox).await;

    finish_writer(writer, "WebSocket").await;
}

/// Send every queued message as a text frame, then close the socket.
async fn forward_mailbox<Si>(mut rx: mpsc::Receiver<String>, mut write: Si)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(message) = rx.recv().await {
        if let Err(e) = write.send(Message::Text(message.into())).await {
            debug!("WebSocket send failed: {e}");
            return;
        }
    }
    let _ = write.close().await;
}

/// Turn raw WebSocket [`Message`] items from any [`Stream`] into input
/// lines. A close frame or a transport error ends the stream.
///
/// Generic over the stream so it can be tested with in-memory message lists.
pub fn text_lines<St>(read: St, addr: String) -> LineStream
where
    St: Stream<Item = Result<Message, WsError>> + Unpin + Send + 'static,
{
    Box::pin(stream::unfold((read, addr), |(mut read, addr)| async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Some((text.to_string(), (read, addr))),
                Ok(Message::Close(_)) => {
                    info!("Client {addr} sent close frame");
                    return None;
                }
                Err(e) => {
                    warn!("WebSocket error from {addr}: {e}");
                    return None;
                }
                _ => {
                    // Ignore Binary, Ping, Pong, Frame variants.
                }
            }
        }
        None
    }))
}
