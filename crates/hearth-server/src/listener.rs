// Plain TCP (telnet-style) listener: newline-delimited lines in, raw text out.

use std::sync::Arc;

use futures_util::stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::server::{finish_writer, run_session, LineStream, Server};

/// Accept connections forever, one session task per connection.
pub async fn run(listener: TcpListener, server: Arc<Server>) -> anyhow::Result<()> {
    info!("TCP listener on {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Accepted TCP connection from {addr}");

        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let (read, write) = stream.into_split();
            serve(server, read, write).await;
            info!("TCP connection from {addr} closed");
        });
    }
}

/// Run one session over any byte stream pair.
pub async fn serve<R, W>(server: Arc<Server>, read: R, write: W)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (mailbox, rx) = server.open_mailbox();
    let writer = tokio::spawn(write_mailbox(rx, write));

    let mut lines = line_stream(read);
    run_session(&server, &mut lines, mailbox).await;

    finish_writer(writer, "TCP").await;
}

async fn write_mailbox<W>(mut rx: mpsc::Receiver<String>, mut write: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        if let Err(e) = write.write_all(message.as_bytes()).await {
            debug!("TCP write failed: {e}");
            return;
        }
    }
    let _ = write.shutdown().await;
}

/// Split a byte stream into lines. `\n` and `\r\n` terminators are both
/// stripped; a read error or invalid UTF-8 ends the stream.
pub fn line_stream<R>(read: R) -> LineStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let lines = BufReader::new(read).lines();
    Box::pin(stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(e) => {
                warn!("TCP read failed: {e}");
                None
            }
        }
    }))
}
