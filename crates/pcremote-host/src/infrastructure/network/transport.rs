//! TCP control connection.
//!
//! [`TcpAcceptor`] binds the control port only while the host waits for a
//! client, accepts exactly one connection, and greets it with the plaintext
//! token `CONFIRMED_CONNECTION`.  The token is not authenticated; it only
//! tells the client the socket is ready for the pairing frame.
//!
//! [`StreamTransport`] wraps any tokio byte stream so the application layer
//! can be tested against in-memory streams.

use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use pcremote_core::protocol::tokens::CONNECTION_CONFIRMED;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::application::ports::{ConnectionAcceptor, Transport, TransportError};

/// Bytes requested per read.
const READ_CHUNK_LEN: usize = 4096;

/// Pause after a per-connection accept error before accepting again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A [`Transport`] over any async byte stream.
pub struct StreamTransport<S> {
    stream: Option<S>,
    peer: Option<SocketAddr>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: Option<SocketAddr>) -> Self {
        Self {
            stream: Some(stream),
            peer,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_chunk(&mut self) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let mut buf = vec![0u8; READ_CHUNK_LEN];
        match stream.read(&mut buf).await {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) => Err(map_io_error(e)),
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        stream.write_all(bytes).await.map_err(map_io_error)?;
        stream.flush().await.map_err(map_io_error)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("shutdown on close failed: {e}");
            }
        }
    }

    fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Errors that mean the peer went away rather than something failing.
fn map_io_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::UnexpectedEof => TransportError::Closed,
        _ => TransportError::Failure(e),
    }
}

/// Errors from `accept` that concern one incoming connection or a passing
/// resource shortage, not the listener itself.
fn is_transient_accept_error(e: &std::io::Error) -> bool {
    if matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    ) {
        return true;
    }
    // ENFILE / EMFILE: out of file descriptors.
    #[cfg(unix)]
    if matches!(e.raw_os_error(), Some(23 | 24)) {
        return true;
    }
    false
}

/// Calls `accept` until it yields a connection, logging and retrying
/// transient errors.  Any other error is returned.
async fn accept_next<T, F, Fut>(mut accept: F) -> std::io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return Ok(accepted),
            Err(e) if is_transient_accept_error(&e) => {
                warn!("accept failed, still listening: {e}");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Accepts one control connection per [`accept`](ConnectionAcceptor::accept).
#[derive(Debug, Clone)]
pub struct TcpAcceptor {
    bind_addr: SocketAddr,
}

impl TcpAcceptor {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self { bind_addr }
    }
}

#[async_trait]
impl ConnectionAcceptor for TcpAcceptor {
    async fn accept(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        let addr = self.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed { addr, source })?;
        info!("waiting for control connection on TCP {addr}");

        loop {
            let (stream, peer) = accept_next(|| listener.accept()).await?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!("could not set TCP_NODELAY for {peer}: {e}");
            }

            let mut transport = StreamTransport::<TcpStream>::new(stream, Some(peer));
            match transport.write_all(CONNECTION_CONFIRMED.as_bytes()).await {
                Ok(()) => {
                    info!("accepted control connection from {peer}");
                    return Ok(Box::new(transport));
                }
                Err(e) => {
                    warn!("failed to confirm connection from {peer}: {e}");
                    transport.close().await;
                }
            }
        }
    }
}
