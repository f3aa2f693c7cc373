//! The client side of the control connection.
//!
//! ```text
//! connect()        read "CONFIRMED_CONNECTION" (plaintext)
//! pair()           send frame("MASTER_KEY_RECEIVED"), expect frame("CLIENT_AUTHENTICATED")
//! send_and_ack()   send frame(command), expect frame("ACK:" + command)
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use pcremote_core::{
    decode_line, encode,
    protocol::tokens::{ack_for, CONNECTION_CONFIRMED, PAIRING_CONFIRMATION, PAIRING_SUCCESS},
    Command, DerivedKeys, FrameBuffer,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::ClientError;

/// An open control connection to a host.
pub struct RemoteClient {
    stream: TcpStream,
    keys: DerivedKeys,
    buffer: FrameBuffer,
}

impl RemoteClient {
    /// Connects to the host's control port and checks its greeting.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectFailed`] if the TCP connection cannot be
    /// made, and [`ClientError::UnexpectedGreeting`] if the first bytes are
    /// not `CONFIRMED_CONNECTION`.
    pub async fn connect(addr: SocketAddr, keys: DerivedKeys) -> Result<Self, ClientError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::ConnectFailed { addr, source })?;
        stream.set_nodelay(true)?;

        let mut greeting = vec![0u8; CONNECTION_CONFIRMED.len()];
        stream.read_exact(&mut greeting).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ClientError::Closed,
            _ => ClientError::Io(e),
        })?;
        if greeting != CONNECTION_CONFIRMED.as_bytes() {
            return Err(ClientError::UnexpectedGreeting(
                String::from_utf8_lossy(&greeting).into_owned(),
            ));
        }
        info!("connected to host at {addr}");

        Ok(Self {
            stream,
            keys,
            buffer: FrameBuffer::default(),
        })
    }

    /// Proves possession of the shared secret.
    pub async fn pair(&mut self, timeout: Duration) -> Result<(), ClientError> {
        self.send_text(PAIRING_CONFIRMATION).await?;
        let reply = self.next_message(timeout).await?;
        if reply != PAIRING_SUCCESS {
            return Err(ClientError::PairingFailed(reply));
        }
        info!("paired with host");
        Ok(())
    }

    /// Frames and sends `plaintext`.
    pub async fn send_text(&mut self, plaintext: &str) -> Result<(), ClientError> {
        let line = encode(plaintext, &self.keys).to_line();
        self.stream.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Sends a command in its canonical wire form.
    pub async fn send_command(&mut self, command: &Command) -> Result<(), ClientError> {
        self.send_text(&command.to_string()).await
    }

    /// Writes `line` as-is, adding the newline delimiter if it is missing.
    /// Useful for sending tampered or hand-built frames.
    pub async fn send_raw_line(&mut self, line: &str) -> Result<(), ClientError> {
        self.stream.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.stream.write_all(b"\n").await?;
        }
        Ok(())
    }

    /// Waits for the next frame from the host and decodes it.
    pub async fn next_message(&mut self, timeout: Duration) -> Result<String, ClientError> {
        let line = tokio::time::timeout(timeout, self.next_line())
            .await
            .map_err(|_| ClientError::Timeout)??;
        Ok(decode_line(&line, &self.keys)?)
    }

    /// Sends `command` and waits for its acknowledgement.
    pub async fn send_and_ack(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let wire = command.to_string();
        self.send_text(&wire).await?;

        let expected = ack_for(&wire);
        let actual = self.next_message(timeout).await?;
        if actual != expected {
            return Err(ClientError::UnexpectedReply { expected, actual });
        }
        debug!(command = command.name(), "acknowledged");
        Ok(())
    }

    /// Shuts down the write half of the connection.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Vec<u8>, ClientError> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Ok(line);
            }
            let n = match self.stream.read(&mut chunk).await {
                Ok(0) => return Err(ClientError::Closed),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                    return Err(ClientError::Closed)
                }
                Err(e) => return Err(e.into()),
            };
            // Only undelimited garbage overflows; the next line is still usable.
            let _ = self.buffer.push(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcremote_core::InputCommand;
    use tokio::net::TcpListener;

    fn keys() -> DerivedKeys {
        DerivedKeys::from_parts([0x11; 32], [0x22; 32])
    }

    /// A stand-in host that greets, then answers each received line with the
    /// replies produced by `respond`.
    async fn fake_host<F>(greeting: &'static [u8], respond: F) -> SocketAddr
    where
        F: Fn(String) -> Option<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(greeting).await.unwrap();
            let keys = keys();
            let mut buffer = FrameBuffer::default();
            let mut chunk = [0u8; 4096];
            loop {
                let n = match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                buffer.push(&chunk[..n]).unwrap();
                while let Some(line) = buffer.next_line() {
                    let text = decode_line(&line, &keys).unwrap();
                    match respond(text) {
                        Some(reply) => {
                            let frame = encode(&reply, &keys).to_line();
                            stream.write_all(frame.as_bytes()).await.unwrap();
                        }
                        None => return,
                    }
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_pair_and_ack_against_fake_host() {
        // Arrange
        let addr = fake_host(CONNECTION_CONFIRMED.as_bytes(), |text| {
            if text == PAIRING_CONFIRMATION {
                Some(PAIRING_SUCCESS.to_string())
            } else {
                Some(ack_for(&text))
            }
        })
        .await;

        // Act
        let mut client = RemoteClient::connect(addr, keys()).await.unwrap();
        client.pair(Duration::from_secs(2)).await.unwrap();
        let acked = client
            .send_and_ack(
                &Command::Input(InputCommand::MouseScroll { dx: 0, dy: 3 }),
                Duration::from_secs(2),
            )
            .await;

        // Assert
        assert!(acked.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_greeting_is_rejected() {
        let addr = fake_host(b"HELLO_THERE_FRIEND!!", |_| None).await;

        let result = RemoteClient::connect(addr, keys()).await;

        assert!(matches!(result, Err(ClientError::UnexpectedGreeting(_))));
    }

    #[tokio::test]
    async fn test_pairing_fails_when_host_closes() {
        let addr = fake_host(CONNECTION_CONFIRMED.as_bytes(), |_| None).await;
        let mut client = RemoteClient::connect(addr, keys()).await.unwrap();

        let result = client.pair(Duration::from_secs(2)).await;

        assert!(matches!(result, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn test_mismatched_ack_is_reported() {
        let addr = fake_host(CONNECTION_CONFIRMED.as_bytes(), |_| Some("ACK:other".into())).await;
        let mut client = RemoteClient::connect(addr, keys()).await.unwrap();

        let result = client
            .send_and_ack(&Command::Disconnect, Duration::from_secs(2))
            .await;

        assert!(matches!(
            result,
            Err(ClientError::UnexpectedReply { ref expected, .. }) if expected == "ACK:COMMAND:DISCONNECT"
        ));
    }

    #[tokio::test]
    async fn test_silent_host_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _host = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(CONNECTION_CONFIRMED.as_bytes()).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let mut client = RemoteClient::connect(addr, keys()).await.unwrap();

        let result = client.next_message(Duration::from_millis(100)).await;

        assert!(matches!(result, Err(ClientError::Timeout)));
    }
}
