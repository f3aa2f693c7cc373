//! The authenticated command loop for one connection.
//!
//! For every complete line on the stream, in arrival order:
//!
//! 1. decode the frame; failures are logged and skipped;
//! 2. frame back `ACK:<plaintext>`;
//! 3. parse the command; unknown text is logged and skipped;
//! 4. hand the command to the [`CommandDispatcher`].
//!
//! A bad frame never ends the session.  Only the dispatcher (via
//! [`SessionControl::Terminate`]) or the connection itself can.

use pcremote_core::{
    decode_line, encode, protocol::tokens::ack_for, Command, DerivedKeys, FrameBuffer, FrameError,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::dispatch::{CommandDispatcher, SessionControl};
use crate::application::ports::{Transport, TransportError};
use crate::application::state::HostEvent;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The dispatcher asked to end the host run.
    Terminated,
    /// The connection closed or failed; the client may reconnect.
    ConnectionLost,
}

/// Per-connection state of the command loop.
pub struct Session<'k> {
    id: Uuid,
    transport: Box<dyn Transport>,
    keys: &'k DerivedKeys,
    buffer: FrameBuffer,
    auth_failures: u32,
    warning_threshold: u32,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl<'k> Session<'k> {
    /// Builds a session over an authenticated transport.
    ///
    /// `buffer` may already hold lines received right after pairing.
    pub fn new(
        id: Uuid,
        transport: Box<dyn Transport>,
        keys: &'k DerivedKeys,
        buffer: FrameBuffer,
        warning_threshold: u32,
        events: mpsc::UnboundedSender<HostEvent>,
    ) -> Self {
        Self {
            id,
            transport,
            keys,
            buffer,
            auth_failures: 0,
            warning_threshold,
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the loop until the dispatcher terminates or the connection ends.
    /// The transport is closed on return.
    pub async fn run(mut self, dispatcher: &mut dyn CommandDispatcher) -> SessionEnd {
        loop {
            while let Some(line) = self.buffer.next_line() {
                if let Some(end) = self.handle_line(&line, dispatcher).await {
                    return end;
                }
            }

            match self.transport.read_chunk().await {
                Ok(chunk) => {
                    if let Err(error) = self.buffer.push(&chunk) {
                        warn!(session_id = %self.id, %error, "dropping oversized undelimited data");
                    }
                }
                Err(TransportError::Closed) => {
                    info!(session_id = %self.id, "client closed the connection");
                    self.transport.close().await;
                    return SessionEnd::ConnectionLost;
                }
                Err(error) => {
                    warn!(session_id = %self.id, %error, "connection failed");
                    self.transport.close().await;
                    return SessionEnd::ConnectionLost;
                }
            }
        }
    }

    async fn handle_line(
        &mut self,
        line: &[u8],
        dispatcher: &mut dyn CommandDispatcher,
    ) -> Option<SessionEnd> {
        let plaintext = match decode_line(line, self.keys) {
            Ok(text) => {
                self.auth_failures = 0;
                text
            }
            Err(error) => {
                self.reject_frame(error);
                return None;
            }
        };

        if plaintext.is_empty() {
            debug!(session_id = %self.id, "ignoring empty message");
            return None;
        }

        let ack = encode(&ack_for(&plaintext), self.keys).to_line();
        if let Err(error) = self.transport.write_all(ack.as_bytes()).await {
            warn!(session_id = %self.id, %error, "failed to acknowledge message");
            self.transport.close().await;
            return Some(SessionEnd::ConnectionLost);
        }

        let command = match Command::parse(&plaintext) {
            Ok(command) => command,
            Err(error) => {
                warn!(session_id = %self.id, %error, "ignoring unrecognised message");
                return None;
            }
        };

        debug!(session_id = %self.id, command = command.name(), "dispatching");
        let control = match dispatcher.dispatch(&command, self.transport.as_mut()).await {
            Ok(control) => control,
            Err(error) => {
                warn!(session_id = %self.id, command = command.name(), %error, "command failed");
                return None;
            }
        };
        self.emit(HostEvent::CommandDispatched {
            session_id: self.id,
            command,
        });

        match control {
            SessionControl::Continue => None,
            SessionControl::Terminate => {
                self.transport.close().await;
                Some(SessionEnd::Terminated)
            }
        }
    }

    fn reject_frame(&mut self, error: FrameError) {
        warn!(session_id = %self.id, kind = error.kind(), "rejected frame");
        self.emit(HostEvent::FrameRejected {
            session_id: self.id,
            error,
        });

        if error == FrameError::InvalidAuthentication {
            self.auth_failures += 1;
            if self.auth_failures == self.warning_threshold {
                warn!(
                    session_id = %self.id,
                    failures = self.auth_failures,
                    "repeated unauthenticated frames; the connection may be under attack"
                );
            }
        }
    }

    fn emit(&self, event: HostEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
