//! The host state machine.
//!
//! ```text
//!            ┌────────────────────────────────────────────────┐
//!            ▼                                                │ rejected (re-arm)
//!   AwaitingDiscovery ──▶ AwaitingConnection ──▶ AwaitingPairing ──▶ AuthenticatedLoop
//!                               ▲      ▲               │                  │
//!                               │      └─ disconnected ┘                  │
//!                               └──────────── connection lost ────────────┘
//! ```
//!
//! The keys created at startup stay valid for the whole run; a client that
//! drops out can reconnect without scanning the QR code again.

use std::time::Duration;

use pcremote_core::{DerivedKeys, FrameBuffer};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::dispatch::CommandDispatcher;
use crate::application::pairing::{PairingManager, PairingOutcome};
use crate::application::ports::{
    ConnectionAcceptor, DiscoveryError, PresenceResponder, TransportError,
};
use crate::application::session::{Session, SessionEnd};
use crate::application::state::{HostEvent, SessionState};

/// Behaviour knobs for a host run.
#[derive(Debug, Clone, PartialEq)]
pub struct HostPolicy {
    /// After a rejected pairing, go back to discovery instead of exiting.
    pub rearm_after_rejection: bool,
    /// Consecutive rejected pairings (or unauthenticated frames within one
    /// session) before a compromise warning is logged.
    pub compromise_warning_threshold: u32,
    /// How long a connected client may take to confirm pairing.
    pub pairing_timeout: Option<Duration>,
    /// Maximum undelimited bytes buffered per connection.
    pub max_pending_bytes: usize,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            rearm_after_rejection: true,
            compromise_warning_threshold: 3,
            pairing_timeout: None,
            max_pending_bytes: pcremote_core::protocol::buffer::DEFAULT_MAX_PENDING_BYTES,
        }
    }
}

/// Why [`Host::run`] returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostExit {
    /// A command ended the run.
    Terminated,
    /// Pairing was rejected and re-arming is disabled.
    Rejected,
}

/// Listener-level failures that end a host run.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("control listener failed: {0}")]
    Transport(#[from] TransportError),
}

/// Drives discovery, pairing and command sessions.
pub struct Host {
    responder: Box<dyn PresenceResponder>,
    acceptor: Box<dyn ConnectionAcceptor>,
    dispatcher: Box<dyn CommandDispatcher>,
    keys: DerivedKeys,
    policy: HostPolicy,
    state: SessionState,
    consecutive_rejections: u32,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl Host {
    /// Builds a host and the receiving end of its event channel.
    pub fn new(
        responder: Box<dyn PresenceResponder>,
        acceptor: Box<dyn ConnectionAcceptor>,
        dispatcher: Box<dyn CommandDispatcher>,
        keys: DerivedKeys,
        policy: HostPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let host = Self {
            responder,
            acceptor,
            dispatcher,
            keys,
            policy,
            state: SessionState::AwaitingDiscovery,
            consecutive_rejections: 0,
            events,
        };
        (host, rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs until a command terminates the host, pairing is rejected with
    /// re-arming disabled, or a listener fails.
    pub async fn run(&mut self) -> Result<HostExit, HostError> {
        loop {
            self.transition(SessionState::AwaitingDiscovery);
            let requester = self.responder.await_discovery().await?;
            info!(%requester, "answered discovery request");

            // Connection loop: reconnects reuse the same keys.
            loop {
                self.transition(SessionState::AwaitingConnection);
                let mut transport = self.acceptor.accept().await?;
                let session_id = Uuid::new_v4();
                let peer = transport.peer();
                info!(%session_id, ?peer, "client connected");
                self.emit(HostEvent::ClientConnected { session_id, peer });

                self.transition(SessionState::AwaitingPairing);
                let mut buffer = FrameBuffer::with_limit(self.policy.max_pending_bytes);
                let outcome = PairingManager::new(&self.keys)
                    .with_timeout(self.policy.pairing_timeout)
                    .with_max_pending_bytes(self.policy.max_pending_bytes)
                    .await_confirmation_buffered(transport.as_mut(), &mut buffer)
                    .await;

                match outcome {
                    PairingOutcome::Authenticated => {
                        self.consecutive_rejections = 0;
                    }
                    PairingOutcome::Disconnected => {
                        self.emit(HostEvent::ClientDisconnected { session_id });
                        continue;
                    }
                    PairingOutcome::Rejected(reason) => {
                        self.emit(HostEvent::PairingRejected { session_id, reason });
                        self.consecutive_rejections += 1;
                        if self.consecutive_rejections == self.policy.compromise_warning_threshold {
                            warn!(
                                rejections = self.consecutive_rejections,
                                "repeated pairing rejections; someone may be probing the host"
                            );
                        }
                        self.transition(SessionState::Terminated);
                        if self.policy.rearm_after_rejection {
                            break;
                        }
                        return Ok(HostExit::Rejected);
                    }
                }

                self.transition(SessionState::AuthenticatedLoop);
                let session = Session::new(
                    session_id,
                    transport,
                    &self.keys,
                    buffer,
                    self.policy.compromise_warning_threshold,
                    self.events.clone(),
                );
                let end = session.run(self.dispatcher.as_mut()).await;
                self.emit(HostEvent::ClientDisconnected { session_id });
                self.transition(SessionState::Terminated);

                match end {
                    SessionEnd::Terminated => {
                        info!(%session_id, "host run terminated by command");
                        return Ok(HostExit::Terminated);
                    }
                    SessionEnd::ConnectionLost => {
                        info!(%session_id, "waiting for the client to reconnect");
                    }
                }
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            self.state = next;
            self.emit(HostEvent::StateChanged(next));
        }
    }

    fn emit(&self, event: HostEvent) {
        let _ = self.events.send(event);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
