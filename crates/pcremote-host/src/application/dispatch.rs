//! The command dispatcher seam.
//!
//! The session decodes and parses every frame, then hands the typed
//! [`Command`] to a [`CommandDispatcher`].  What a command *does* is
//! entirely up to the dispatcher; the session only cares whether it should
//! keep reading.

use async_trait::async_trait;
use pcremote_core::Command;
use thiserror::Error;

use crate::application::control_input::InputError;
use crate::application::ports::Transport;

/// What the session does after a command was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    /// Keep processing frames.
    Continue,
    /// Close the connection and end the host run.
    Terminate,
}

/// Errors a dispatcher reports for one command.  The session logs them and
/// keeps going.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("input injection failed: {0}")]
    Input(#[from] InputError),

    #[error("pointer actor has stopped")]
    PointerUnavailable,
}

/// Executes parsed commands.
#[async_trait]
pub trait CommandDispatcher: Send {
    /// Acts on one command.  The dispatcher may close `transport` itself
    /// (for example before powering off); closing twice is harmless.
    async fn dispatch(
        &mut self,
        command: &Command,
        transport: &mut dyn Transport,
    ) -> Result<SessionControl, DispatchError>;
}
