//! Default command dispatcher: turns commands into synthetic input.
//!
//! The dispatcher depends only on two capabilities:
//!
//! - [`InputBackend`] – presses keys, types text, moves the pointer, clicks,
//!   scrolls, and zooms.
//! - [`PowerControl`] – powers the machine off.  Only `COMMAND:SHUTDOWN`
//!   reaches it, and the host wires in a disabled implementation unless
//!   shutdown was explicitly allowed.

use std::sync::Arc;

use async_trait::async_trait;
use pcremote_core::{Command, InputCommand, SpecialKey};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::dispatch::{CommandDispatcher, DispatchError, SessionControl};
use crate::application::pointer::PointerHandle;
use crate::application::ports::Transport;

/// Error type for input injection.
#[derive(Debug, Error)]
pub enum InputError {
    /// The backend cannot inject input on this system.
    #[error("input backend unavailable: {0}")]
    Unavailable(String),

    /// One injection call failed.
    #[error("{0}")]
    Failed(String),
}

/// Error type for power control.
#[derive(Debug, Error)]
pub enum PowerError {
    #[error("remote shutdown is disabled")]
    Disabled,

    #[error("power-off command failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// Synthetic input capability.
///
/// Calls are synchronous and short; implementations must be safe to call
/// from the pointer actor and the session at the same time.
pub trait InputBackend: Send + Sync {
    fn press_key(&self, key: SpecialKey) -> Result<(), InputError>;
    fn type_text(&self, text: &str) -> Result<(), InputError>;
    fn move_pointer(&self, dx: f64, dy: f64) -> Result<(), InputError>;
    fn click(&self) -> Result<(), InputError>;
    /// Scrolls by whole steps; `steps` is never zero.
    fn scroll(&self, axis: ScrollAxis, steps: i32) -> Result<(), InputError>;
    fn zoom(&self, direction: ZoomDirection) -> Result<(), InputError>;
}

/// Privileged power-off capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn power_off(&self) -> Result<(), PowerError>;
}

// ── Pinch hysteresis ──────────────────────────────────────────────────────────

/// Scale above which a pinch can zoom in.
const ZOOM_IN_THRESHOLD: f64 = 1.0;
/// Scale change needed, since the last low point, to zoom in again.
const ZOOM_IN_STEP: f64 = 0.5;
/// Scale below which a pinch can zoom out.
const ZOOM_OUT_THRESHOLD: f64 = 0.8;
/// Scale change needed, since the last high point, to zoom out again.
const ZOOM_OUT_STEP: f64 = 0.2;

/// Turns a stream of pinch scales into discrete zoom steps.
///
/// A continuous pinch reports its scale many times per second; without
/// hysteresis every report past the threshold would zoom again.
#[derive(Debug, Default)]
pub struct PinchTracker {
    last_low: f64,
    last_high: f64,
}

impl PinchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one scale report; returns the zoom step to apply, if any.
    pub fn update(&mut self, scale: f64) -> Option<ZoomDirection> {
        let mut step = None;

        if scale < self.last_low {
            self.last_low = scale;
        }
        if scale > ZOOM_IN_THRESHOLD && (scale - self.last_low).abs() >= ZOOM_IN_STEP {
            step = Some(ZoomDirection::In);
            self.last_low = scale;
        }

        if scale > self.last_high {
            self.last_high = scale;
        } else if scale < ZOOM_OUT_THRESHOLD && (scale - self.last_high).abs() >= ZOOM_OUT_STEP {
            step = Some(ZoomDirection::Out);
            self.last_high = scale;
        }

        step
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Executes commands against an [`InputBackend`] and a [`PowerControl`].
pub struct InputCommandDispatcher {
    backend: Arc<dyn InputBackend>,
    pointer: PointerHandle,
    power: Arc<dyn PowerControl>,
    pinch: PinchTracker,
}

impl InputCommandDispatcher {
    pub fn new(
        backend: Arc<dyn InputBackend>,
        pointer: PointerHandle,
        power: Arc<dyn PowerControl>,
    ) -> Self {
        Self {
            backend,
            pointer,
            power,
            pinch: PinchTracker::new(),
        }
    }

    fn apply(&mut self, input: &InputCommand) -> Result<(), DispatchError> {
        match input {
            InputCommand::Key(key) => self.backend.press_key(*key)?,
            InputCommand::TypeText(text) => self.backend.type_text(text)?,
            InputCommand::MouseMove { dx, dy } => self
                .pointer
                .submit(*dx, *dy)
                .map_err(|_| DispatchError::PointerUnavailable)?,
            InputCommand::MouseClick => self.backend.click()?,
            InputCommand::MouseScroll { dx, dy } => {
                if *dx != 0 {
                    self.backend.scroll(ScrollAxis::Horizontal, *dx)?;
                }
                if *dy != 0 {
                    self.backend.scroll(ScrollAxis::Vertical, *dy)?;
                }
            }
            InputCommand::MousePinch { scale } => {
                if let Some(direction) = self.pinch.update(*scale) {
                    self.backend.zoom(direction)?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommandDispatcher for InputCommandDispatcher {
    async fn dispatch(
        &mut self,
        command: &Command,
        transport: &mut dyn Transport,
    ) -> Result<SessionControl, DispatchError> {
        match command {
            Command::Disconnect => {
                info!("client requested disconnect");
                transport.close().await;
                Ok(SessionControl::Terminate)
            }
            Command::Shutdown => {
                warn!("client requested host shutdown");
                transport.close().await;
                if let Err(e) = self.power.power_off().await {
                    error!(error = %e, "power-off failed");
                }
                Ok(SessionControl::Terminate)
            }
            Command::Input(input) => {
                self.apply(input)?;
                Ok(SessionControl::Continue)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
