//! Pointer-motion smoothing.
//!
//! Touch pads report many tiny deltas.  Applying each one directly makes the
//! cursor jittery, so deltas are accumulated and flushed at a fixed rate:
//!
//! 1. **Accumulate** – every `MOUSE_MOVE` adds `delta * speed_factor`.
//! 2. **Smooth** – on each tick the accumulated delta is blended with the
//!    previous one (exponential moving average).  Idle ticks decay the
//!    remembered delta so the next motion starts fresh.
//! 3. **Accelerate** – longer moves are scaled up, capped at
//!    `max_acceleration`.
//! 4. **Split** – the result is applied as `micro_steps` equal steps.
//!
//! The smoother state is owned by one tokio task (the *actor*).  The
//! dispatcher only ever sends it deltas over a channel.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::application::control_input::InputBackend;

/// Tuning constants for [`PointerSmoother`].
#[derive(Debug, Clone, PartialEq)]
pub struct PointerConfig {
    pub speed_factor: f64,
    pub smoothing_factor: f64,
    pub decay_factor: f64,
    pub base_acceleration: f64,
    pub max_acceleration: f64,
    pub acceleration_sensitivity: f64,
    pub micro_steps: u32,
    pub flush_interval: Duration,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            speed_factor: 1.5,
            smoothing_factor: 0.15,
            decay_factor: 0.3,
            base_acceleration: 1.0,
            max_acceleration: 1.5,
            acceleration_sensitivity: 0.015,
            micro_steps: 2,
            flush_interval: Duration::from_secs(1) / 60,
        }
    }
}

/// One flush worth of motion: apply `(dx, dy)` `steps` times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerStep {
    pub dx: f64,
    pub dy: f64,
    pub steps: u32,
}

/// Pure smoothing state machine.
#[derive(Debug)]
pub struct PointerSmoother {
    config: PointerConfig,
    pending: (f64, f64),
    last: (f64, f64),
}

impl PointerSmoother {
    pub fn new(config: PointerConfig) -> Self {
        Self {
            config,
            pending: (0.0, 0.0),
            last: (0.0, 0.0),
        }
    }

    /// Adds a raw delta reported by the client.
    pub fn accumulate(&mut self, dx: f64, dy: f64) {
        self.pending.0 += dx * self.config.speed_factor;
        self.pending.1 += dy * self.config.speed_factor;
    }

    /// Drains the accumulated delta.  Returns `None` on an idle tick.
    pub fn flush(&mut self) -> Option<PointerStep> {
        let (dx, dy) = std::mem::take(&mut self.pending);

        if dx == 0.0 && dy == 0.0 {
            self.last.0 *= self.config.decay_factor;
            self.last.1 *= self.config.decay_factor;
            return None;
        }

        let s = self.config.smoothing_factor;
        self.last = (s * dx + (1.0 - s) * self.last.0, s * dy + (1.0 - s) * self.last.1);

        let distance = self.last.0.hypot(self.last.1);
        let factor = (self.config.base_acceleration
            + distance * self.config.acceleration_sensitivity)
            .min(self.config.max_acceleration);

        let steps = self.config.micro_steps.max(1);
        Some(PointerStep {
            dx: self.last.0 * factor / f64::from(steps),
            dy: self.last.1 * factor / f64::from(steps),
            steps,
        })
    }
}

/// Returned by [`PointerHandle::submit`] once the actor has stopped.
#[derive(Debug, Error)]
#[error("pointer actor has stopped")]
pub struct PointerClosed;

/// Cheap, cloneable sender of pointer deltas to the actor.
#[derive(Debug, Clone)]
pub struct PointerHandle {
    tx: mpsc::UnboundedSender<(f64, f64)>,
}

impl PointerHandle {
    pub fn submit(&self, dx: f64, dy: f64) -> Result<(), PointerClosed> {
        self.tx.send((dx, dy)).map_err(|_| PointerClosed)
    }
}

/// Spawns the pointer actor on the current tokio runtime.
///
/// The actor stops, after a final flush, once every [`PointerHandle`] is
/// dropped.
pub fn spawn_pointer_actor(backend: Arc<dyn InputBackend>, config: PointerConfig) -> PointerHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<(f64, f64)>();
    let period = config.flush_interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut smoother = PointerSmoother::new(config);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                delta = rx.recv() => match delta {
                    Some((dx, dy)) => smoother.accumulate(dx, dy),
                    None => {
                        apply(backend.as_ref(), smoother.flush());
                        break;
                    }
                },
                _ = ticker.tick() => apply(backend.as_ref(), smoother.flush()),
            }
        }
        debug!("pointer actor stopped");
    });

    PointerHandle { tx }
}

fn apply(backend: &dyn InputBackend, step: Option<PointerStep>) {
    let Some(step) = step else { return };
    for _ in 0..step.steps {
        if let Err(error) = backend.move_pointer(step.dx, step.dy) {
            warn!(%error, "pointer move failed");
            break;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
