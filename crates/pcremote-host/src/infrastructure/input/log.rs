//! An input backend that only logs what it would inject.
//!
//! Useful on headless machines and for checking the command path end to end
//! without moving the real cursor.  Typed text is never logged, only its
//! length.

use pcremote_core::SpecialKey;
use tracing::{debug, info};

use crate::application::control_input::{InputBackend, InputError, ScrollAxis, ZoomDirection};

#[derive(Debug, Default)]
pub struct LoggingInputBackend;

impl LoggingInputBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InputBackend for LoggingInputBackend {
    fn press_key(&self, key: SpecialKey) -> Result<(), InputError> {
        info!(?key, "key press");
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), InputError> {
        info!(chars = text.chars().count(), "type text");
        Ok(())
    }

    fn move_pointer(&self, dx: f64, dy: f64) -> Result<(), InputError> {
        // Up to 120 calls per second; keep it out of the default level.
        debug!(dx, dy, "pointer move");
        Ok(())
    }

    fn click(&self) -> Result<(), InputError> {
        info!("left click");
        Ok(())
    }

    fn scroll(&self, axis: ScrollAxis, steps: i32) -> Result<(), InputError> {
        info!(?axis, steps, "scroll");
        Ok(())
    }

    fn zoom(&self, direction: ZoomDirection) -> Result<(), InputError> {
        info!(?direction, "zoom");
        Ok(())
    }
}
