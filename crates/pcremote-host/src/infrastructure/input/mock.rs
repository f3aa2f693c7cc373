//! Mock input backend for unit and integration testing.
//!
//! Records every call instead of touching the OS, so tests can assert on the
//! exact sequence of injected actions.

use std::sync::Mutex;

use pcremote_core::SpecialKey;

use crate::application::control_input::{InputBackend, InputError, ScrollAxis, ZoomDirection};

/// One recorded call on [`MockInputBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    PressKey(SpecialKey),
    TypeText(String),
    MovePointer { dx: f64, dy: f64 },
    Click,
    Scroll(ScrollAxis, i32),
    Zoom(ZoomDirection),
}

/// A recording implementation of [`InputBackend`].
#[derive(Debug, Default)]
pub struct MockInputBackend {
    actions: Mutex<Vec<InputAction>>,
    should_fail: bool,
}

impl MockInputBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every call fails with [`InputError::Failed`].
    /// Nothing is recorded.
    pub fn failing() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    /// Returns a snapshot of the recorded actions, oldest first.
    pub fn actions(&self) -> Vec<InputAction> {
        self.actions.lock().expect("lock poisoned").clone()
    }

    fn record(&self, action: InputAction) -> Result<(), InputError> {
        if self.should_fail {
            return Err(InputError::Failed("mock backend failure".to_string()));
        }
        self.actions.lock().expect("lock poisoned").push(action);
        Ok(())
    }
}

impl InputBackend for MockInputBackend {
    fn press_key(&self, key: SpecialKey) -> Result<(), InputError> {
        self.record(InputAction::PressKey(key))
    }

    fn type_text(&self, text: &str) -> Result<(), InputError> {
        self.record(InputAction::TypeText(text.to_string()))
    }

    fn move_pointer(&self, dx: f64, dy: f64) -> Result<(), InputError> {
        self.record(InputAction::MovePointer { dx, dy })
    }

    fn click(&self) -> Result<(), InputError> {
        self.record(InputAction::Click)
    }

    fn scroll(&self, axis: ScrollAxis, steps: i32) -> Result<(), InputError> {
        self.record(InputAction::Scroll(axis, steps))
    }

    fn zoom(&self, direction: ZoomDirection) -> Result<(), InputError> {
        self.record(InputAction::Zoom(direction))
    }
}
