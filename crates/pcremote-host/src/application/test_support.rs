//! In-memory doubles shared by the application-layer unit tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pcremote_core::{decode, encode, DerivedKeys, SpecialKey};

use super::control_input::{InputBackend, InputError, ScrollAxis, ZoomDirection};
use super::ports::{Transport, TransportError};

pub(crate) fn test_keys() -> DerivedKeys {
    DerivedKeys::from_parts([0x0A; 32], [0x0B; 32])
}

pub(crate) fn frame_line(plaintext: &str, keys: &DerivedKeys) -> Vec<u8> {
    encode(plaintext, keys).to_line().into_bytes()
}

/// Shared view of what a [`ScriptedTransport`] saw, kept after the
/// transport itself has been moved into the code under test.
#[derive(Clone, Default)]
pub(crate) struct TransportLog {
    written: Arc<Mutex<Vec<u8>>>,
    close_calls: Arc<Mutex<u32>>,
}

impl TransportLog {
    pub(crate) fn written_lines(&self) -> Vec<String> {
        let written = self.written.lock().unwrap();
        String::from_utf8(written.clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn decoded_lines(&self, keys: &DerivedKeys) -> Vec<String> {
        self.written_lines()
            .iter()
            .map(|line| decode(line, keys).expect("host wrote an undecodable frame"))
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.close_calls.lock().unwrap() > 0
    }
}

/// A transport that replays scripted reads and records writes.
///
/// When the script runs out, reads report [`TransportError::Closed`].
pub(crate) struct ScriptedTransport {
    reads: VecDeque<Result<Vec<u8>, TransportError>>,
    seen: TransportLog,
    fail_writes: bool,
    closed: bool,
}

impl ScriptedTransport {
    pub(crate) fn new(chunks: Vec<Vec<u8>>) -> (Self, TransportLog) {
        Self::with_reads(chunks.into_iter().map(Ok).collect())
    }

    pub(crate) fn with_reads(reads: Vec<Result<Vec<u8>, TransportError>>) -> (Self, TransportLog) {
        let seen = TransportLog::default();
        let transport = Self {
            reads: reads.into(),
            seen: seen.clone(),
            fail_writes: false,
            closed: false,
        };
        (transport, seen)
    }

    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn read_chunk(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.reads.pop_front().unwrap_or(Err(TransportError::Closed))
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.fail_writes {
            return Err(TransportError::Failure(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected failure",
            )));
        }
        self.seen.written.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
        *self.seen.close_calls.lock().unwrap() += 1;
    }

    fn peer(&self) -> Option<SocketAddr> {
        Some(SocketAddr::from(([192, 168, 1, 20], 50000)))
    }
}

/// One call seen by a [`RecordingInputBackend`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InputCall {
    PressKey(SpecialKey),
    TypeText(String),
    MovePointer { dx: f64, dy: f64 },
    Click,
    Scroll(ScrollAxis, i32),
    Zoom(ZoomDirection),
}

/// An [`InputBackend`] that records calls, or fails every call.
#[derive(Default)]
pub(crate) struct RecordingInputBackend {
    calls: Mutex<Vec<InputCall>>,
    fail: bool,
}

impl RecordingInputBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn calls(&self) -> Vec<InputCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: InputCall) -> Result<(), InputError> {
        if self.fail {
            return Err(InputError::Failed("injected failure".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl InputBackend for RecordingInputBackend {
    fn press_key(&self, key: SpecialKey) -> Result<(), InputError> {
        self.record(InputCall::PressKey(key))
    }

    fn type_text(&self, text: &str) -> Result<(), InputError> {
        self.record(InputCall::TypeText(text.to_string()))
    }

    fn move_pointer(&self, dx: f64, dy: f64) -> Result<(), InputError> {
        self.record(InputCall::MovePointer { dx, dy })
    }

    fn click(&self) -> Result<(), InputError> {
        self.record(InputCall::Click)
    }

    fn scroll(&self, axis: ScrollAxis, steps: i32) -> Result<(), InputError> {
        self.record(InputCall::Scroll(axis, steps))
    }

    fn zoom(&self, direction: ZoomDirection) -> Result<(), InputError> {
        self.record(InputCall::Zoom(direction))
    }
}
