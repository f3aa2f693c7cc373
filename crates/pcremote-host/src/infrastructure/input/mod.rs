//! Input injection backends.
//!
//! [`LoggingInputBackend`] records every injected action in the log and is
//! the backend the binary wires in by default.  [`mock::MockInputBackend`]
//! records actions in memory for tests.

pub mod log;
pub mod mock;

pub use self::log::LoggingInputBackend;
pub use self::mock::{InputAction, MockInputBackend};
