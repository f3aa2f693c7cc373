//! Power-off adapters.
//!
//! [`SystemPower`] asks the operating system to shut down immediately.
//! [`DisabledPower`] refuses, and is what the host uses unless remote
//! shutdown was explicitly allowed in the configuration.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::control_input::{PowerControl, PowerError};

/// Runs the platform `shutdown` command as a child process.
#[derive(Debug)]
pub struct SystemPower {
    program: String,
    args: Vec<String>,
}

impl Default for SystemPower {
    fn default() -> Self {
        let args: &[&str] = if cfg!(target_os = "windows") {
            &["/s", "/t", "0"]
        } else {
            &["-h", "now"]
        };
        Self::with_command("shutdown", args)
    }
}

impl SystemPower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `program args...` instead of the platform shutdown command.
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn shutdown_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

#[async_trait]
impl PowerControl for SystemPower {
    async fn power_off(&self) -> Result<(), PowerError> {
        info!(program = %self.program, "powering off");
        let status = self
            .shutdown_command()
            .status()
            .await
            .map_err(|e| PowerError::Failed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(PowerError::Failed(format!("shutdown exited with {status}")))
        }
    }
}

#[derive(Debug, Default)]
pub struct DisabledPower;

#[async_trait]
impl PowerControl for DisabledPower {
    async fn power_off(&self) -> Result<(), PowerError> {
        warn!("ignoring remote shutdown request; shutdown is not allowed");
        Err(PowerError::Disabled)
    }
}
