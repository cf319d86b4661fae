//! Linux process operations implementation

use abroot_errors::{Error, PlatformError};
use abroot_events::{AppEvent, PlatformEvent};
use async_trait::async_trait;
use std::time::Instant;
use tokio::process::Command;

use super::duration_to_millis;
use crate::core::PlatformContext;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Linux implementation of process operations
pub struct LinuxProcessOperations;

impl LinuxProcessOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxProcessOperations {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessOperations for LinuxProcessOperations {
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        let start = Instant::now();
        ctx.emit_event(AppEvent::Platform(PlatformEvent::ProcessExecutionStarted {
            command: cmd.program().to_string(),
            args: cmd.get_args().to_vec(),
        }));

        let mut command = Command::new(cmd.program());
        command.args(cmd.get_args());

        let result = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlatformError::CommandNotFound {
                    command: cmd.program().to_string(),
                }
            } else {
                PlatformError::ProcessExecutionFailed {
                    command: cmd.display(),
                    message: e.to_string(),
                }
            }
        });

        let duration_ms = duration_to_millis(start.elapsed());
        match result {
            Ok(output) => {
                ctx.emit_event(AppEvent::Platform(
                    PlatformEvent::ProcessExecutionCompleted {
                        command: cmd.program().to_string(),
                        exit_code: output.status.code().unwrap_or(-1),
                        duration_ms,
                        stdout_bytes: output.stdout.len(),
                        stderr_bytes: output.stderr.len(),
                    },
                ));
                Ok(CommandOutput {
                    status: output.status,
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            Err(e) => {
                ctx.emit_event(AppEvent::Platform(PlatformEvent::ProcessExecutionFailed {
                    command: cmd.program().to_string(),
                    error_message: e.to_string(),
                    duration_ms,
                }));
                Err(Error::from(e))
            }
        }
    }
}
