//! Syscall and external tool events

use serde::{Deserialize, Serialize};

/// Observed platform operations, all at debug level unless they fail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// `atomic_swap`, `atomic_rename` or `mirror_directory` began
    FilesystemOperationStarted {
        operation: String,
        source: Option<String>,
        target: String,
    },

    FilesystemOperationCompleted {
        operation: String,
        paths: Vec<String>,
        duration_ms: u64,
    },

    FilesystemOperationFailed {
        operation: String,
        paths: Vec<String>,
        error_message: String,
        duration_ms: u64,
    },

    /// `mount`, `bind`, `overlay` or `umount` began
    MountOperationStarted {
        operation: String,
        source: Option<String>,
        target: String,
    },

    MountOperationCompleted {
        operation: String,
        target: String,
        duration_ms: u64,
    },

    MountOperationFailed {
        operation: String,
        target: String,
        error_message: String,
    },

    ProcessExecutionStarted { command: String, args: Vec<String> },

    ProcessExecutionCompleted {
        command: String,
        exit_code: i32,
        duration_ms: u64,
        stdout_bytes: usize,
        stderr_bytes: usize,
    },

    /// The process could not be spawned
    ProcessExecutionFailed {
        command: String,
        error_message: String,
        duration_ms: u64,
    },
}
