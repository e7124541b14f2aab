//! Per-instruction execution status.
//!
//! Every `execute` call fills an [`InstructionStatus`]: a numeric return
//! code (0 = success) plus error text collected along the way, including
//! FFDC gathered by the backend. The status travels back to the client next
//! to the data buffer; retries, if any, happen above this layer.

use core::fmt;

// ── Return codes ─────────────────────────────────────────────
// Wire-stable values; clients switch on these.

/// Command completed.
pub const RC_SUCCESS: u32 = 0;
/// The server recognises the command but has no backing for it.
pub const RC_COMMAND_NOT_SUPPORTED: u32 = 0x0000_0201;
/// Authorization table rejected the presented key.
pub const RC_AUTHORIZATION_FAILURE: u32 = 0x0000_0202;
/// Command execution failed on the server.
pub const RC_EXECUTE_FAILURE: u32 = 0x0000_0203;
/// The instruction decoded to a command the handler cannot dispatch.
pub const RC_INVALID_COMMAND: u32 = 0x0000_0204;

/// Status record filled by `execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionStatus {
    /// Return code, `RC_SUCCESS` on the happy path.
    pub rc: u32,
    /// Version of the instruction that produced this status.
    pub instruction_version: u32,
    /// Accumulated error/FFDC text; empty on success.
    pub error_message: String,
}

impl InstructionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.rc == RC_SUCCESS
    }

    /// Record a failure rc and append its message.
    pub fn fail(&mut self, rc: u32, message: &str) {
        self.rc = rc;
        self.append(message);
    }

    /// Append a line of error/FFDC text without touching the rc.
    pub fn append(&mut self, message: &str) {
        if !message.is_empty() {
            self.error_message.push_str(message);
            if !message.ends_with('\n') {
                self.error_message.push('\n');
            }
        }
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "rc={:#010x} (success)", self.rc)
        } else {
            write!(f, "rc={:#010x} {}", self.rc, self.error_message.trim_end())
        }
    }
}
