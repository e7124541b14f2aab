//! Flight recorder — bounded, append-only instruction trace.
//!
//! Every executed instruction leaves one entry: its type, command, and a
//! one-line vars summary. The ring holds a fixed number of entries and
//! drops the oldest on overflow; ordering is chronological append order.
//! Persistence is the server's problem, not this layer's.

use std::collections::VecDeque;

use crate::instruction::{InstructionCommand, InstructionType};

/// Longest vars summary kept per entry; longer summaries are truncated.
pub const MAX_VARS_LEN: usize = 128;

/// One recorded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightRecorderEntry {
    pub instruction_type: InstructionType,
    pub command: InstructionCommand,
    pub vars: heapless::String<MAX_VARS_LEN>,
}

/// Fixed-capacity ring of [`FlightRecorderEntry`].
#[derive(Debug)]
pub struct FlightRecorder {
    entries: VecDeque<FlightRecorderEntry>,
    capacity: usize,
}

impl FlightRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, dropping the oldest when full. `vars` is truncated
    /// to [`MAX_VARS_LEN`] bytes on a char boundary.
    pub fn record(
        &mut self,
        instruction_type: InstructionType,
        command: InstructionCommand,
        vars: &str,
    ) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        let mut bounded = heapless::String::new();
        for ch in vars.chars() {
            if bounded.push(ch).is_err() {
                break;
            }
        }

        self.entries.push_back(FlightRecorderEntry {
            instruction_type,
            command,
            vars: bounded,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &FlightRecorderEntry> {
        self.entries.iter()
    }

    /// Render the recorder as one `TYPE COMMAND vars` line per entry,
    /// oldest first — the FLIGHTRECORDER response body.
    pub fn dump(&self) -> String {
        use core::fmt::Write;
        let mut out = String::new();
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{} {} {}",
                entry.instruction_type, entry.command, entry.vars
            );
        }
        out
    }
}

// ── Tests ────────────────────────────────────────────────────
