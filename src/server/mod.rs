//! Server-owned shared state.
//!
//! The server process owns one [`ServerControls`]; worker threads borrow it
//! for the duration of each `execute` call. All mutable pieces sit behind
//! their own lock so control commands from concurrent clients serialize
//! against each other; reads of the immutable config proceed lock-free.

pub mod auth;
pub mod flight_recorder;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::ServerConfig;
use crate::instruction::{InstructionCommand, InstructionType};

use auth::Authorization;
use flight_recorder::FlightRecorder;

// ── Device handle ────────────────────────────────────────────

/// Opaque per-device session token.
///
/// A backend stores whatever it needs to keep a device open across
/// consecutive instructions targeting the same hardware; the instruction
/// layer only threads it through and never looks inside. Callers must
/// serialize instructions sharing one handle — the instruction layer does
/// not arbitrate per-handle concurrency.
pub type Handle = Box<dyn Any + Send>;

// ── Per-connection session ───────────────────────────────────

/// The authorization key presented by one client connection.
///
/// Set by a successful AUTH, cleared on disconnect by the server loop.
/// Validity is always re-checked against the live table: a key revoked by
/// CLEARAUTH invalidates the session immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionKey {
    key: Option<u32>,
}

impl SessionKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: u32) {
        self.key = Some(key);
    }

    pub fn clear(&mut self) {
        self.key = None;
    }

    pub fn key(&self) -> Option<u32> {
        self.key
    }
}

// ── Shared server controls ───────────────────────────────────

/// Process-wide mutable state reachable from control-instruction execution.
pub struct ServerControls {
    config: ServerConfig,
    exit_requested: AtomicBool,
    multi_client: AtomicBool,
    auth: Mutex<Authorization>,
    flight_recorder: Mutex<FlightRecorder>,
    versions: Mutex<BTreeMap<String, u32>>,
}

impl ServerControls {
    pub fn new(config: ServerConfig) -> Self {
        let multi_client = config.multi_client;
        let recorder = FlightRecorder::new(config.flight_recorder_capacity);
        let versions = config.versions.clone();
        Self {
            config,
            exit_requested: AtomicBool::new(false),
            multi_client: AtomicBool::new(multi_client),
            auth: Mutex::new(Authorization::new()),
            flight_recorder: Mutex::new(recorder),
            versions: Mutex::new(versions),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // ── Exit flag ──

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::SeqCst)
    }

    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::SeqCst);
    }

    // ── Multi-client flag ──

    pub fn multi_client(&self) -> bool {
        self.multi_client.load(Ordering::SeqCst)
    }

    pub fn set_multi_client(&self, enabled: bool) {
        self.multi_client.store(enabled, Ordering::SeqCst);
    }

    // ── Guarded state ──

    pub fn auth(&self) -> MutexGuard<'_, Authorization> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn flight_recorder(&self) -> MutexGuard<'_, FlightRecorder> {
        self.flight_recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn versions(&self) -> MutexGuard<'_, BTreeMap<String, u32>> {
        self.versions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one flight-recorder entry.
    pub fn record_flight(
        &self,
        instruction_type: InstructionType,
        command: InstructionCommand,
        vars: &str,
    ) {
        self.flight_recorder()
            .record(instruction_type, command, vars);
    }

    /// Whether `session` may run guarded commands: always true while the
    /// authorization table is disabled, otherwise the presented key must
    /// still be in the table.
    pub fn session_authorized(&self, session: &SessionKey) -> bool {
        let auth = self.auth();
        if !auth.is_enabled() {
            return true;
        }
        session.key().is_some_and(|key| auth.is_valid_key(key))
    }
}

// ── Tests ────────────────────────────────────────────────────
