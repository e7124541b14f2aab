//! Server authorization table.
//!
//! A two-state machine owned by the server and mutated only through the
//! AUTH/ADDAUTH/CLEARAUTH control commands:
//!
//! 1. UNAUTHORIZED — `enabled` is false, the key map is empty
//! 2. Client sends AUTH with a key — table becomes AUTHORIZED, the key is
//!    recorded as `first_key` with the client's contact info
//! 3. ADDAUTH adds further keys to an already-authorized table
//! 4. CLEARAUTH removes a key; removing the last key returns the table to
//!    UNAUTHORIZED and clears `first_key`
//!
//! A key is valid only while present in the map. Locking lives in
//! [`ServerControls`](super::ServerControls); this type is the bare state.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::error::AuthError;

/// Key-table authorization state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorization {
    enabled: bool,
    key_map: BTreeMap<u32, String>,
    first_key: u32,
}

impl Authorization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The key that bootstrapped authorization; 0 while unauthorized.
    pub fn first_key(&self) -> u32 {
        self.first_key
    }

    /// A key is valid only while present in the map.
    pub fn is_valid_key(&self, key: u32) -> bool {
        self.key_map.contains_key(&key)
    }

    pub fn contact_for(&self, key: u32) -> Option<&str> {
        self.key_map.get(&key).map(String::as_str)
    }

    pub fn key_count(&self) -> usize {
        self.key_map.len()
    }

    /// AUTH: claim the table with `key`.
    ///
    /// From UNAUTHORIZED this enables authorization and records `key` as
    /// `first_key`. On an already-authorized table only a key that is
    /// already in the map succeeds — a second client cannot displace the
    /// owner.
    pub fn authorize(&mut self, key: u32, contact: &str) -> Result<(), AuthError> {
        if self.enabled {
            if self.is_valid_key(key) {
                return Ok(());
            }
            warn!("auth: AUTH rejected, table owned by key {:#010x}", self.first_key);
            return Err(AuthError::AlreadyAuthorized);
        }

        self.enabled = true;
        self.first_key = key;
        self.key_map.insert(key, contact.to_owned());
        info!("auth: authorized with first key {key:#010x} ({contact})");
        Ok(())
    }

    /// ADDAUTH: add a key to an already-authorized table.
    pub fn add_key(&mut self, key: u32, contact: &str) -> Result<(), AuthError> {
        if !self.enabled {
            warn!("auth: ADDAUTH while unauthorized");
            return Err(AuthError::NotAuthorized);
        }
        self.key_map.insert(key, contact.to_owned());
        info!("auth: added key {key:#010x} ({contact})");
        Ok(())
    }

    /// CLEARAUTH: remove a key.
    ///
    /// Removing an unknown key fails with no mutation. Removing the last
    /// key returns the table to UNAUTHORIZED and clears `first_key`;
    /// removing `first_key` while other keys remain keeps authorization
    /// enabled and leaves `first_key` as the historical bootstrap value.
    pub fn clear_key(&mut self, key: u32) -> Result<(), AuthError> {
        if !self.enabled {
            return Err(AuthError::NotAuthorized);
        }
        if self.key_map.remove(&key).is_none() {
            warn!("auth: CLEARAUTH of unknown key {key:#010x}");
            return Err(AuthError::UnknownKey(key));
        }

        if self.key_map.is_empty() {
            self.enabled = false;
            self.first_key = 0;
            info!("auth: last key cleared, authorization disabled");
        } else {
            info!("auth: cleared key {key:#010x}");
        }
        Ok(())
    }

    /// Render the table for debug traces: one `key (contact)` line per key.
    pub fn dump(&self) -> String {
        use core::fmt::Write;
        let mut out = String::new();
        for (key, contact) in &self.key_map {
            let _ = writeln!(out, "{key:#010x} ({contact})");
        }
        out
    }
}

// ── Tests ────────────────────────────────────────────────────
