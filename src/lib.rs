//! fspproto — instruction codec and dispatch layer for service-processor
//! debug servers.
//!
//! A client builds an [`instruction::Instruction`], flattens it to a
//! network-byte-order byte buffer, and hands it to a transport (not part of
//! this crate). The server side unflattens the buffer, routes it by
//! [`instruction::Instruction::hash`], and executes it against shared
//! [`server::ServerControls`] state or a [`instruction::gpio::GpioBackend`]
//! supplied by a concrete hardware driver.

pub mod buffer;
pub mod config;
pub mod instruction;
pub mod server;
pub mod status;
pub mod wire;

mod error;

pub use error::{AuthError, BackendError, CodecError, Error, Result};
