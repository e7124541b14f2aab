//! Unified error types for the instruction layer.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! server loop's error handling uniform. Codec failures stay typed (which
//! byte boundary was violated matters for protocol debugging); backend and
//! authorization failures carry the text that ends up in the
//! `InstructionStatus` sent back to the client.

use core::fmt;

use crate::instruction::InstructionCommand;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Flatten/unflatten failed.
    Codec(CodecError),
    /// An authorization command was rejected.
    Auth(AuthError),
    /// A hardware backend hook failed.
    Backend(BackendError),
    /// The instruction carries a command this handler does not dispatch.
    UnsupportedCommand(InstructionCommand),
    /// Command execution failed on the server host.
    Execute(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Auth(e) => write!(f, "auth: {e}"),
            Self::Backend(e) => write!(f, "backend: {e}"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command: {c}"),
            Self::Execute(msg) => write!(f, "execute: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Flatten/unflatten failures. Nothing in the codec panics or reads out of
/// bounds; malformed input is reported through these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Output buffer is smaller than `flatten_size()`.
    BufferTooSmall { needed: usize, got: usize },
    /// Input buffer ended before the declared layout was satisfied.
    UnexpectedEnd { offset: usize, len: usize },
    /// A length word implies more data than the buffer provides.
    LengthMismatch { declared: usize, available: usize },
    /// The version word names a layout this decoder does not know.
    UnsupportedVersion(u32),
    /// The command word is not a known `InstructionCommand`.
    UnknownCommand(u32),
    /// The type word is not a known `InstructionType`.
    UnknownType(u32),
    /// The mode word is not a known GPIO DIO mode.
    UnknownMode(u32),
    /// A string field is not valid UTF-8.
    InvalidString,
    /// The buffer decodes to a command this instruction type cannot carry.
    CommandMismatch(u32),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { needed, got } => {
                write!(f, "buffer too small: need {needed} bytes, got {got}")
            }
            Self::UnexpectedEnd { offset, len } => {
                write!(f, "unexpected end of buffer at offset {offset} (len {len})")
            }
            Self::LengthMismatch {
                declared,
                available,
            } => write!(
                f,
                "length word declares {declared} bytes but only {available} remain"
            ),
            Self::UnsupportedVersion(v) => write!(f, "unsupported instruction version {v}"),
            Self::UnknownCommand(c) => write!(f, "unknown command word {c:#010x}"),
            Self::UnknownType(t) => write!(f, "unknown instruction type word {t:#010x}"),
            Self::UnknownMode(m) => write!(f, "unknown gpio mode word {m:#010x}"),
            Self::InvalidString => write!(f, "string field is not valid UTF-8"),
            Self::CommandMismatch(c) => {
                write!(f, "command word {c:#010x} not valid for this instruction")
            }
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

// ---------------------------------------------------------------------------
// Authorization errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Presented key is not in the authorization table.
    UnknownKey(u32),
    /// Table is already owned and the presented key is not in it.
    AlreadyAuthorized,
    /// ADDAUTH/CLEARAUTH issued while authorization is disabled.
    NotAuthorized,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(k) => write!(f, "unknown key {k:#010x}"),
            Self::AlreadyAuthorized => write!(f, "server already authorized to another key"),
            Self::NotAuthorized => write!(f, "server not authorized"),
        }
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// Failures surfaced by `GpioBackend` hook implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend does not implement this hook.
    NotImplemented(&'static str),
    /// Device open failed.
    OpenFailed(String),
    /// A register operation failed; text is passed through verbatim.
    Hardware(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented(hook) => write!(f, "{hook} not implemented"),
            Self::OpenFailed(msg) => write!(f, "device open failed: {msg}"),
            Self::Hardware(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
