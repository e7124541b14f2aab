//! Common instruction contract.
//!
//! An instruction is identified on the wire by (type, command, version).
//! The first three words of every flattened instruction are always
//! `version`, `command`, `flags` — a decoder dispatches on the version (and
//! for GPIO, the `INSTRUCTION_FLAG_DEVSTR` flag) before parsing the rest.

pub mod control;
pub mod gpio;

use core::fmt;

use crate::error::CodecError;
use crate::status::InstructionStatus;

// ── Flags ────────────────────────────────────────────────────
// Wire-stable bit positions within the third header word.

/// Addressing by device string instead of cfamid/linkid/cmaster.
pub const INSTRUCTION_FLAG_DEVSTR: u32 = 0x0001_0000;
/// Client asked for verbose server-side tracing of this instruction.
pub const INSTRUCTION_FLAG_DEBUG: u32 = 0x0000_0001;

// ── Instruction type ─────────────────────────────────────────

/// Instruction family carried in dispatch tables and the routing hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum InstructionType {
    Control = 1,
    Gpio = 2,
}

impl TryFrom<u32> for InstructionType {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, CodecError> {
        match value {
            1 => Ok(Self::Control),
            2 => Ok(Self::Gpio),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "CONTROL"),
            Self::Gpio => write!(f, "GPIO"),
        }
    }
}

// ── Commands ─────────────────────────────────────────────────

/// Command word shared by all instruction families.
///
/// The numeric values are wire-stable; the control and GPIO ranges are kept
/// disjoint so a misrouted buffer fails decode instead of aliasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum InstructionCommand {
    // Control commands
    Info = 0x0000_0001,
    RunCmd = 0x0000_0002,
    GetFile = 0x0000_0003,
    Auth = 0x0000_0004,
    AddAuth = 0x0000_0005,
    ClearAuth = 0x0000_0006,
    Version = 0x0000_0007,
    FlightRecorder = 0x0000_0008,
    Exit = 0x0000_0009,
    ChicDoIpl = 0x0000_000A,
    SendIstepMsg = 0x0000_000B,

    // GPIO commands
    GpioConfigPin = 0x0000_0020,
    GpioReadPin = 0x0000_0021,
    GpioReadPins = 0x0000_0022,
    GpioReadLatch = 0x0000_0023,
    GpioWriteLatch = 0x0000_0024,
    GpioWriteLatches = 0x0000_0025,
    GpioReadConfig = 0x0000_0026,
    GpioWriteConfig = 0x0000_0027,
    GpioWriteCnfgSet = 0x0000_0028,
    GpioWriteCnfgClr = 0x0000_0029,
}

impl InstructionCommand {
    /// Which instruction family carries this command.
    pub fn family(self) -> InstructionType {
        if (self as u32) < 0x20 {
            InstructionType::Control
        } else {
            InstructionType::Gpio
        }
    }
}

impl TryFrom<u32> for InstructionCommand {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, CodecError> {
        Ok(match value {
            0x01 => Self::Info,
            0x02 => Self::RunCmd,
            0x03 => Self::GetFile,
            0x04 => Self::Auth,
            0x05 => Self::AddAuth,
            0x06 => Self::ClearAuth,
            0x07 => Self::Version,
            0x08 => Self::FlightRecorder,
            0x09 => Self::Exit,
            0x0A => Self::ChicDoIpl,
            0x0B => Self::SendIstepMsg,
            0x20 => Self::GpioConfigPin,
            0x21 => Self::GpioReadPin,
            0x22 => Self::GpioReadPins,
            0x23 => Self::GpioReadLatch,
            0x24 => Self::GpioWriteLatch,
            0x25 => Self::GpioWriteLatches,
            0x26 => Self::GpioReadConfig,
            0x27 => Self::GpioWriteConfig,
            0x28 => Self::GpioWriteCnfgSet,
            0x29 => Self::GpioWriteCnfgClr,
            other => return Err(CodecError::UnknownCommand(other)),
        })
    }
}

impl fmt::Display for InstructionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "INFO",
            Self::RunCmd => "RUN_CMD",
            Self::GetFile => "GETFILE",
            Self::Auth => "AUTH",
            Self::AddAuth => "ADDAUTH",
            Self::ClearAuth => "CLEARAUTH",
            Self::Version => "VERSION",
            Self::FlightRecorder => "FLIGHTRECORDER",
            Self::Exit => "EXIT",
            Self::ChicDoIpl => "CHICDOIPL",
            Self::SendIstepMsg => "SNDISTEPMSG",
            Self::GpioConfigPin => "GPIO_CONFIGPIN",
            Self::GpioReadPin => "GPIO_READPIN",
            Self::GpioReadPins => "GPIO_READPINS",
            Self::GpioReadLatch => "GPIO_READLATCH",
            Self::GpioWriteLatch => "GPIO_WRITELATCH",
            Self::GpioWriteLatches => "GPIO_WRITELATCHES",
            Self::GpioReadConfig => "GPIO_READCONFIG",
            Self::GpioWriteConfig => "GPIO_WRITECONFIG",
            Self::GpioWriteCnfgSet => "GPIO_WRITECNFGSET",
            Self::GpioWriteCnfgClr => "GPIO_WRITECNFGCLR",
        };
        write!(f, "{name}")
    }
}

// ── Instruction contract ─────────────────────────────────────

/// Serialization and routing contract every instruction family implements.
///
/// `flatten` and `unflatten` are exact inverses; `flatten_size` is the
/// exact byte count `flatten` will produce for the current field values
/// (callers pre-allocate with it — it is not a worst-case bound). Both
/// directions fail cleanly on short or inconsistent buffers; a failed
/// unflatten leaves no guarantee about partially written fields.
pub trait Instruction {
    fn instruction_type(&self) -> InstructionType;
    fn command(&self) -> InstructionCommand;
    fn version(&self) -> u32;
    fn flags(&self) -> u32;

    /// Write the flattened instruction into `out`, returning the byte
    /// count written.
    fn flatten(&self, out: &mut [u8]) -> Result<usize, CodecError>;

    /// Reconstruct this instruction from a flattened buffer.
    fn unflatten(&mut self, data: &[u8]) -> Result<(), CodecError>;

    /// Exact number of bytes `flatten` will produce.
    fn flatten_size(&self) -> usize;

    /// Deterministic routing key. Instructions addressing the same target
    /// hash equal; the packing is deliberately lossy.
    fn hash(&self) -> u64;

    /// Multi-line field listing for server debug traces.
    fn dump(&self) -> String;

    /// One-line summary recorded in the flight recorder.
    fn instruction_vars(&self, status: &InstructionStatus) -> String;
}

/// Convenience: flatten into a freshly sized buffer.
///
/// Callers that reuse buffers call [`Instruction::flatten`] directly with
/// [`Instruction::flatten_size`].
pub fn flatten_to_vec(instruction: &dyn Instruction) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; instruction.flatten_size()];
    let written = instruction.flatten(&mut buf)?;
    buf.truncate(written);
    Ok(buf)
}

/// Peek the (version, command, flags) header words without committing to a
/// family decode. The server loop routes on this before unflattening.
pub fn peek_header(data: &[u8]) -> Result<(u32, InstructionCommand, u32), CodecError> {
    let mut reader = crate::wire::WireReader::new(data);
    let version = reader.get_word()?;
    let command = InstructionCommand::try_from(reader.get_word()?)?;
    let flags = reader.get_word()?;
    Ok((version, command, flags))
}
