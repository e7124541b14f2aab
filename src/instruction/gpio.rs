//! GPIO instructions — pin, latch, and config register operations.
//!
//! Two wire layouts exist, selected by the `INSTRUCTION_FLAG_DEVSTR` flag
//! bit (a decoder must consult both the flag and the version word):
//!
//! ```text
//! Positional format (version 1/2):
//! First word:      version
//! Second word:     command
//! Third word:      flags
//! Fourth word:     cfamid
//! Fifth word:      linkid
//! Sixth word:      engineId
//! Seventh word:    pin
//! Eighth word:     mask
//! Ninth word:      mode
//! Tenth word:      data
//! Eleventh word:   cmaster          VERSION >= 2
//!
//! Device string format (flag INSTRUCTION_FLAG_DEVSTR, version 3):
//! First word:      version
//! Second word:     command
//! Third word:      flags
//! Fourth word:     engineId
//! Fifth word:      pin
//! Sixth word:      mask
//! Seventh word:    mode
//! Eighth word:     data
//! Ninth word:      deviceString size
//! Multiple words:  deviceString
//! ```
//!
//! Execution fans out through the [`GpioBackend`] hook set supplied by a
//! concrete hardware driver; this type is the dispatch template.

use core::fmt::Write as _;

use log::{info, warn};

use crate::buffer::DataBuffer;
use crate::error::{BackendError, CodecError, Error};
use crate::server::Handle;
use crate::status::{InstructionStatus, RC_EXECUTE_FAILURE, RC_INVALID_COMMAND};
use crate::wire::{string_field_size, WireReader, WireWriter, WORD};

use super::{Instruction, InstructionCommand, InstructionType, INSTRUCTION_FLAG_DEVSTR};

const VERSION_BASE: u32 = 1;
const VERSION_CMASTER: u32 = 2;
const VERSION_DEVSTR: u32 = 3;

// ── DIO mode ─────────────────────────────────────────────────

/// GPIO pin drive mode. Numeric values are wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GpioDioMode {
    NotUsed = 0,
    Input = 1,
    OpenDrain = 2,
    OpenSource = 3,
    PushPull = 4,
    Unconfigured = 5,
}

impl TryFrom<u32> for GpioDioMode {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, CodecError> {
        Ok(match value {
            0 => Self::NotUsed,
            1 => Self::Input,
            2 => Self::OpenDrain,
            3 => Self::OpenSource,
            4 => Self::PushPull,
            5 => Self::Unconfigured,
            other => return Err(CodecError::UnknownMode(other)),
        })
    }
}

impl core::fmt::Display for GpioDioMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::NotUsed => "GPIO_DIO_NOT_USED",
            Self::Input => "GPIO_DIO_INPUT",
            Self::OpenDrain => "GPIO_DIO_OPEN_DRAIN",
            Self::OpenSource => "GPIO_DIO_OPEN_SOURCE",
            Self::PushPull => "GPIO_DIO_PUSH_PULL",
            Self::Unconfigured => "GPIO_DIO_UNCONFIGURED",
        };
        write!(f, "{name}")
    }
}

// ── Backend hook set ─────────────────────────────────────────

/// Hardware hooks a concrete GPIO driver must supply.
///
/// The instruction layer opens a handle through [`gpio_open`] when the
/// caller has none, dispatches the command to the matching hook, and calls
/// [`gpio_ffdc`] after any hook failure so the backend can attach
/// first-failure data to the status. Read-style hooks fill `o_data` with
/// the register contents; write-style hooks take their operands from the
/// instruction (`pin`, `mask`, `mode`, `data`).
///
/// [`gpio_open`]: GpioBackend::gpio_open
/// [`gpio_ffdc`]: GpioBackend::gpio_ffdc
pub trait GpioBackend {
    fn gpio_open(
        &mut self,
        instruction: &GpioInstruction,
        o_status: &mut InstructionStatus,
    ) -> Result<Handle, BackendError>;

    fn gpio_close(&mut self, handle: Handle) -> Result<(), BackendError>;

    /// Collect first-failure data after a hook failure. Default: nothing.
    fn gpio_ffdc(&mut self, _handle: &mut Option<Handle>, _o_status: &mut InstructionStatus) {}

    fn gpio_set_mode(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_read_pin(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_read_input_pins(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_read_latch(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_write_pin(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_write_output_pins(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_read_config(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_write_config(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_write_config_set_bit(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;

    fn gpio_write_config_clear_bit(
        &mut self,
        handle: &mut Handle,
        instruction: &GpioInstruction,
        o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError>;
}

// ── GPIOInstruction ──────────────────────────────────────────

/// GPIO pin/register operation instruction.
///
/// Addressing is either positional (`cfamid`/`linkid`/`cmaster`/`engine_id`)
/// or by device string — the two modes are mutually exclusive, selected by
/// `INSTRUCTION_FLAG_DEVSTR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioInstruction {
    version: u32,
    command: InstructionCommand,
    flags: u32,
    cfamid: u32,
    linkid: u32,
    cmaster: u32,
    engine_id: u32,
    pin: u32,
    mask: u32,
    mode: GpioDioMode,
    data: u32,
    device_string: String,
}

impl Default for GpioInstruction {
    fn default() -> Self {
        Self {
            version: VERSION_BASE,
            command: InstructionCommand::GpioReadPin,
            flags: 0,
            cfamid: 0,
            linkid: 0,
            cmaster: 0,
            engine_id: 0,
            pin: 0,
            mask: 0,
            mode: GpioDioMode::NotUsed,
            data: 0,
            device_string: String::new(),
        }
    }
}

impl GpioInstruction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a positionally addressed instruction. Carries `cmaster`, so
    /// the version is 2.
    pub fn positional(
        command: InstructionCommand,
        cfamid: u32,
        linkid: u32,
        cmaster: u32,
        engine_id: u32,
        pin: u32,
        mask: u32,
        mode: GpioDioMode,
        data: u32,
        flags: u32,
    ) -> Self {
        Self {
            version: VERSION_CMASTER,
            command,
            flags,
            cfamid,
            linkid,
            cmaster,
            engine_id,
            pin,
            mask,
            mode,
            data,
            device_string: String::new(),
        }
    }

    /// Build a device-string addressed instruction (version 3, DEVSTR flag
    /// set; positional addressing fields stay zero).
    pub fn with_device_string(
        command: InstructionCommand,
        device_string: &str,
        engine_id: u32,
        pin: u32,
        mask: u32,
        mode: GpioDioMode,
        data: u32,
        flags: u32,
    ) -> Self {
        Self {
            version: VERSION_DEVSTR,
            command,
            flags: flags | INSTRUCTION_FLAG_DEVSTR,
            engine_id,
            pin,
            mask,
            mode,
            data,
            device_string: device_string.to_owned(),
            ..Self::default()
        }
    }

    fn uses_device_string(&self) -> bool {
        self.flags & INSTRUCTION_FLAG_DEVSTR != 0
    }

    pub fn device_string(&self) -> &str {
        &self.device_string
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn mode(&self) -> GpioDioMode {
        self.mode
    }

    pub fn data(&self) -> u32 {
        self.data
    }

    pub fn engine_id(&self) -> u32 {
        self.engine_id
    }

    pub fn cfamid(&self) -> u32 {
        self.cfamid
    }

    pub fn linkid(&self) -> u32 {
        self.linkid
    }

    pub fn cmaster(&self) -> u32 {
        self.cmaster
    }

    // ── Execution ────────────────────────────────────────────

    /// Dispatch this instruction through `backend`.
    ///
    /// `io_handle` threads an open device handle across consecutive
    /// instructions targeting the same device; when empty, one is opened
    /// through [`GpioBackend::gpio_open`] and left in place for the next
    /// call. Backend failures are surfaced verbatim in `o_status` and FFDC
    /// is collected through [`GpioBackend::gpio_ffdc`].
    pub fn execute(
        &self,
        backend: &mut dyn GpioBackend,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
        io_handle: &mut Option<Handle>,
    ) -> Result<(), Error> {
        o_status.instruction_version = self.version;

        if io_handle.is_none() {
            match backend.gpio_open(self, o_status) {
                Ok(handle) => *io_handle = Some(handle),
                Err(e) => {
                    warn!("gpio: open failed for {}: {e}", self.command);
                    o_status.fail(RC_EXECUTE_FAILURE, &e.to_string());
                    backend.gpio_ffdc(io_handle, o_status);
                    return Err(e.into());
                }
            }
        }
        info!("gpio: {} pin {} mask {:#x}", self.command, self.pin, self.mask);
        let result = match io_handle.as_mut() {
            None => Err(BackendError::OpenFailed(
                "backend returned no handle".to_owned(),
            )),
            Some(handle) => match self.command {
                InstructionCommand::GpioConfigPin => {
                    backend.gpio_set_mode(handle, self, o_status)
                }
                InstructionCommand::GpioReadPin => {
                    backend.gpio_read_pin(handle, self, o_data, o_status)
                }
                InstructionCommand::GpioReadPins => {
                    backend.gpio_read_input_pins(handle, self, o_data, o_status)
                }
                InstructionCommand::GpioReadLatch => {
                    backend.gpio_read_latch(handle, self, o_data, o_status)
                }
                InstructionCommand::GpioWriteLatch => {
                    backend.gpio_write_pin(handle, self, o_status)
                }
                InstructionCommand::GpioWriteLatches => {
                    backend.gpio_write_output_pins(handle, self, o_status)
                }
                InstructionCommand::GpioReadConfig => {
                    backend.gpio_read_config(handle, self, o_data, o_status)
                }
                InstructionCommand::GpioWriteConfig => {
                    backend.gpio_write_config(handle, self, o_status)
                }
                InstructionCommand::GpioWriteCnfgSet => {
                    backend.gpio_write_config_set_bit(handle, self, o_status)
                }
                InstructionCommand::GpioWriteCnfgClr => {
                    backend.gpio_write_config_clear_bit(handle, self, o_status)
                }
                other => {
                    o_status.fail(RC_INVALID_COMMAND, "not a gpio command");
                    return Err(Error::UnsupportedCommand(other));
                }
            },
        };

        if let Err(e) = result {
            warn!("gpio: {} failed: {e}", self.command);
            o_status.fail(RC_EXECUTE_FAILURE, &e.to_string());
            backend.gpio_ffdc(io_handle, o_status);
            return Err(e.into());
        }
        Ok(())
    }

    /// Release the device handle, if one is open.
    pub fn close_handle(
        &self,
        backend: &mut dyn GpioBackend,
        io_handle: &mut Option<Handle>,
    ) -> Result<(), Error> {
        if let Some(handle) = io_handle.take() {
            backend.gpio_close(handle)?;
        }
        Ok(())
    }

    fn addressing_vars(&self) -> String {
        if self.uses_device_string() {
            format!("dev {}", self.device_string)
        } else {
            format!(
                "cfam {:#x} link {:#x} cmaster {:#x} eng {}",
                self.cfamid, self.linkid, self.cmaster, self.engine_id
            )
        }
    }
}

impl Instruction for GpioInstruction {
    fn instruction_type(&self) -> InstructionType {
        InstructionType::Gpio
    }

    fn command(&self) -> InstructionCommand {
        self.command
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn flags(&self) -> u32 {
        self.flags
    }

    fn flatten(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        let needed = self.flatten_size();
        if out.len() < needed {
            return Err(CodecError::BufferTooSmall {
                needed,
                got: out.len(),
            });
        }

        let mut w = WireWriter::new(out);
        w.put_word(self.version)?;
        w.put_word(self.command as u32)?;
        w.put_word(self.flags)?;

        if self.uses_device_string() {
            w.put_word(self.engine_id)?;
            w.put_word(self.pin)?;
            w.put_word(self.mask)?;
            w.put_word(self.mode as u32)?;
            w.put_word(self.data)?;
            w.put_string(&self.device_string)?;
        } else {
            w.put_word(self.cfamid)?;
            w.put_word(self.linkid)?;
            w.put_word(self.engine_id)?;
            w.put_word(self.pin)?;
            w.put_word(self.mask)?;
            w.put_word(self.mode as u32)?;
            w.put_word(self.data)?;
            if self.version >= VERSION_CMASTER {
                w.put_word(self.cmaster)?;
            }
        }

        Ok(w.written())
    }

    fn unflatten(&mut self, data: &[u8]) -> Result<(), CodecError> {
        let mut r = WireReader::new(data);
        let version = r.get_word()?;
        if !(VERSION_BASE..=VERSION_DEVSTR).contains(&version) {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let command_word = r.get_word()?;
        let command = InstructionCommand::try_from(command_word)?;
        if command.family() != InstructionType::Gpio {
            return Err(CodecError::CommandMismatch(command_word));
        }
        let flags = r.get_word()?;

        *self = Self {
            version,
            command,
            flags,
            ..Self::default()
        };

        if self.uses_device_string() {
            self.engine_id = r.get_word()?;
            self.pin = r.get_word()?;
            self.mask = r.get_word()?;
            self.mode = GpioDioMode::try_from(r.get_word()?)?;
            self.data = r.get_word()?;
            self.device_string = r.get_string()?;
        } else {
            self.cfamid = r.get_word()?;
            self.linkid = r.get_word()?;
            self.engine_id = r.get_word()?;
            self.pin = r.get_word()?;
            self.mask = r.get_word()?;
            self.mode = GpioDioMode::try_from(r.get_word()?)?;
            self.data = r.get_word()?;
            // A version-1 buffer carries no cmaster word.
            if version >= VERSION_CMASTER {
                self.cmaster = r.get_word()?;
            }
        }

        Ok(())
    }

    fn flatten_size(&self) -> usize {
        if self.uses_device_string() {
            8 * WORD + string_field_size(&self.device_string)
        } else if self.version >= VERSION_CMASTER {
            11 * WORD
        } else {
            10 * WORD
        }
    }

    /// Packs the physical target into a fixed-width key:
    ///
    /// ```text
    /// type      cfamid(28:31)  linkid(24:31)  cmaster(24:31)  engineId(24:31)
    /// bits 0:3  bits 4:7       bits 8:15      bits 16:23      bits 24:31
    /// ```
    ///
    /// Deliberately lossy — instructions addressing the same target compare
    /// equal regardless of pin/mask/data.
    fn hash(&self) -> u64 {
        u64::from(
            ((InstructionType::Gpio as u32 & 0xF) << 28)
                | ((self.cfamid & 0xF) << 24)
                | ((self.linkid & 0xFF) << 16)
                | ((self.cmaster & 0xFF) << 8)
                | (self.engine_id & 0xFF),
        )
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "type: GPIO");
        let _ = writeln!(out, "command: {}", self.command);
        let _ = writeln!(out, "version: {}", self.version);
        let _ = writeln!(out, "flags: {:#010x}", self.flags);
        if self.uses_device_string() {
            let _ = writeln!(out, "deviceString: {}", self.device_string);
        } else {
            let _ = writeln!(out, "cfamid: {:#010x}", self.cfamid);
            let _ = writeln!(out, "linkid: {:#010x}", self.linkid);
            let _ = writeln!(out, "cmaster: {:#010x}", self.cmaster);
        }
        let _ = writeln!(out, "engineId: {:#010x}", self.engine_id);
        let _ = writeln!(out, "pin: {}", self.pin);
        let _ = writeln!(out, "mask: {:#010x}", self.mask);
        let _ = writeln!(out, "mode: {}", self.mode);
        let _ = writeln!(out, "data: {:#010x}", self.data);
        out
    }

    fn instruction_vars(&self, status: &InstructionStatus) -> String {
        format!(
            "rc {:#010x} {} pin {} mask {:#x}",
            status.rc,
            self.addressing_vars(),
            self.pin,
            self.mask
        )
    }
}

// ── Tests ────────────────────────────────────────────────────
