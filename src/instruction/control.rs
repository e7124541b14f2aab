//! Control instructions — administrative commands and server queries.
//!
//! Wire layout (all words network byte order):
//!
//! ```text
//! First word:      version
//! Second word:     command
//! Third word:      flags
//! Multiple words:  commandToRun     (RUN_CMD, CHICDOIPL, GETFILE)
//! Words:           fileStart, fileChunkSize   (GETFILE, version >= 2)
//! Fourth word:     key              (AUTH, ADDAUTH, CLEARAUTH)
//! Multiple words:  contactInfo      (ADDAUTH)
//! Words:           isteps, timeout  (SNDISTEPMSG, version >= 4)
//! ```
//!
//! Strings are a length word followed by raw bytes; absence is length 0.
//! Version ladder: 1 = base layouts, 2 = adds the GETFILE chunk words,
//! 4 = the SNDISTEPMSG layout. Decoders accept 1..=4.

use core::fmt::Write as _;
use std::process::Command;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::buffer::DataBuffer;
use crate::error::{CodecError, Error};
use crate::server::{ServerControls, SessionKey};
use crate::status::{
    InstructionStatus, RC_AUTHORIZATION_FAILURE, RC_COMMAND_NOT_SUPPORTED, RC_EXECUTE_FAILURE,
    RC_INVALID_COMMAND, RC_SUCCESS,
};
use crate::wire::{string_field_size, WireReader, WireWriter, WORD};

use super::{Instruction, InstructionCommand, InstructionType};

const VERSION_BASE: u32 = 1;
const VERSION_GETFILE: u32 = 2;
const VERSION_ISTEP: u32 = 4;
const VERSION_MAX: u32 = 4;

/// Format word written first in the INFO response block.
pub const INFO_FORMAT_VERSION: u32 = 1;

// ── Server machine type ──────────────────────────────────────

/// Machine type reported in word 1 of the INFO response.
///
/// Numeric values are wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ServerMachineType {
    Csp = 0,
    Bpc = 1,
    Fsp = 2,
    Sjm = 3,
    Proxy = 4,
    Sim = 5,
    Loft = 6,
    Tester6682 = 7,
    SimDispatcher = 8,
    /// Set client-side when the INFO query could not be run.
    Undefined = 9,
    Icon = 10,
    Ftdi = 11,
    Gsd2Pib = 12,
    D2c = 13,
    Bmc = 14,
}

impl TryFrom<u32> for ServerMachineType {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, CodecError> {
        Ok(match value {
            0 => Self::Csp,
            1 => Self::Bpc,
            2 => Self::Fsp,
            3 => Self::Sjm,
            4 => Self::Proxy,
            5 => Self::Sim,
            6 => Self::Loft,
            7 => Self::Tester6682,
            8 => Self::SimDispatcher,
            9 => Self::Undefined,
            10 => Self::Icon,
            11 => Self::Ftdi,
            12 => Self::Gsd2Pib,
            13 => Self::D2c,
            14 => Self::Bmc,
            other => return Err(CodecError::UnknownType(other)),
        })
    }
}

impl core::fmt::Display for ServerMachineType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Csp => "CSP",
            Self::Bpc => "BPC",
            Self::Fsp => "FSP",
            Self::Sjm => "SJM",
            Self::Proxy => "PROXY",
            Self::Sim => "SIM",
            Self::Loft => "LOFT",
            Self::Tester6682 => "6682TESTER",
            Self::SimDispatcher => "SIMDISPATCHER",
            Self::Undefined => "UNDEFINED",
            Self::Icon => "ICON",
            Self::Ftdi => "FTDI",
            Self::Gsd2Pib => "GSD2PIB",
            Self::D2c => "D2C",
            Self::Bmc => "BMC",
        };
        write!(f, "{name}")
    }
}

/// Decoded INFO response block (client side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTypeInfo {
    pub machine_type: ServerMachineType,
    pub tms_mask: u32,
    pub tck_mask: u32,
    pub tdi_mask: u32,
    pub tdo_mask: u32,
    pub flags: u32,
}

impl ServerTypeInfo {
    /// Parse the 7-word INFO response produced by [`ControlInstruction::execute`].
    pub fn from_buffer(data: &DataBuffer) -> Result<Self, CodecError> {
        if data.word_length() < 7 {
            return Err(CodecError::UnexpectedEnd {
                offset: data.word_length() * WORD,
                len: 7 * WORD,
            });
        }
        let format = data.word(0);
        if format != INFO_FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(format));
        }
        Ok(Self {
            machine_type: ServerMachineType::try_from(data.word(1))?,
            tms_mask: data.word(2),
            tck_mask: data.word(3),
            tdi_mask: data.word(4),
            tdo_mask: data.word(5),
            flags: data.word(6),
        })
    }
}

// ── ControlInstruction ───────────────────────────────────────

/// Administrative/control command instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInstruction {
    version: u32,
    command: InstructionCommand,
    flags: u32,
    command_to_run: String,
    file_start: u32,
    file_chunk_size: u32,
    key: u32,
    contact_info: String,
    major_istep: u16,
    minor_istep: u16,
    timeout: i32,
}

impl Default for ControlInstruction {
    fn default() -> Self {
        Self {
            version: VERSION_BASE,
            command: InstructionCommand::Info,
            flags: 0,
            command_to_run: String::new(),
            file_start: 0,
            file_chunk_size: 0,
            key: 0,
            contact_info: String::new(),
            major_istep: 0,
            minor_istep: 0,
            timeout: 0,
        }
    }
}

impl ControlInstruction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a command-carrying instruction (INFO, RUN_CMD, CHICDOIPL,
    /// VERSION, FLIGHTRECORDER, EXIT).
    pub fn with_command(
        command: InstructionCommand,
        flags: u32,
        command_to_run: Option<&str>,
    ) -> Self {
        Self {
            command,
            flags,
            command_to_run: command_to_run.unwrap_or_default().to_owned(),
            ..Self::default()
        }
    }

    /// Build a GETFILE instruction; chunk bounds are in bytes.
    pub fn get_file(path: &str, flags: u32, file_start: u32, file_chunk_size: u32) -> Self {
        Self {
            version: VERSION_GETFILE,
            command: InstructionCommand::GetFile,
            flags,
            command_to_run: path.to_owned(),
            file_start,
            file_chunk_size,
            ..Self::default()
        }
    }

    /// Build an authorization instruction (AUTH, ADDAUTH, CLEARAUTH).
    pub fn with_auth(
        command: InstructionCommand,
        key: u32,
        flags: u32,
        contact_info: Option<&str>,
    ) -> Self {
        Self {
            command,
            flags,
            key,
            contact_info: contact_info.unwrap_or_default().to_owned(),
            ..Self::default()
        }
    }

    /// Build a SNDISTEPMSG instruction.
    pub fn istep_msg(major: u16, minor: u16, timeout: i32, flags: u32) -> Self {
        Self {
            version: VERSION_ISTEP,
            command: InstructionCommand::SendIstepMsg,
            flags,
            major_istep: major,
            minor_istep: minor,
            timeout,
            ..Self::default()
        }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn command_to_run(&self) -> &str {
        &self.command_to_run
    }

    pub fn contact_info(&self) -> &str {
        &self.contact_info
    }

    fn carries_command_string(&self) -> bool {
        matches!(
            self.command,
            InstructionCommand::RunCmd
                | InstructionCommand::ChicDoIpl
                | InstructionCommand::GetFile
        )
    }

    fn carries_key(&self) -> bool {
        matches!(
            self.command,
            InstructionCommand::Auth | InstructionCommand::AddAuth | InstructionCommand::ClearAuth
        )
    }

    /// Commands gated by the authorization table once it is enabled.
    fn is_guarded(&self) -> bool {
        matches!(
            self.command,
            InstructionCommand::RunCmd
                | InstructionCommand::GetFile
                | InstructionCommand::ChicDoIpl
                | InstructionCommand::Exit
                | InstructionCommand::SendIstepMsg
                | InstructionCommand::AddAuth
                | InstructionCommand::ClearAuth
        )
    }

    // ── Execution ────────────────────────────────────────────

    /// Run this instruction against the shared server state.
    ///
    /// `session` carries the key presented by this connection; a successful
    /// AUTH binds it. On any failure the status rc mirrors the returned
    /// error.
    pub fn execute(
        &self,
        controls: &ServerControls,
        session: &mut SessionKey,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), Error> {
        o_status.instruction_version = self.version;

        let result = self.dispatch(controls, session, o_data, o_status);
        if o_status.rc == RC_SUCCESS && result.is_err() {
            o_status.rc = RC_EXECUTE_FAILURE;
        }

        controls.record_flight(
            InstructionType::Control,
            self.command,
            &self.instruction_vars(o_status),
        );
        result
    }

    fn dispatch(
        &self,
        controls: &ServerControls,
        session: &mut SessionKey,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), Error> {
        if self.is_guarded() && !controls.session_authorized(session) {
            warn!("control: {} rejected, session not authorized", self.command);
            o_status.fail(RC_AUTHORIZATION_FAILURE, "session not authorized");
            return Err(Error::Auth(crate::error::AuthError::NotAuthorized));
        }

        match self.command {
            InstructionCommand::Info => {
                let config = controls.config();
                o_data.set_word(0, INFO_FORMAT_VERSION);
                o_data.set_word(1, config.machine_type as u32);
                o_data.set_word(2, config.tms_mask);
                o_data.set_word(3, config.tck_mask);
                o_data.set_word(4, config.tdi_mask);
                o_data.set_word(5, config.tdo_mask);
                o_data.set_word(6, config.info_flags);
                info!("control: INFO ({})", config.machine_type);
                Ok(())
            }

            InstructionCommand::RunCmd | InstructionCommand::ChicDoIpl => {
                self.run_command(o_data, o_status)
            }

            InstructionCommand::GetFile => self.read_file_chunk(o_data, o_status),

            InstructionCommand::Auth => {
                let mut auth = controls.auth();
                match auth.authorize(self.key, &self.contact_info) {
                    Ok(()) => {
                        session.set(self.key);
                        Ok(())
                    }
                    Err(e) => {
                        o_status.fail(RC_AUTHORIZATION_FAILURE, &e.to_string());
                        Err(e.into())
                    }
                }
            }

            InstructionCommand::AddAuth => controls
                .auth()
                .add_key(self.key, &self.contact_info)
                .map_err(|e| {
                    o_status.fail(RC_AUTHORIZATION_FAILURE, &e.to_string());
                    e.into()
                }),

            InstructionCommand::ClearAuth => {
                controls.auth().clear_key(self.key).map_err(|e| {
                    o_status.fail(RC_AUTHORIZATION_FAILURE, &e.to_string());
                    e.into()
                })
            }

            InstructionCommand::Version => {
                let mut listing = String::new();
                for (name, version) in controls.versions().iter() {
                    let _ = writeln!(listing, "{name}: {version:#x}");
                }
                o_data.insert_ascii(&listing);
                Ok(())
            }

            InstructionCommand::FlightRecorder => {
                let listing = controls.flight_recorder().dump();
                o_data.insert_ascii(&listing);
                Ok(())
            }

            InstructionCommand::Exit => {
                info!("control: EXIT requested");
                controls.request_exit();
                Ok(())
            }

            InstructionCommand::SendIstepMsg => {
                // No istep backend at this layer; the codec still carries
                // the fields for servers that have one.
                o_status.fail(
                    RC_COMMAND_NOT_SUPPORTED,
                    "SNDISTEPMSG: no istep backend on this server",
                );
                Err(Error::UnsupportedCommand(self.command))
            }

            other => {
                o_status.fail(RC_INVALID_COMMAND, "not a control command");
                Err(Error::UnsupportedCommand(other))
            }
        }
    }

    fn run_command(
        &self,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), Error> {
        info!("control: {} `{}`", self.command, self.command_to_run);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command_to_run)
            .output()
            .map_err(|e| {
                let msg = format!("spawn failed: {e}");
                o_status.fail(RC_EXECUTE_FAILURE, &msg);
                Error::Execute(msg)
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        o_data.insert_ascii(&text);

        if output.status.success() {
            Ok(())
        } else {
            let msg = format!("`{}` exited with {}", self.command_to_run, output.status);
            o_status.fail(RC_EXECUTE_FAILURE, &msg);
            Err(Error::Execute(msg))
        }
    }

    fn read_file_chunk(
        &self,
        o_data: &mut DataBuffer,
        o_status: &mut InstructionStatus,
    ) -> Result<(), Error> {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = std::fs::File::open(&self.command_to_run).map_err(|e| {
            let msg = format!("open {}: {e}", self.command_to_run);
            o_status.fail(RC_EXECUTE_FAILURE, &msg);
            Error::Execute(msg)
        })?;

        let read = (|| -> std::io::Result<Vec<u8>> {
            // file_chunk_size is a wire word; the allocation is bounded by
            // the bytes actually left in the file, never by the raw word.
            let available = file
                .metadata()?
                .len()
                .saturating_sub(u64::from(self.file_start));
            let bounded = u64::from(self.file_chunk_size).min(available) as usize;
            file.seek(SeekFrom::Start(u64::from(self.file_start)))?;
            let mut chunk = vec![0u8; bounded];
            let mut filled = 0;
            // Short reads are fine; EOF inside the chunk is not an error.
            loop {
                let n = file.read(&mut chunk[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
                if filled == chunk.len() {
                    break;
                }
            }
            chunk.truncate(filled);
            Ok(chunk)
        })()
        .map_err(|e| {
            let msg = format!("read {}: {e}", self.command_to_run);
            o_status.fail(RC_EXECUTE_FAILURE, &msg);
            Error::Execute(msg)
        })?;

        // Word 0 is the byte count; the chunk follows word-packed.
        o_data.set_word(0, read.len() as u32);
        for (i, word_bytes) in read.chunks(WORD).enumerate() {
            let mut word = [0u8; WORD];
            word[..word_bytes.len()].copy_from_slice(word_bytes);
            o_data.set_word(1 + i, u32::from_be_bytes(word));
        }
        Ok(())
    }

    /// One-line `-debug5.1|C`-style listing.
    pub fn dump_short(&self) -> String {
        format!(
            "CONTROL {} v{} flags {:#010x}",
            self.command, self.version, self.flags
        )
    }
}

impl Instruction for ControlInstruction {
    fn instruction_type(&self) -> InstructionType {
        InstructionType::Control
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

        if self.carries_command_string() {
            w.put_string(&self.command_to_run)?;
        }
        if self.command == InstructionCommand::GetFile && self.version >= VERSION_GETFILE {
            w.put_word(self.file_start)?;
            w.put_word(self.file_chunk_size)?;
        }
        if self.carries_key() {
            w.put_word(self.key)?;
        }
        if self.command == InstructionCommand::AddAuth {
            w.put_string(&self.contact_info)?;
        }
        if self.command == InstructionCommand::SendIstepMsg && self.version >= VERSION_ISTEP {
            w.put_word((u32::from(self.major_istep) << 16) | u32::from(self.minor_istep))?;
            w.put_word(self.timeout as u32)?;
        }

        Ok(w.written())
    }

    fn unflatten(&mut self, data: &[u8]) -> Result<(), CodecError> {
        let mut r = WireReader::new(data);
        let version = r.get_word()?;
        if !(VERSION_BASE..=VERSION_MAX).contains(&version) {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let command_word = r.get_word()?;
        let command = InstructionCommand::try_from(command_word)?;
        if command.family() != InstructionType::Control {
            return Err(CodecError::CommandMismatch(command_word));
        }

        *self = Self {
            version,
            command,
            flags: r.get_word()?,
            ..Self::default()
        };

        if self.carries_command_string() {
            self.command_to_run = r.get_string()?;
        }
        if command == InstructionCommand::GetFile && version >= VERSION_GETFILE {
            self.file_start = r.get_word()?;
            self.file_chunk_size = r.get_word()?;
        }
        if self.carries_key() {
            self.key = r.get_word()?;
        }
        if command == InstructionCommand::AddAuth {
            self.contact_info = r.get_string()?;
        }
        if command == InstructionCommand::SendIstepMsg && version >= VERSION_ISTEP {
            let isteps = r.get_word()?;
            self.major_istep = (isteps >> 16) as u16;
            self.minor_istep = (isteps & 0xFFFF) as u16;
            self.timeout = r.get_word()? as i32;
        }

        Ok(())
    }

    fn flatten_size(&self) -> usize {
        let mut size = 3 * WORD;
        if self.carries_command_string() {
            size += string_field_size(&self.command_to_run);
        }
        if self.command == InstructionCommand::GetFile && self.version >= VERSION_GETFILE {
            size += 2 * WORD;
        }
        if self.carries_key() {
            size += WORD;
        }
        if self.command == InstructionCommand::AddAuth {
            size += string_field_size(&self.contact_info);
        }
        if self.command == InstructionCommand::SendIstepMsg && self.version >= VERSION_ISTEP {
            size += 2 * WORD;
        }
        size
    }

    /// Global commands (INFO, RUN_CMD, VERSION, FLIGHTRECORDER) hash to 0 —
    /// they are not target-specific for locking purposes. Everything else
    /// packs `(type, command)` deterministically.
    fn hash(&self) -> u64 {
        match self.command {
            InstructionCommand::Info
            | InstructionCommand::RunCmd
            | InstructionCommand::Version
            | InstructionCommand::FlightRecorder => 0,
            command => u64::from(
                ((InstructionType::Control as u32 & 0xF) << 28) | (command as u32 & 0x0FFF_FFFF),
            ),
        }
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "type: CONTROL");
        let _ = writeln!(out, "command: {}", self.command);
        let _ = writeln!(out, "version: {}", self.version);
        let _ = writeln!(out, "flags: {:#010x}", self.flags);
        match self.command {
            InstructionCommand::RunCmd | InstructionCommand::ChicDoIpl => {
                let _ = writeln!(out, "commandToRun: {}", self.command_to_run);
            }
            InstructionCommand::GetFile => {
                let _ = writeln!(out, "commandToRun: {}", self.command_to_run);
                let _ = writeln!(out, "fileStart: {}", self.file_start);
                let _ = writeln!(out, "fileChunkSize: {}", self.file_chunk_size);
            }
            InstructionCommand::Auth | InstructionCommand::ClearAuth => {
                let _ = writeln!(out, "key: {:#010x}", self.key);
            }
            InstructionCommand::AddAuth => {
                let _ = writeln!(out, "key: {:#010x}", self.key);
                let _ = writeln!(out, "contactInfo: {}", self.contact_info);
            }
            InstructionCommand::SendIstepMsg => {
                let _ = writeln!(
                    out,
                    "istep: {}.{} timeout: {}",
                    self.major_istep, self.minor_istep, self.timeout
                );
            }
            _ => {}
        }
        out
    }

    fn instruction_vars(&self, status: &InstructionStatus) -> String {
        match self.command {
            InstructionCommand::RunCmd
            | InstructionCommand::ChicDoIpl
            | InstructionCommand::GetFile => format!(
                "rc {:#010x} cmd `{}`",
                status.rc, self.command_to_run
            ),
            InstructionCommand::Auth
            | InstructionCommand::AddAuth
            | InstructionCommand::ClearAuth => {
                format!("rc {:#010x} key {:#010x}", status.rc, self.key)
            }
            InstructionCommand::SendIstepMsg => format!(
                "rc {:#010x} istep {}.{}",
                status.rc, self.major_istep, self.minor_istep
            ),
            _ => format!("rc {:#010x}", status.rc),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
