//! Mock GPIO backend for integration tests.
//!
//! Records every hook call so tests can assert on the full dispatch
//! history without touching real device registers. Failure injection is
//! per-hook-name so a test can drive the FFDC path for any command.

use fspproto::buffer::DataBuffer;
use fspproto::instruction::gpio::{GpioBackend, GpioInstruction};
use fspproto::server::Handle;
use fspproto::status::InstructionStatus;
use fspproto::BackendError;

// ── Hook call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Open { engine_id: u32 },
    Close { handle_id: u32 },
    Ffdc,
    SetMode { pin: u32 },
    ReadPin { pin: u32 },
    ReadInputPins { mask: u32 },
    ReadLatch { pin: u32 },
    WritePin { pin: u32, data: u32 },
    WriteOutputPins { mask: u32, data: u32 },
    ReadConfig { pin: u32 },
    WriteConfig { pin: u32, data: u32 },
    WriteConfigSetBit { pin: u32 },
    WriteConfigClearBit { pin: u32 },
}

// ── MockGpioBackend ──────────────────────────────────────────

pub struct MockGpioBackend {
    pub calls: Vec<BackendCall>,
    /// Value every read hook reports in word 0.
    pub read_value: u32,
    /// Hook name that should fail, if any ("open", "read_pin", ...).
    pub fail_hook: Option<&'static str>,
    next_handle_id: u32,
}

#[allow(dead_code)]
impl MockGpioBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            read_value: 0,
            fail_hook: None,
            next_handle_id: 1,
        }
    }

    pub fn failing(hook: &'static str) -> Self {
        Self {
            fail_hook: Some(hook),
            ..Self::new()
        }
    }

    pub fn last_call(&self) -> Option<&BackendCall> {
        self.calls.last()
    }

    pub fn open_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Open { .. }))
            .count()
    }

    pub fn ffdc_count(&self) -> usize {
        self.calls.iter().filter(|c| **c == BackendCall::Ffdc).count()
    }

    fn check(&self, hook: &'static str) -> Result<(), BackendError> {
        if self.fail_hook == Some(hook) {
            Err(BackendError::Hardware(format!("injected {hook} failure")))
        } else {
            Ok(())
        }
    }
}

impl Default for MockGpioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioBackend for MockGpioBackend {
    fn gpio_open(
        &mut self,
        instruction: &GpioInstruction,
        _o_status: &mut InstructionStatus,
    ) -> Result<Handle, BackendError> {
        self.calls.push(BackendCall::Open {
            engine_id: instruction.engine_id(),
        });
        self.check("open")?;
        let id = self.next_handle_id;
        self.next_handle_id += 1;
        Ok(Box::new(id))
    }

    fn gpio_close(&mut self, handle: Handle) -> Result<(), BackendError> {
        let handle_id = *handle
            .downcast::<u32>()
            .map_err(|_| BackendError::Hardware("foreign handle type".to_owned()))?;
        self.calls.push(BackendCall::Close { handle_id });
        Ok(())
    }

    fn gpio_ffdc(&mut self, _handle: &mut Option<Handle>, o_status: &mut InstructionStatus) {
        self.calls.push(BackendCall::Ffdc);
        o_status.append("mock ffdc");
    }

    fn gpio_set_mode(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::SetMode {
            pin: instruction.pin(),
        });
        self.check("set_mode")
    }

    fn gpio_read_pin(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::ReadPin {
            pin: instruction.pin(),
        });
        self.check("read_pin")?;
        o_data.set_word(0, self.read_value);
        Ok(())
    }

    fn gpio_read_input_pins(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::ReadInputPins {
            mask: instruction.mask(),
        });
        self.check("read_input_pins")?;
        o_data.set_word(0, self.read_value & instruction.mask());
        Ok(())
    }

    fn gpio_read_latch(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::ReadLatch {
            pin: instruction.pin(),
        });
        self.check("read_latch")?;
        o_data.set_word(0, self.read_value);
        Ok(())
    }

    fn gpio_write_pin(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::WritePin {
            pin: instruction.pin(),
            data: instruction.data(),
        });
        self.check("write_pin")
    }

    fn gpio_write_output_pins(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::WriteOutputPins {
            mask: instruction.mask(),
            data: instruction.data(),
        });
        self.check("write_output_pins")
    }

    fn gpio_read_config(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        o_data: &mut DataBuffer,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::ReadConfig {
            pin: instruction.pin(),
        });
        self.check("read_config")?;
        o_data.set_word(0, self.read_value);
        Ok(())
    }

    fn gpio_write_config(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::WriteConfig {
            pin: instruction.pin(),
            data: instruction.data(),
        });
        self.check("write_config")
    }

    fn gpio_write_config_set_bit(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::WriteConfigSetBit {
            pin: instruction.pin(),
        });
        self.check("write_config_set_bit")
    }

    fn gpio_write_config_clear_bit(
        &mut self,
        _handle: &mut Handle,
        instruction: &GpioInstruction,
        _o_status: &mut InstructionStatus,
    ) -> Result<(), BackendError> {
        self.calls.push(BackendCall::WriteConfigClearBit {
            pin: instruction.pin(),
        });
        self.check("write_config_clear_bit")
    }
}
