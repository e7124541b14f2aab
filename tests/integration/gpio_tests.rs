//! GPIO instruction execution against the mock backend.
//!
//! Covers the dispatch table (command → hook), handle reuse across
//! consecutive instructions, FFDC collection on failure, and handle
//! teardown.

use fspproto::buffer::DataBuffer;
use fspproto::instruction::gpio::{GpioDioMode, GpioInstruction};
use fspproto::instruction::InstructionCommand;
use fspproto::server::Handle;
use fspproto::status::{InstructionStatus, RC_EXECUTE_FAILURE, RC_INVALID_COMMAND, RC_SUCCESS};
use fspproto::Error;

use crate::mock_backend::{BackendCall, MockGpioBackend};

fn instruction(command: InstructionCommand) -> GpioInstruction {
    GpioInstruction::positional(
        command,
        0x2,
        0xFA,
        0xB,
        0xC,
        5,
        0x0000_0020,
        GpioDioMode::PushPull,
        1,
        0,
    )
}

#[test]
fn each_command_reaches_its_hook() {
    let cases = [
        (
            InstructionCommand::GpioConfigPin,
            BackendCall::SetMode { pin: 5 },
        ),
        (
            InstructionCommand::GpioReadPin,
            BackendCall::ReadPin { pin: 5 },
        ),
        (
            InstructionCommand::GpioReadPins,
            BackendCall::ReadInputPins { mask: 0x20 },
        ),
        (
            InstructionCommand::GpioReadLatch,
            BackendCall::ReadLatch { pin: 5 },
        ),
        (
            InstructionCommand::GpioWriteLatch,
            BackendCall::WritePin { pin: 5, data: 1 },
        ),
        (
            InstructionCommand::GpioWriteLatches,
            BackendCall::WriteOutputPins { mask: 0x20, data: 1 },
        ),
        (
            InstructionCommand::GpioReadConfig,
            BackendCall::ReadConfig { pin: 5 },
        ),
        (
            InstructionCommand::GpioWriteConfig,
            BackendCall::WriteConfig { pin: 5, data: 1 },
        ),
        (
            InstructionCommand::GpioWriteCnfgSet,
            BackendCall::WriteConfigSetBit { pin: 5 },
        ),
        (
            InstructionCommand::GpioWriteCnfgClr,
            BackendCall::WriteConfigClearBit { pin: 5 },
        ),
    ];

    for (command, expected) in cases {
        let mut backend = MockGpioBackend::new();
        let mut data = DataBuffer::new();
        let mut status = InstructionStatus::new();
        let mut handle: Option<Handle> = None;

        instruction(command)
            .execute(&mut backend, &mut data, &mut status, &mut handle)
            .unwrap();

        assert_eq!(status.rc, RC_SUCCESS, "{command}");
        assert_eq!(backend.last_call(), Some(&expected), "{command}");
    }
}

#[test]
fn read_pin_reports_backend_value() {
    let mut backend = MockGpioBackend::new();
    backend.read_value = 1;
    let mut data = DataBuffer::new();
    let mut status = InstructionStatus::new();
    let mut handle: Option<Handle> = None;

    instruction(InstructionCommand::GpioReadPin)
        .execute(&mut backend, &mut data, &mut status, &mut handle)
        .unwrap();

    assert_eq!(data.word(0), 1);
    assert_eq!(status.instruction_version, 2);
}

#[test]
fn handle_is_opened_once_and_reused() {
    let mut backend = MockGpioBackend::new();
    let mut status = InstructionStatus::new();
    let mut handle: Option<Handle> = None;

    for command in [
        InstructionCommand::GpioConfigPin,
        InstructionCommand::GpioWriteLatch,
        InstructionCommand::GpioReadPin,
    ] {
        let mut data = DataBuffer::new();
        instruction(command)
            .execute(&mut backend, &mut data, &mut status, &mut handle)
            .unwrap();
    }

    assert_eq!(backend.open_count(), 1);
    assert!(handle.is_some());
}

#[test]
fn open_failure_fails_status_and_collects_ffdc() {
    let mut backend = MockGpioBackend::failing("open");
    let mut data = DataBuffer::new();
    let mut status = InstructionStatus::new();
    let mut handle: Option<Handle> = None;

    let err = instruction(InstructionCommand::GpioReadPin)
        .execute(&mut backend, &mut data, &mut status, &mut handle)
        .unwrap_err();

    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(status.rc, RC_EXECUTE_FAILURE);
    assert_eq!(backend.ffdc_count(), 1);
    assert!(status.error_message.contains("mock ffdc"));
    assert!(handle.is_none());
}

#[test]
fn hook_failure_fails_status_and_collects_ffdc() {
    let mut backend = MockGpioBackend::failing("write_config");
    let mut data = DataBuffer::new();
    let mut status = InstructionStatus::new();
    let mut handle: Option<Handle> = None;

    let err = instruction(InstructionCommand::GpioWriteConfig)
        .execute(&mut backend, &mut data, &mut status, &mut handle)
        .unwrap_err();

    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(status.rc, RC_EXECUTE_FAILURE);
    assert_eq!(backend.ffdc_count(), 1);
    // The handle survives the failure so FFDC can inspect the device.
    assert!(handle.is_some());
}

#[test]
fn control_command_is_rejected_before_any_hook() {
    let mut backend = MockGpioBackend::new();
    let mut data = DataBuffer::new();
    let mut status = InstructionStatus::new();
    let mut handle: Option<Handle> = None;

    // The wire decoder rejects this mismatch outright; only a locally
    // constructed instruction can reach dispatch with a foreign command.
    let err = instruction(InstructionCommand::RunCmd)
        .execute(&mut backend, &mut data, &mut status, &mut handle)
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedCommand(_)));
    assert_eq!(status.rc, RC_INVALID_COMMAND);
    // Only the implicit open ran; no read/write hook was reached.
    assert_eq!(backend.open_count(), 1);
    assert_eq!(backend.calls.len(), 1);
}

#[test]
fn close_handle_releases_the_open_device() {
    let mut backend = MockGpioBackend::new();
    let mut data = DataBuffer::new();
    let mut status = InstructionStatus::new();
    let mut handle: Option<Handle> = None;

    let inst = instruction(InstructionCommand::GpioReadPin);
    inst.execute(&mut backend, &mut data, &mut status, &mut handle)
        .unwrap();
    inst.close_handle(&mut backend, &mut handle).unwrap();

    assert!(handle.is_none());
    assert_eq!(backend.last_call(), Some(&BackendCall::Close { handle_id: 1 }));

    // Closing with no handle open is a no-op.
    inst.close_handle(&mut backend, &mut handle).unwrap();
    assert_eq!(
        backend
            .calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Close { .. }))
            .count(),
        1
    );
}
