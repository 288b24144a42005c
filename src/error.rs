use crate::registers::Register;
use thiserror::Error;

/// Errors returned by the driver. `E` is the error type of the I2C bus.
///
/// Input validation errors (`InvalidParameter`, `InvalidLibrary`,
/// `IndexOutOfRange`) are raised before any bus transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrvError<E> {
    /// The I2C transaction failed (NACK, timeout, arbitration loss).
    #[error("I2C bus error")]
    Bus(E),
    /// The STATUS register reported a part this driver does not handle.
    #[error("unsupported device id {0}")]
    DeviceIdError(u8),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("library {0} is outside 0..=7")]
    InvalidLibrary(u8),
    #[error("index {0} is out of range")]
    IndexOutOfRange(usize),
    /// A register held a value outside the known encoding, which points to a
    /// communication fault or an unsupported chip revision.
    #[error("register {register:?} holds undecodable value {value:#04x}")]
    DecodeError { register: Register, value: u8 },
    /// GO did not self-clear before the calibration deadline.
    #[error("auto-calibration did not complete in time")]
    CalibrationTimeout,
    /// DIAG_RESULT reported that calibration did not converge.
    #[error("auto-calibration failed")]
    CalibrationFailed,
    /// DIAG_RESULT reported a missing, shorted or misbehaving actuator.
    #[error("actuator diagnostics failed")]
    DiagnosticsFailed,
}
