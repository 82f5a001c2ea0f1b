//! SPI register model of the MERCURY detector ASIC.
//!
//! The model reproduces the device's transaction semantics: a control byte
//! carrying the read/write bit and a page-relative start address, followed by
//! a payload that walks consecutive registers, with page select and the two
//! burst-only shift registers handled exactly as the hardware does.

/// Error taxonomy for register lookup and transaction faults.
pub mod error;
pub use error::{TransactionError, UnknownRegisterError};

/// Static register table and lookup.
pub mod registers;
pub use registers::{Register, RegisterMap, REGISTER_COUNT, REGISTER_SPACE_SIZE};

/// Transaction layout, control-byte helpers and outcome reporting.
pub mod transaction;
pub use transaction::{
    bitfield, control_byte, requested_address, Direction, ModelEvent, TransactionOutcome,
    ADDRESS_MASK, READ_TRANSACTION, RW_MASK, WRITE_TRANSACTION,
};

/// Burst-only shift-register storage.
pub mod shift;
pub use shift::{
    ShiftRegister, ShiftRegisterStore, CALIBRATION_SR_BYTES, TEST_SR_BYTES, TEST_SR_SECTORS,
    TEST_SR_SECTOR_BYTES,
};

/// Register model and transaction engine.
pub mod model;
pub use model::{
    ModelConfig, ModelSnapshot, Page, RegisterModel, WriteHook, DEFAULT_REGISTER_VALUES,
    PAGE_SIZE, SECTOR_SELECT_SHIFT, SECTOR_SELECT_WIDTH, SHARED_ADDRESS_MAX,
};

#[cfg(test)]
use proptest as _;
