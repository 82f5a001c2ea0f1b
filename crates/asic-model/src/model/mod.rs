//! Register model and transaction engine.
//!
//! The model owns the register array and both shift registers, and is only
//! ever mutated by applying transactions. Page select and the test-pattern
//! sector are derived from register contents through [`WriteHook`]s.

/// Write-hook dispatch table.
pub mod hooks;
/// Page select state and paged address resolution.
pub mod page;

pub use hooks::{hook_for, WriteHook, WRITE_HOOKS};
pub use page::{Page, PAGE_SIZE, SHARED_ADDRESS_MAX};

use tracing::{debug, error};

use crate::{
    bitfield, requested_address, Direction, ModelEvent, Register, RegisterMap, ShiftRegister,
    ShiftRegisterStore, TransactionError, TransactionOutcome, ADDRESS_MASK, REGISTER_SPACE_SIZE,
};

/// Lowest bit of the sector-select field in `TEST_SR`.
///
/// Bits 0, 1 and 7 of `TEST_SR` carry the shift mode and trigger.
pub const SECTOR_SELECT_SHIFT: u32 = 2;
/// Bit width of the sector-select field in `TEST_SR`.
pub const SECTOR_SELECT_WIDTH: u32 = 5;

/// Power-on values of registers that do not reset to zero.
pub const DEFAULT_REGISTER_VALUES: [(Register, u8); 5] = [
    (Register::Config1, 0b0101_0000),
    (Register::FrmLngth, 200),
    (Register::IntTime, 1),
    (Register::SerBias, 0b1000_1000),
    (Register::TdcBias, 0b1000_1000),
];

/// Construction options for [`RegisterModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ModelConfig {
    /// Emit a debug log line for every stored register byte.
    pub log_register_writes: bool,
}

/// Serializable view of the observable model state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ModelSnapshot {
    /// Register array contents indexed by true address.
    pub registers: Vec<u8>,
    /// Currently selected page.
    pub page: Page,
    /// Currently selected test-pattern sector.
    pub test_sr_sector: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelState {
    registers: Box<[u8]>,
    shift_registers: ShiftRegisterStore,
    page: Page,
    test_sr_sector: u8,
}

impl ModelState {
    fn power_on() -> Self {
        let mut registers = vec![0; REGISTER_SPACE_SIZE].into_boxed_slice();
        for (register, value) in DEFAULT_REGISTER_VALUES {
            registers[register.index()] = value;
        }

        let page = Page::from_bit(bitfield(registers[Register::Config1.index()], 0, 1));
        let test_sr_sector = bitfield(
            registers[Register::TestSr.index()],
            SECTOR_SELECT_SHIFT,
            SECTOR_SELECT_WIDTH,
        );

        Self {
            registers,
            shift_registers: ShiftRegisterStore::default(),
            page,
            test_sr_sector,
        }
    }
}

/// SPI register model of a single emulated ASIC.
#[derive(Debug, Clone)]
pub struct RegisterModel {
    state: ModelState,
    config: ModelConfig,
}

impl Default for RegisterModel {
    fn default() -> Self {
        Self::with_config(ModelConfig::default())
    }
}

impl RegisterModel {
    /// Creates a model at power-on defaults.
    #[must_use]
    pub fn with_config(config: ModelConfig) -> Self {
        Self {
            state: ModelState::power_on(),
            config,
        }
    }

    /// Restores power-on defaults, clearing both shift registers.
    pub fn reset(&mut self) {
        self.state = ModelState::power_on();
    }

    /// Register array contents indexed by true address.
    #[must_use]
    pub fn registers(&self) -> &[u8] {
        &self.state.registers
    }

    /// Current value of a named register.
    #[must_use]
    pub fn register(&self, register: Register) -> u8 {
        self.state.registers[register.index()]
    }

    /// Currently selected page.
    #[must_use]
    pub const fn page(&self) -> Page {
        self.state.page
    }

    /// Currently selected test-pattern sector. Informational only.
    #[must_use]
    pub const fn test_sr_sector(&self) -> u8 {
        self.state.test_sr_sector
    }

    /// Shift-register contents.
    #[must_use]
    pub const fn shift_registers(&self) -> &ShiftRegisterStore {
        &self.state.shift_registers
    }

    /// Captures the observable state for introspection.
    #[must_use]
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            registers: self.state.registers.to_vec(),
            page: self.state.page,
            test_sr_sector: self.state.test_sr_sector,
        }
    }

    /// Applies a transaction and returns it, never failing.
    ///
    /// On any fault the error is logged and the transaction comes back
    /// exactly as it was passed in.
    pub fn process_transaction(&mut self, mut transaction: Vec<u8>) -> Vec<u8> {
        if let Err(err) = self.try_process(&mut transaction) {
            error!(%err, "error processing transaction");
        }
        transaction
    }

    /// Applies a transaction in place.
    ///
    /// Reads overwrite the payload with register contents; writes store the
    /// payload. Either way the payload is walked byte by byte and any
    /// shift-register address takes over the rest of the payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Empty`] for a transaction without a
    /// control byte and [`TransactionError::AddressOutOfRange`] when paging
    /// resolves past the register space. On error neither `transaction` nor
    /// the model has changed.
    pub fn try_process(
        &mut self,
        transaction: &mut [u8],
    ) -> Result<TransactionOutcome, TransactionError> {
        let Some((&mut control, payload)) = transaction.split_first_mut() else {
            return Err(TransactionError::Empty);
        };

        let page = self.state.page;
        let test_sr_sector = self.state.test_sr_sector;
        let mut journal = Vec::new();
        let mut working = payload.to_vec();
        match self.apply(control, &mut working, &mut journal) {
            Ok(outcome) => {
                payload.copy_from_slice(&working);
                Ok(outcome)
            }
            Err(err) => {
                for (address, previous) in journal.into_iter().rev() {
                    self.state.registers[address] = previous;
                }
                self.state.page = page;
                self.state.test_sr_sector = test_sr_sector;
                Err(err)
            }
        }
    }

    /// Walks the payload, recording `(address, previous value)` for every
    /// stored register byte in `journal`.
    ///
    /// A shift-register burst ends the walk and cannot fail, so shift
    /// registers never need undoing.
    fn apply(
        &mut self,
        control: u8,
        payload: &mut [u8],
        journal: &mut Vec<(usize, u8)>,
    ) -> Result<TransactionOutcome, TransactionError> {
        let direction = Direction::from_control(control);
        let address = control & ADDRESS_MASK;
        debug!(
            ?direction,
            address,
            length = payload.len(),
            "register transaction"
        );

        let mut events = Vec::new();
        for offset in 0..payload.len() {
            let requested = requested_address(address, offset);
            let true_address = self.state.page.resolve(requested);

            if let Some(register) = ShiftRegister::from_address(true_address) {
                let length =
                    self.state
                        .shift_registers
                        .handle(payload, offset, register, direction);
                debug!(?register, ?direction, length, "shift register burst");
                events.push(ModelEvent::ShiftRegisterBurst {
                    register,
                    direction,
                    length,
                });
                break;
            }

            if true_address >= self.state.registers.len() {
                return Err(TransactionError::AddressOutOfRange {
                    requested,
                    true_address,
                });
            }

            match direction {
                Direction::Write => {
                    journal.push((true_address, self.state.registers[true_address]));
                    self.state.registers[true_address] = payload[offset];
                    if let Some(event) = self.run_write_hook(true_address) {
                        events.push(event);
                    }
                    if self.config.log_register_writes {
                        self.log_register_write(true_address);
                    }
                }
                Direction::Read => payload[offset] = self.state.registers[true_address],
            }
        }

        Ok(TransactionOutcome {
            direction,
            address,
            length: payload.len(),
            events,
        })
    }

    fn run_write_hook(&mut self, address: usize) -> Option<ModelEvent> {
        let value = self.state.registers[address];
        match hook_for(address) {
            WriteHook::None => None,
            WriteHook::PageSelect => {
                let page = Page::from_bit(bitfield(value, 0, 1));
                (page != self.state.page).then(|| {
                    debug!("register page select is now {page}");
                    self.state.page = page;
                    ModelEvent::PageSelected { page }
                })
            }
            WriteHook::SectorSelect => {
                let sector = bitfield(value, SECTOR_SELECT_SHIFT, SECTOR_SELECT_WIDTH);
                (sector != self.state.test_sr_sector).then(|| {
                    debug!("test shift register sector is now {sector}");
                    self.state.test_sr_sector = sector;
                    ModelEvent::SectorSelected { sector }
                })
            }
        }
    }

    fn log_register_write(&self, address: usize) {
        let value = self.state.registers[address];
        match RegisterMap::name(address) {
            Some(name) => debug!("{name} register: {value:#04x}"),
            None => debug!("register {address}: {value:#04x}"),
        }
    }
}
