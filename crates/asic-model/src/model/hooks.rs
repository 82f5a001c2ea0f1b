use crate::{Register, REGISTER_SPACE_SIZE};

/// Side effect run right after a register byte is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WriteHook {
    /// Plain storage register.
    #[default]
    None,
    /// Refresh page select from bit 0 of the written value.
    PageSelect,
    /// Refresh the test-pattern sector from the written value.
    SectorSelect,
}

const fn build_hook_table() -> [WriteHook; REGISTER_SPACE_SIZE] {
    let mut table = [WriteHook::None; REGISTER_SPACE_SIZE];
    table[Register::Config1.index()] = WriteHook::PageSelect;
    table[Register::TestSr.index()] = WriteHook::SectorSelect;
    table
}

/// Write hooks indexed by true register address.
pub const WRITE_HOOKS: [WriteHook; REGISTER_SPACE_SIZE] = build_hook_table();

/// Returns the hook registered for a true register address.
#[must_use]
pub const fn hook_for(address: usize) -> WriteHook {
    if address < REGISTER_SPACE_SIZE {
        WRITE_HOOKS[address]
    } else {
        WriteHook::None
    }
}
