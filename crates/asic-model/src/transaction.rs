//! SPI-style transaction layout and control-byte helpers.
//!
//! A transaction is `[control, payload...]`. Bit 7 of the control byte is the
//! read/write flag and bits 0..=6 hold the starting page-relative address.
//! Payload bytes address consecutive registers from that start.

use crate::{Page, ShiftRegister};

/// Control-byte mask selecting the read/write bit.
pub const RW_MASK: u8 = 0x80;
/// Control-byte mask selecting the page-relative start address.
pub const ADDRESS_MASK: u8 = 0x7F;
/// Control-byte value of the read/write bit for a read transaction.
pub const READ_TRANSACTION: u8 = 0x80;
/// Control-byte value of the read/write bit for a write transaction.
pub const WRITE_TRANSACTION: u8 = 0x00;

/// Transfer direction encoded by the control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// Payload bytes are replaced with register contents.
    Read,
    /// Payload bytes are stored into registers.
    Write,
}

impl Direction {
    /// Decodes the direction from a control byte.
    #[must_use]
    pub const fn from_control(control: u8) -> Self {
        if control & RW_MASK == WRITE_TRANSACTION {
            Self::Write
        } else {
            Self::Read
        }
    }

    /// Returns the control-byte bit pattern for this direction.
    #[must_use]
    pub const fn rw_bits(self) -> u8 {
        match self {
            Self::Read => READ_TRANSACTION,
            Self::Write => WRITE_TRANSACTION,
        }
    }
}

/// Builds a control byte for `direction` starting at page-relative `address`.
#[must_use]
pub const fn control_byte(address: u8, direction: Direction) -> u8 {
    (address & ADDRESS_MASK) | direction.rw_bits()
}

/// Page-relative address addressed by payload byte `offset` of a transaction
/// starting at `start`. Wraps within the 128-entry page.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn requested_address(start: u8, offset: usize) -> u8 {
    ((start as usize + offset) & ADDRESS_MASK as usize) as u8
}

/// Extracts a right-aligned bit field of `width` bits starting at bit `index`.
///
/// Fields reaching past bit 7 are truncated to the bits that exist.
#[must_use]
pub const fn bitfield(value: u8, index: u32, width: u32) -> u8 {
    if index >= u8::BITS {
        return 0;
    }
    let shifted = value >> index;
    if width >= u8::BITS {
        shifted
    } else {
        shifted & ((1 << width) - 1)
    }
}

/// State change observed while a transaction was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ModelEvent {
    /// Page select moved to a new page.
    PageSelected {
        /// Newly selected page.
        page: Page,
    },
    /// Test-pattern sector select changed.
    SectorSelected {
        /// Newly selected sector.
        sector: u8,
    },
    /// Remainder of the payload was transferred to or from a shift register.
    ShiftRegisterBurst {
        /// Shift register that intercepted the burst.
        register: ShiftRegister,
        /// Transfer direction.
        direction: Direction,
        /// Bytes actually transferred after truncation to capacity.
        length: usize,
    },
}

/// Summary of a successfully applied transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TransactionOutcome {
    /// Transfer direction.
    pub direction: Direction,
    /// Page-relative start address from the control byte.
    pub address: u8,
    /// Number of payload bytes after the control byte.
    pub length: usize,
    /// State changes in the order they happened.
    pub events: Vec<ModelEvent>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{bitfield, control_byte, requested_address, Direction};

    #[rstest]
    #[case(0xA5, 0, 8, 0xA5)]
    #[case(0xAF, 4, 4, 0x0A)]
    #[case(0xFF, 0, 1, 0x01)]
    #[case(0x00, 32, 8, 0x00)]
    #[case(0x5F, 0, 5, 0x1F)]
    fn bitfield_extracts_right_aligned_fields(
        #[case] value: u8,
        #[case] index: u32,
        #[case] width: u32,
        #[case] expected: u8,
    ) {
        assert_eq!(bitfield(value, index, width), expected);
    }

    #[rstest]
    #[case(0x00, Direction::Write)]
    #[case(0x80, Direction::Read)]
    #[case(0x01, Direction::Write)]
    #[case(0xF3, Direction::Read)]
    fn direction_follows_rw_bit(#[case] control: u8, #[case] expected: Direction) {
        assert_eq!(Direction::from_control(control), expected);
    }

    #[test]
    fn control_byte_masks_address_and_sets_rw_bit() {
        assert_eq!(control_byte(0x05, Direction::Read), 0x85);
        assert_eq!(control_byte(0x85, Direction::Write), 0x05);
    }

    #[test]
    fn requested_address_wraps_within_page() {
        assert_eq!(requested_address(26, 4), 30);
        assert_eq!(requested_address(127, 1), 0);
        assert_eq!(requested_address(120, 300), ((120 + 300) & 0x7F) as u8);
    }
}
