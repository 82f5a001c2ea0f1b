//! Burst-only shift-register storage.
//!
//! Once a transaction reaches a shift-register address the rest of its
//! payload streams into (or out of) the shift register instead of walking
//! consecutive registers.

use crate::{Direction, Register};

/// Capacity in bytes of the calibration shift register.
pub const CALIBRATION_SR_BYTES: usize = 20;
/// Number of sectors in the test-pattern shift register.
pub const TEST_SR_SECTORS: usize = 20;
/// Capacity in bytes of one test-pattern sector.
pub const TEST_SR_SECTOR_BYTES: usize = 24;
/// Total capacity in bytes of the test-pattern shift register.
pub const TEST_SR_BYTES: usize = TEST_SR_SECTORS * TEST_SR_SECTOR_BYTES;

const _: () = assert!(TEST_SR_BYTES == 480, "test pattern must span 480 bytes");

/// Shift register reachable through the register address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ShiftRegister {
    /// Calibration pattern buffer at `SR_CAL`.
    Calibration,
    /// Sectored test-pattern buffer at `SR_TEST`.
    TestPattern,
}

impl ShiftRegister {
    /// Register through which this shift register is addressed.
    #[must_use]
    pub const fn register(self) -> Register {
        match self {
            Self::Calibration => Register::SrCal,
            Self::TestPattern => Register::SrTest,
        }
    }

    /// Maps a true register address to the shift register at that address.
    #[must_use]
    pub const fn from_address(address: usize) -> Option<Self> {
        if address == Register::SrCal.index() {
            Some(Self::Calibration)
        } else if address == Register::SrTest.index() {
            Some(Self::TestPattern)
        } else {
            None
        }
    }

    /// Capacity of the shift register in bytes.
    #[must_use]
    pub const fn capacity(self) -> usize {
        match self {
            Self::Calibration => CALIBRATION_SR_BYTES,
            Self::TestPattern => TEST_SR_BYTES,
        }
    }
}

/// Owned contents of both shift registers.
///
/// Each test-pattern sector is its own allocation so writing one sector can
/// never show up in another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftRegisterStore {
    calibration: Box<[u8; CALIBRATION_SR_BYTES]>,
    test_pattern: Vec<Box<[u8; TEST_SR_SECTOR_BYTES]>>,
}

impl Default for ShiftRegisterStore {
    fn default() -> Self {
        Self {
            calibration: Box::new([0; CALIBRATION_SR_BYTES]),
            test_pattern: (0..TEST_SR_SECTORS)
                .map(|_| Box::new([0; TEST_SR_SECTOR_BYTES]))
                .collect(),
        }
    }
}

impl ShiftRegisterStore {
    /// Transfers `transaction[payload_start..]` to or from `register`.
    ///
    /// At most `min(capacity, remaining payload)` bytes move; anything past
    /// the capacity is silently ignored. Returns the number of bytes moved.
    pub fn handle(
        &mut self,
        transaction: &mut [u8],
        payload_start: usize,
        register: ShiftRegister,
        direction: Direction,
    ) -> usize {
        let available = transaction.len().saturating_sub(payload_start);
        let length = register.capacity().min(available);
        let Some(window) = transaction.get_mut(payload_start..payload_start + length) else {
            return 0;
        };

        match register {
            ShiftRegister::Calibration => {
                transfer(&mut self.calibration[..length], window, direction);
            }
            ShiftRegister::TestPattern => {
                for (sector, chunk) in self
                    .test_pattern
                    .iter_mut()
                    .zip(window.chunks_mut(TEST_SR_SECTOR_BYTES))
                {
                    let span = chunk.len();
                    transfer(&mut sector[..span], chunk, direction);
                }
            }
        }

        length
    }

    /// Contents of the calibration shift register.
    #[must_use]
    pub fn calibration(&self) -> &[u8] {
        &self.calibration[..]
    }

    /// Contents of one test-pattern sector, `None` past the last sector.
    #[must_use]
    pub fn sector(&self, index: usize) -> Option<&[u8]> {
        self.test_pattern.get(index).map(|sector| &sector[..])
    }

    /// Contents of `register` as one contiguous byte vector.
    #[must_use]
    pub fn contents(&self, register: ShiftRegister) -> Vec<u8> {
        match register {
            ShiftRegister::Calibration => self.calibration.to_vec(),
            ShiftRegister::TestPattern => self
                .test_pattern
                .iter()
                .flat_map(|sector| sector.iter().copied())
                .collect(),
        }
    }
}

fn transfer(storage: &mut [u8], window: &mut [u8], direction: Direction) {
    match direction {
        Direction::Write => storage.copy_from_slice(window),
        Direction::Read => window.copy_from_slice(storage),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ShiftRegister, ShiftRegisterStore, CALIBRATION_SR_BYTES, TEST_SR_BYTES,
        TEST_SR_SECTOR_BYTES,
    };
    use crate::Direction;

    #[test]
    fn addresses_map_to_shift_registers() {
        assert_eq!(
            ShiftRegister::from_address(126),
            Some(ShiftRegister::Calibration)
        );
        assert_eq!(
            ShiftRegister::from_address(127),
            Some(ShiftRegister::TestPattern)
        );
        assert_eq!(ShiftRegister::from_address(125), None);
        assert_eq!(ShiftRegister::from_address(254), None);
    }

    #[test]
    fn calibration_write_truncates_to_capacity() {
        let mut store = ShiftRegisterStore::default();
        let mut transaction: Vec<u8> = (0..26).collect();

        let moved = store.handle(&mut transaction, 1, ShiftRegister::Calibration, Direction::Write);

        assert_eq!(moved, CALIBRATION_SR_BYTES);
        assert_eq!(store.calibration(), &transaction[1..=20]);
    }

    #[test]
    fn short_read_only_fills_available_bytes() {
        let mut store = ShiftRegisterStore::default();
        let mut pattern: Vec<u8> = (100..120).collect();
        pattern.insert(0, 0);
        store.handle(&mut pattern, 1, ShiftRegister::Calibration, Direction::Write);

        let mut transaction = vec![0x80, 0, 0, 0];
        let moved = store.handle(&mut transaction, 1, ShiftRegister::Calibration, Direction::Read);

        assert_eq!(moved, 3);
        assert_eq!(transaction, vec![0x80, 100, 101, 102]);
    }

    #[test]
    fn payload_start_past_end_moves_nothing() {
        let mut store = ShiftRegisterStore::default();
        let mut transaction = vec![0x7E];
        let moved = store.handle(&mut transaction, 2, ShiftRegister::Calibration, Direction::Write);
        assert_eq!(moved, 0);
        assert_eq!(store, ShiftRegisterStore::default());
    }

    #[test]
    fn test_pattern_burst_spans_sectors_in_order() {
        let mut store = ShiftRegisterStore::default();
        let mut transaction = vec![0x7F];
        transaction.extend((0..TEST_SR_BYTES).map(|i| (i % 251) as u8));

        let moved = store.handle(&mut transaction, 1, ShiftRegister::TestPattern, Direction::Write);

        assert_eq!(moved, TEST_SR_BYTES);
        assert_eq!(store.contents(ShiftRegister::TestPattern), transaction[1..]);
        assert_eq!(
            store.sector(1),
            Some(&transaction[1 + TEST_SR_SECTOR_BYTES..1 + 2 * TEST_SR_SECTOR_BYTES])
        );
        assert_eq!(store.sector(20), None);
    }

    #[test]
    fn sectors_are_not_aliased() {
        let mut store = ShiftRegisterStore::default();
        let mut transaction = vec![0x7F, 0xAB, 0xCD];

        store.handle(&mut transaction, 1, ShiftRegister::TestPattern, Direction::Write);

        assert_eq!(&store.sector(0).expect("sector 0")[..2], &[0xAB, 0xCD]);
        for index in 1..20 {
            assert!(store
                .sector(index)
                .expect("sector exists")
                .iter()
                .all(|byte| *byte == 0));
        }
    }
}
