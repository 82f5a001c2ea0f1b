use crate::ADDRESS_MASK;

/// Number of registers addressable within one page.
pub const PAGE_SIZE: usize = 128;
/// Highest page-relative address shared by both pages.
pub const SHARED_ADDRESS_MAX: u8 = 2;

/// Register page selected by bit 0 of `CONFIG1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Page {
    /// Power-on page; addresses map one to one.
    #[default]
    Page0,
    /// Second bank; addresses above 2 are offset by [`PAGE_SIZE`].
    Page1,
}

impl Page {
    /// Decodes the page from a page-select bit.
    #[must_use]
    pub const fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Self::Page0
        } else {
            Self::Page1
        }
    }

    /// Page-select bit value for this page.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Page0 => 0,
            Self::Page1 => 1,
        }
    }

    /// Page that holds the full `0..=255` device address `address`.
    #[must_use]
    pub const fn for_address(address: usize) -> Self {
        if address < PAGE_SIZE {
            Self::Page0
        } else {
            Self::Page1
        }
    }

    /// Resolves a page-relative address to its true register address.
    ///
    /// Addresses `0..=2` are shared by both pages.
    #[must_use]
    pub const fn resolve(self, requested: u8) -> usize {
        let requested = requested & ADDRESS_MASK;
        match self {
            Self::Page1 if requested > SHARED_ADDRESS_MAX => requested as usize + PAGE_SIZE,
            Self::Page0 | Self::Page1 => requested as usize,
        }
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bit())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Page;

    #[rstest]
    #[case(Page::Page0, 0x00, 0x00)]
    #[case(Page::Page0, 0x10, 0x10)]
    #[case(Page::Page1, 0x00, 0x00)]
    #[case(Page::Page1, 0x02, 0x02)]
    #[case(Page::Page1, 0x03, 0x83)]
    #[case(Page::Page1, 0x10, 0x90)]
    #[case(Page::Page1, 0x91, 0x91)]
    fn resolve_offsets_only_unshared_page1_addresses(
        #[case] page: Page,
        #[case] requested: u8,
        #[case] expected: usize,
    ) {
        assert_eq!(page.resolve(requested), expected);
    }

    #[test]
    fn page_bit_round_trips() {
        assert_eq!(Page::from_bit(0x51), Page::Page1);
        assert_eq!(Page::from_bit(0x50), Page::Page0);
        assert_eq!(Page::from_bit(Page::Page1.bit()), Page::Page1);
        assert_eq!(Page::default(), Page::Page0);
    }

    #[test]
    fn full_addresses_select_their_page() {
        assert_eq!(Page::for_address(127), Page::Page0);
        assert_eq!(Page::for_address(130), Page::Page1);
    }
}
