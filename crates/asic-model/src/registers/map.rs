//! Static SPI register map of the MERCURY ASIC.
//!
//! Addresses `0..=127` are the page 0 registers. Registers that only exist
//! on page 1 are listed at their page-relative address plus
//! [`PAGE_SIZE`](crate::PAGE_SIZE), so the highest entry also fixes the size
//! of the modelled address space.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::UnknownRegisterError;

/// Number of named registers in [`Register::ALL`].
pub const REGISTER_COUNT: usize = 144;

macro_rules! register_map {
    ($($variant:ident = $addr:literal => $name:literal, $doc:literal;)+) => {
        /// Named SPI register, discriminant is the register's true address.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
        #[repr(u8)]
        pub enum Register {
            $(
                #[doc = $doc]
                $variant = $addr,
            )+
        }

        impl Register {
            /// Every named register in ascending address order.
            pub const ALL: [Self; REGISTER_COUNT] = [$(Self::$variant,)+];

            /// Returns the datasheet name of the register, e.g. `"CONFIG1"`.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Returns a one-line description of the register.
            #[must_use]
            pub const fn description(self) -> &'static str {
                match self {
                    $(Self::$variant => $doc,)+
                }
            }
        }
    };
}

register_map! {
    Config1 = 0 => "CONFIG1", "Configuration";
    Glob1 = 1 => "GLOB1", "Global select 1";
    Glob2 = 2 => "GLOB2", "Global select 2";
    GlobVal1 = 3 => "GLOB_VAL1", "Global config 1";
    GlobVal2 = 4 => "GLOB_VAL2", "Global config 2";
    FrmLngth = 5 => "FRM_LNGTH", "Frame length in clocks";
    IntTime = 6 => "INT_TIME", "Integration time in frames";
    TestSr = 7 => "TEST_SR", "Test shift register configuration";
    SerBias = 8 => "SER_BIAS", "Serialiser PLL bias";
    TdcBias = 9 => "TDC_BIAS", "TDC PLL bias";
    TdcDataLd = 10 => "TDC_DATA_LD", "Readout data load";
    RstPreOn = 11 => "RST_PRE_ON", "Preamplifier reset on";
    RstPreOff = 12 => "RST_PRE_OFF", "Preamplifier reset off";
    CdsPreOn = 13 => "CDS_PRE_ON", "CDS amplifier reset on";
    CdsPreOff = 14 => "CDS_PRE_OFF", "CDS amplifier reset off";
    SampleCOn = 15 => "SAMPLE_C_ON", "CDS sample on";
    SampleCOff = 16 => "SAMPLE_C_OFF", "CDS sample off";
    SampleHOn = 17 => "SAMPLE_H_ON", "Sample & hold on";
    SampleHOff = 18 => "SAMPLE_H_OFF", "Sample & hold off";
    RampEnOn = 19 => "RAMP_EN_ON", "Ramp enable on";
    RampEnOff = 20 => "RAMP_EN_OFF", "Ramp enable off";
    TdcOutEnOn = 21 => "TDC_OUT_EN_ON", "TDC output enable on";
    TdcOutEnOff = 22 => "TDC_OUT_EN_OFF", "TDC output enable off";
    TdcCntRstOn = 23 => "TDC_CNT_RST_ON", "TDC counter reset on";
    TdcCntRstOff = 24 => "TDC_CNT_RST_OFF", "TDC counter reset off";
    CalToggle = 25 => "CAL_TOGGLE", "Calibration pulse toggle";
    SegControl1Ser = 26 => "SEG_CONTROL1_SER", "Segment 1 serialiser control";
    SegControl2Ser = 27 => "SEG_CONTROL2_SER", "Segment 2 serialiser control";
    SegControl3Ser = 28 => "SEG_CONTROL3_SER", "Segment 3 serialiser control";
    SegControl4Ser = 29 => "SEG_CONTROL4_SER", "Segment 4 serialiser control";
    SegControl5Ser = 30 => "SEG_CONTROL5_SER", "Segment 5 serialiser control";
    SegControl6Ser = 31 => "SEG_CONTROL6_SER", "Segment 6 serialiser control";
    SegControl7Ser = 32 => "SEG_CONTROL7_SER", "Segment 7 serialiser control";
    SegControl8Ser = 33 => "SEG_CONTROL8_SER", "Segment 8 serialiser control";
    SegControl9Ser = 34 => "SEG_CONTROL9_SER", "Segment 9 serialiser control";
    SegControl10Ser = 35 => "SEG_CONTROL10_SER", "Segment 10 serialiser control";
    SegControl1En = 36 => "SEG_CONTROL1_EN", "Segment 1 enable control";
    SegControl2En = 37 => "SEG_CONTROL2_EN", "Segment 2 enable control";
    SegControl3En = 38 => "SEG_CONTROL3_EN", "Segment 3 enable control";
    SegControl4En = 39 => "SEG_CONTROL4_EN", "Segment 4 enable control";
    SegControl5En = 40 => "SEG_CONTROL5_EN", "Segment 5 enable control";
    SegControl6En = 41 => "SEG_CONTROL6_EN", "Segment 6 enable control";
    SegControl7En = 42 => "SEG_CONTROL7_EN", "Segment 7 enable control";
    SegControl8En = 43 => "SEG_CONTROL8_EN", "Segment 8 enable control";
    SegControl9En = 44 => "SEG_CONTROL9_EN", "Segment 9 enable control";
    SegControl10En = 45 => "SEG_CONTROL10_EN", "Segment 10 enable control";
    RampControl1 = 46 => "RAMP_CONTROL1", "Ramp bias control segment 1, ramps 1 and 2";
    RampControl2 = 47 => "RAMP_CONTROL2", "Ramp bias control segment 1, ramps 3 and 4";
    RampControl3 = 48 => "RAMP_CONTROL3", "Ramp bias control segment 2, ramps 1 and 2";
    RampControl4 = 49 => "RAMP_CONTROL4", "Ramp bias control segment 2, ramps 3 and 4";
    RampControl5 = 50 => "RAMP_CONTROL5", "Ramp bias control segment 3, ramps 1 and 2";
    RampControl6 = 51 => "RAMP_CONTROL6", "Ramp bias control segment 3, ramps 3 and 4";
    RampControl7 = 52 => "RAMP_CONTROL7", "Ramp bias control segment 4, ramps 1 and 2";
    RampControl8 = 53 => "RAMP_CONTROL8", "Ramp bias control segment 4, ramps 3 and 4";
    RampControl9 = 54 => "RAMP_CONTROL9", "Ramp bias control segment 5, ramps 1 and 2";
    RampControl10 = 55 => "RAMP_CONTROL10", "Ramp bias control segment 5, ramps 3 and 4";
    RampControl11 = 56 => "RAMP_CONTROL11", "Ramp bias control segment 6, ramps 1 and 2";
    RampControl12 = 57 => "RAMP_CONTROL12", "Ramp bias control segment 6, ramps 3 and 4";
    RampControl13 = 58 => "RAMP_CONTROL13", "Ramp bias control segment 7, ramps 1 and 2";
    RampControl14 = 59 => "RAMP_CONTROL14", "Ramp bias control segment 7, ramps 3 and 4";
    RampControl15 = 60 => "RAMP_CONTROL15", "Ramp bias control segment 8, ramps 1 and 2";
    RampControl16 = 61 => "RAMP_CONTROL16", "Ramp bias control segment 8, ramps 3 and 4";
    RampControl17 = 62 => "RAMP_CONTROL17", "Ramp bias control segment 9, ramps 1 and 2";
    RampControl18 = 63 => "RAMP_CONTROL18", "Ramp bias control segment 9, ramps 3 and 4";
    RampControl19 = 64 => "RAMP_CONTROL19", "Ramp bias control segment 10, ramps 1 and 2";
    RampControl20 = 65 => "RAMP_CONTROL20", "Ramp bias control segment 10, ramps 3 and 4";
    SerControl1a = 66 => "SER_CONTROL1A", "Segment 1 serialiser static controls A";
    SerControl1b = 67 => "SER_CONTROL1B", "Segment 1 serialiser static controls B";
    SerControl1c = 68 => "SER_CONTROL1C", "Segment 1 serialiser static controls C";
    SerControl1d = 69 => "SER_CONTROL1D", "Segment 1 serialiser static controls D";
    SerControl1e = 70 => "SER_CONTROL1E", "Segment 1 serialiser static controls E";
    SerControl1f = 71 => "SER_CONTROL1F", "Segment 1 serialiser static controls F";
    SerControl2a = 72 => "SER_CONTROL2A", "Segment 2 serialiser static controls A";
    SerControl2b = 73 => "SER_CONTROL2B", "Segment 2 serialiser static controls B";
    SerControl2c = 74 => "SER_CONTROL2C", "Segment 2 serialiser static controls C";
    SerControl2d = 75 => "SER_CONTROL2D", "Segment 2 serialiser static controls D";
    SerControl2e = 76 => "SER_CONTROL2E", "Segment 2 serialiser static controls E";
    SerControl2f = 77 => "SER_CONTROL2F", "Segment 2 serialiser static controls F";
    SerControl3a = 78 => "SER_CONTROL3A", "Segment 3 serialiser static controls A";
    SerControl3b = 79 => "SER_CONTROL3B", "Segment 3 serialiser static controls B";
    SerControl3c = 80 => "SER_CONTROL3C", "Segment 3 serialiser static controls C";
    SerControl3d = 81 => "SER_CONTROL3D", "Segment 3 serialiser static controls D";
    SerControl3e = 82 => "SER_CONTROL3E", "Segment 3 serialiser static controls E";
    SerControl3f = 83 => "SER_CONTROL3F", "Segment 3 serialiser static controls F";
    SerControl4a = 84 => "SER_CONTROL4A", "Segment 4 serialiser static controls A";
    SerControl4b = 85 => "SER_CONTROL4B", "Segment 4 serialiser static controls B";
    SerControl4c = 86 => "SER_CONTROL4C", "Segment 4 serialiser static controls C";
    SerControl4d = 87 => "SER_CONTROL4D", "Segment 4 serialiser static controls D";
    SerControl4e = 88 => "SER_CONTROL4E", "Segment 4 serialiser static controls E";
    SerControl4f = 89 => "SER_CONTROL4F", "Segment 4 serialiser static controls F";
    SerControl5a = 90 => "SER_CONTROL5A", "Segment 5 serialiser static controls A";
    SerControl5b = 91 => "SER_CONTROL5B", "Segment 5 serialiser static controls B";
    SerControl5c = 92 => "SER_CONTROL5C", "Segment 5 serialiser static controls C";
    SerControl5d = 93 => "SER_CONTROL5D", "Segment 5 serialiser static controls D";
    SerControl5e = 94 => "SER_CONTROL5E", "Segment 5 serialiser static controls E";
    SerControl5f = 95 => "SER_CONTROL5F", "Segment 5 serialiser static controls F";
    SerControl6a = 96 => "SER_CONTROL6A", "Segment 6 serialiser static controls A";
    SerControl6b = 97 => "SER_CONTROL6B", "Segment 6 serialiser static controls B";
    SerControl6c = 98 => "SER_CONTROL6C", "Segment 6 serialiser static controls C";
    SerControl6d = 99 => "SER_CONTROL6D", "Segment 6 serialiser static controls D";
    SerControl6e = 100 => "SER_CONTROL6E", "Segment 6 serialiser static controls E";
    SerControl6f = 101 => "SER_CONTROL6F", "Segment 6 serialiser static controls F";
    SerControl7a = 102 => "SER_CONTROL7A", "Segment 7 serialiser static controls A";
    SerControl7b = 103 => "SER_CONTROL7B", "Segment 7 serialiser static controls B";
    SerControl7c = 104 => "SER_CONTROL7C", "Segment 7 serialiser static controls C";
    SerControl7d = 105 => "SER_CONTROL7D", "Segment 7 serialiser static controls D";
    SerControl7e = 106 => "SER_CONTROL7E", "Segment 7 serialiser static controls E";
    SerControl7f = 107 => "SER_CONTROL7F", "Segment 7 serialiser static controls F";
    SerControl8a = 108 => "SER_CONTROL8A", "Segment 8 serialiser static controls A";
    SerControl8b = 109 => "SER_CONTROL8B", "Segment 8 serialiser static controls B";
    SerControl8c = 110 => "SER_CONTROL8C", "Segment 8 serialiser static controls C";
    SerControl8d = 111 => "SER_CONTROL8D", "Segment 8 serialiser static controls D";
    SerControl8e = 112 => "SER_CONTROL8E", "Segment 8 serialiser static controls E";
    SerControl8f = 113 => "SER_CONTROL8F", "Segment 8 serialiser static controls F";
    SerControl9a = 114 => "SER_CONTROL9A", "Segment 9 serialiser static controls A";
    SerControl9b = 115 => "SER_CONTROL9B", "Segment 9 serialiser static controls B";
    SerControl9c = 116 => "SER_CONTROL9C", "Segment 9 serialiser static controls C";
    SerControl9d = 117 => "SER_CONTROL9D", "Segment 9 serialiser static controls D";
    SerControl9e = 118 => "SER_CONTROL9E", "Segment 9 serialiser static controls E";
    SerControl9f = 119 => "SER_CONTROL9F", "Segment 9 serialiser static controls F";
    SerControl10a = 120 => "SER_CONTROL10A", "Segment 10 serialiser static controls A";
    SerControl10b = 121 => "SER_CONTROL10B", "Segment 10 serialiser static controls B";
    SerControl10c = 122 => "SER_CONTROL10C", "Segment 10 serialiser static controls C";
    SerControl10d = 123 => "SER_CONTROL10D", "Segment 10 serialiser static controls D";
    SerControl10e = 124 => "SER_CONTROL10E", "Segment 10 serialiser static controls E";
    SerControl10f = 125 => "SER_CONTROL10F", "Segment 10 serialiser static controls F";
    SrCal = 126 => "SR_CAL", "Calibration shift register";
    SrTest = 127 => "SR_TEST", "Test shift register";
    ChipBias = 130 => "CHIP_BIAS", "Global chip bias";
    SerBias1 = 131 => "SER_BIAS1", "Serialiser bias, segment 1";
    SerBias2 = 132 => "SER_BIAS2", "Serialiser bias, segment 2";
    SerBias3 = 133 => "SER_BIAS3", "Serialiser bias, segment 3";
    SerBias4 = 134 => "SER_BIAS4", "Serialiser bias, segment 4";
    SerBias5 = 135 => "SER_BIAS5", "Serialiser bias, segment 5";
    SerBias6 = 136 => "SER_BIAS6", "Serialiser bias, segment 6";
    SerBias7 = 137 => "SER_BIAS7", "Serialiser bias, segment 7";
    SerBias8 = 138 => "SER_BIAS8", "Serialiser bias, segment 8";
    SerBias9 = 139 => "SER_BIAS9", "Serialiser bias, segment 9";
    SerBias10 = 140 => "SER_BIAS10", "Serialiser bias, segment 10";
    FifoFull1 = 141 => "FIFO_FULL1", "FIFO full flags (8 to 1)";
    FifoFull2 = 142 => "FIFO_FULL2", "FIFO full flags (16 to 9)";
    FifoFull3 = 143 => "FIFO_FULL3", "FIFO full flags (20 to 17)";
    SerClkCheck1 = 144 => "SER_CLK_CHECK1", "Serialiser clock status flags (8 to 1)";
    SerClkCheck2 = 145 => "SER_CLK_CHECK2", "Serialiser clock status flags (16 to 9)";
}

impl Register {
    /// Returns the true address of the register.
    #[must_use]
    pub const fn address(self) -> u8 {
        self as u8
    }

    /// Returns the register's index into the register array.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const fn highest_address() -> u8 {
    let mut highest = 0;
    let mut index = 0;
    while index < Register::ALL.len() {
        let address = Register::ALL[index].address();
        if address > highest {
            highest = address;
        }
        index += 1;
    }
    highest
}

/// Size of the modelled register address space (highest address plus one).
pub const REGISTER_SPACE_SIZE: usize = highest_address() as usize + 1;

const fn build_address_index() -> [Option<Register>; REGISTER_SPACE_SIZE] {
    let mut table = [None; REGISTER_SPACE_SIZE];
    let mut index = 0;
    while index < Register::ALL.len() {
        let register = Register::ALL[index];
        assert!(
            table[register.index()].is_none(),
            "register addresses must be unique"
        );
        table[register.index()] = Some(register);
        if index > 0 {
            assert!(
                Register::ALL[index - 1].address() < register.address(),
                "register table must be in ascending address order"
            );
        }
        index += 1;
    }
    table
}

const REGISTERS_BY_ADDRESS: [Option<Register>; REGISTER_SPACE_SIZE] = build_address_index();

fn registers_by_name() -> &'static HashMap<&'static str, Register> {
    static INDEX: OnceLock<HashMap<&'static str, Register>> = OnceLock::new();
    INDEX.get_or_init(|| {
        Register::ALL
            .iter()
            .map(|register| (register.name(), *register))
            .collect()
    })
}

/// Lookup facade over the static register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegisterMap;

impl RegisterMap {
    /// Resolves a register name to its true address.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownRegisterError`] when `name` is not in the map.
    pub fn address(name: &str) -> Result<u8, UnknownRegisterError> {
        Self::lookup(name).map(Register::address)
    }

    /// Resolves a register name to its [`Register`].
    ///
    /// # Errors
    ///
    /// Returns [`UnknownRegisterError`] when `name` is not in the map.
    pub fn lookup(name: &str) -> Result<Register, UnknownRegisterError> {
        registers_by_name()
            .get(name)
            .copied()
            .ok_or_else(|| UnknownRegisterError {
                name: name.to_string(),
            })
    }

    /// Returns the name of the register at `address`, or `None` for reserved
    /// and out-of-range addresses.
    #[must_use]
    pub fn name(address: usize) -> Option<&'static str> {
        Self::register(address).map(Register::name)
    }

    /// Returns the register at `address`, if one is defined there.
    #[must_use]
    pub fn register(address: usize) -> Option<Register> {
        REGISTERS_BY_ADDRESS.get(address).copied().flatten()
    }

    /// Returns the size of the register address space.
    #[must_use]
    pub const fn size() -> usize {
        REGISTER_SPACE_SIZE
    }
}
