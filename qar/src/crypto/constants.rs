//! Fixed tables shared by the QAR ciphers and masked headers

/// Word masks used by the archive header, entry headers and the v1 section table
pub const HEADER_MASKS: [u32; 4] = [0x4144_1043, 0x11C2_2050, 0xD056_08C3, 0x532C_7319];

/// Keystream table of the position cipher, consumed as four word pairs
pub const POSITION_TABLE: [u32; 8] = [
    0xBB8A_DEDB,
    0x6522_9958,
    0x0845_3206,
    0x8812_1302,
    0x4C34_4955,
    0x2C02_F10C,
    0x4887_F823,
    0xF381_8583,
];

/// Initial rotor of the version 2 section table
pub const SECTION_ROTOR_SEED: u32 = 0xA2C1_8EC3;

/// Multiplier of the rotor cipher keystream (5^11)
pub const ROTOR_MULTIPLIER: u32 = 48_828_125;

/// Key scale of the rotor cipher
pub const ROTOR_KEY_SCALE: u32 = 278;

/// Constant folded into the upper half of the initial rotor
pub const ROTOR_SALT: u32 = 25_974;
