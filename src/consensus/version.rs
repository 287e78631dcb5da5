//! Version-bits signalling

/// Top bits a signalling block version must carry
pub const VERSION_TOP_BITS: u32 = 0x2000_0000;

/// Mask selecting the top bits
pub const VERSION_TOP_MASK: u32 = 0xe000_0000;

/// Whether `version` signals for deployment `bit`
pub fn has_bit(version: u32, bit: u8) -> bool {
    if bit >= 29 {
        return false;
    }
    version & VERSION_TOP_MASK == VERSION_TOP_BITS && version & (1u32 << bit) != 0
}

/// Whether `version` signals any bit in `unknown_bits`
pub fn has_unknown(version: u32, unknown_bits: u32) -> bool {
    version & VERSION_TOP_MASK == VERSION_TOP_BITS && version & unknown_bits != 0
}
