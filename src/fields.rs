//! Big-endian accessors for the RFC 4122 field layout of a 16-byte UUID.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           time_low                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           time_mid            |      time_hi_and_version      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |clk_seq_hi_var | clk_seq_low   |         node (0-1)            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         node (2-5)                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

/// Field accessors. Masked setters only replace the bits selected by `mask`.
pub(crate) trait Fields {
    fn time_low(&self) -> u32;
    fn set_time_low(&mut self, value: u32);
    fn time_mid(&self) -> u16;
    fn set_time_mid(&mut self, value: u16);
    fn time_hi_and_version(&self) -> u16;
    fn set_time_hi_and_version(&mut self, value: u16, mask: u16);
    fn clk_seq_hi_var(&self) -> u8;
    fn set_clk_seq_hi_var(&mut self, value: u8, mask: u8);
    fn clk_seq_low(&self) -> u8;
    fn set_clk_seq_low(&mut self, value: u8);
    fn node(&self) -> [u8; 6];
    fn set_node(&mut self, value: [u8; 6]);
}

impl Fields for [u8; 16] {
    fn time_low(&self) -> u32 {
        u32::from_be_bytes([self[0], self[1], self[2], self[3]])
    }

    fn set_time_low(&mut self, value: u32) {
        self[0..4].copy_from_slice(&value.to_be_bytes());
    }

    fn time_mid(&self) -> u16 {
        u16::from_be_bytes([self[4], self[5]])
    }

    fn set_time_mid(&mut self, value: u16) {
        self[4..6].copy_from_slice(&value.to_be_bytes());
    }

    fn time_hi_and_version(&self) -> u16 {
        u16::from_be_bytes([self[6], self[7]])
    }

    fn set_time_hi_and_version(&mut self, value: u16, mask: u16) {
        let merged = (self.time_hi_and_version() & !mask) | (value & mask);
        self[6..8].copy_from_slice(&merged.to_be_bytes());
    }

    fn clk_seq_hi_var(&self) -> u8 {
        self[8]
    }

    fn set_clk_seq_hi_var(&mut self, value: u8, mask: u8) {
        self[8] = (self[8] & !mask) | (value & mask);
    }

    fn clk_seq_low(&self) -> u8 {
        self[9]
    }

    fn set_clk_seq_low(&mut self, value: u8) {
        self[9] = value;
    }

    fn node(&self) -> [u8; 6] {
        let mut node = [0u8; 6];
        node.copy_from_slice(&self[10..16]);
        node
    }

    fn set_node(&mut self, value: [u8; 6]) {
        self[10..16].copy_from_slice(&value);
    }
}

#[cfg(test)]
mod tests {
    use super::Fields;

    /// Reads fields in big-endian order
    #[test]
    fn reads_fields_in_big_endian_order() {
        let bytes: [u8; 16] = core::array::from_fn(|i| i as u8);
        assert_eq!(bytes.time_low(), 0x0001_0203);
        assert_eq!(bytes.time_mid(), 0x0405);
        assert_eq!(bytes.time_hi_and_version(), 0x0607);
        assert_eq!(bytes.clk_seq_hi_var(), 0x08);
        assert_eq!(bytes.clk_seq_low(), 0x09);
        assert_eq!(bytes.node(), [10, 11, 12, 13, 14, 15]);
    }

    /// Preserves bits outside of masked writes
    #[test]
    fn preserves_bits_outside_of_masked_writes() {
        let mut bytes = [0xffu8; 16];
        bytes.set_time_hi_and_version(0x0000, 0x0fff);
        bytes.set_clk_seq_hi_var(0x00, 0x3f);
        assert_eq!(bytes[6..9], [0xf0, 0x00, 0xc0]);
        assert!(bytes[..6].iter().chain(&bytes[9..]).all(|&e| e == 0xff));

        let mut bytes = [0u8; 16];
        bytes.set_time_hi_and_version(0xffff, 0xf000);
        bytes.set_clk_seq_hi_var(0xff, 0xc0);
        assert_eq!(bytes[6..9], [0xf0, 0x00, 0xc0]);
    }
}
