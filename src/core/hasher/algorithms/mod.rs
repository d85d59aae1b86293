//! Hash algorithm implementations.

mod average;
mod difference;
mod perceptual;

pub use average::AverageHasher;
pub use difference::DifferenceHasher;
pub use perceptual::PerceptualHasher;

/// Packs bits MSB-first into bytes, so the hex form reads left to right,
/// top to bottom over the grid.
struct BitPacker {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitPacker {
    fn with_bits(bits: u32) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8) as usize),
            current: 0,
            filled: 0,
        }
    }

    fn push(&mut self, bit: bool) {
        if bit {
            self.current |= 1 << (7 - self.filled);
        }
        self.filled += 1;

        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::BitPacker;

    #[test]
    fn packs_msb_first() {
        let mut packer = BitPacker::with_bits(8);
        for bit in [true, false, false, false, false, false, false, true] {
            packer.push(bit);
        }
        assert_eq!(packer.finish(), vec![0b1000_0001]);
    }

    #[test]
    fn flushes_partial_byte() {
        let mut packer = BitPacker::with_bits(10);
        for _ in 0..10 {
            packer.push(true);
        }
        assert_eq!(packer.finish(), vec![0xFF, 0b1100_0000]);
    }
}
