//! Byte-level storage arithmetic
//!
//! Bit `offset` lives in byte `offset / 8`, at bit position `offset % 8`
//! counting from the least significant bit.

/// Number of bits per storage byte
pub(crate) const BITS_PER_BYTE: usize = u8::BITS as usize;

/// Round `n` up to the next multiple of `alignment`
///
/// `alignment` must be a power of two.
pub(crate) const fn align(n: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (n + alignment - 1) & !(alignment - 1)
}

/// Number of storage bytes needed to hold `size` bits
pub(crate) const fn storage_len(size: usize) -> usize {
    align(size, BITS_PER_BYTE) / BITS_PER_BYTE
}

/// Location of a bit within the storage bytes
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct BitPosition {
    /// Index of the byte holding the bit
    pub(crate) byte: usize,

    /// Single-bit mask selecting the bit within that byte
    pub(crate) mask: u8,
}
//
impl BitPosition {
    /// Locate bit `offset`
    pub(crate) const fn new(offset: usize) -> Self {
        Self {
            byte: offset / BITS_PER_BYTE,
            mask: 1 << (offset % BITS_PER_BYTE),
        }
    }

    /// Offset of the bit at position `bit` of byte `byte`
    pub(crate) const fn offset(byte: usize, bit: usize) -> usize {
        byte * BITS_PER_BYTE + bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    #[allow(unused)]
    use similar_asserts::assert_eq;

    #[test]
    fn align_examples() {
        assert_eq!(align(0, 8), 0);
        assert_eq!(align(1, 8), 8);
        assert_eq!(align(8, 8), 8);
        assert_eq!(align(24, 8), 24);
        assert_eq!(align(25, 8), 32);
        assert_eq!(align(1023, 8), 1024);
    }

    #[test]
    fn storage_len_examples() {
        assert_eq!(storage_len(1), 1);
        assert_eq!(storage_len(8), 1);
        assert_eq!(storage_len(9), 2);
        assert_eq!(storage_len(24), 3);
        assert_eq!(storage_len(1024), 128);
    }

    proptest! {
        #[test]
        fn storage_covers_size(size in 1usize..=4096) {
            let len = storage_len(size);
            prop_assert!(len * BITS_PER_BYTE >= size);
            prop_assert!(len * BITS_PER_BYTE < size + BITS_PER_BYTE);
        }

        #[test]
        fn position_roundtrip(offset in 0usize..4096) {
            let pos = BitPosition::new(offset);
            prop_assert_eq!(pos.mask.count_ones(), 1);
            let bit = pos.mask.trailing_zeros() as usize;
            prop_assert_eq!(BitPosition::offset(pos.byte, bit), offset);
        }
    }
}
