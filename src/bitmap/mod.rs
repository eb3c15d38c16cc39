//! Fixed-size CPU bitmap
//!
//! # Bitmaps
//!
//! A [`NumaBitmap`] models the logical CPUs of a machine as a fixed number of
//! bits, one per CPU offset, where a set bit means "in use" and an unset bit
//! means "free". The number of bits is chosen at construction time and never
//! changes afterwards.
//!
//! # Bitmap size
//!
//! Storage is allocated in whole bytes, so a bitmap whose size is not a
//! multiple of 8 physically holds a few padding bits past its end. These are
//! never part of the bitmap: bit access rejects them with [`OutOfRange`] and
//! enumeration never reports them.
//!
//! Construction is lenient. Sizes of 0 or above [`MAX_SIZE`] are replaced by
//! [`DEFAULT_SIZE`] rather than rejected, so callers that need strict
//! validation should either check [`NumaBitmap::size()`] against what they
//! asked for or use [`NumaBitmap::try_new()`].
//!
//! # NUMA nodes
//!
//! Offsets can be grouped by NUMA node according to one of two topology
//! models, see the [`node`](crate::node) module.

pub(crate) mod layout;

use self::layout::{BitPosition, BITS_PER_BYTE};
use crate::errors::{OutOfRange, ParameterError};
#[cfg(any(test, feature = "proptest"))]
use proptest::prelude::*;
use std::{
    convert::Infallible,
    fmt::{self, Debug, Display, Formatter},
    num::NonZeroUsize,
};

/// Size of a bitmap that was built with an invalid size (24 CPUs)
pub const DEFAULT_SIZE: usize = 24;

/// Largest supported bitmap size
pub const MAX_SIZE: usize = 1024;

/// Default number of NUMA nodes (2)
pub const DEFAULT_NODE_COUNT: NonZeroUsize = match NonZeroUsize::new(2) {
    Some(count) => count,
    None => unreachable!(),
};

/// Fixed-size bitmap of logical CPUs
///
/// See the [module-level documentation](self) for an overview.
///
/// # Concurrency
///
/// All operations are synchronous and perform no I/O. Mutation goes through
/// `&mut self`, so the borrow checker already enforces a single writer. To
/// share a bitmap between threads that mutate it, wrap it in a lock; to share
/// it read-only, finish setting bits first and then hand out `&NumaBitmap`.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct NumaBitmap {
    /// Backing storage, `storage_len(size)` bytes
    bits: Box<[u8]>,

    /// Logical number of bits
    size: usize,

    /// Default node count hint
    node_count: NonZeroUsize,
}

impl NumaBitmap {
    // === Construction ===

    /// Create a bitmap with `size` bits, all unset
    ///
    /// If `size` is 0 or greater than [`MAX_SIZE`], a bitmap of
    /// [`DEFAULT_SIZE`] bits is created instead.
    ///
    /// `node_count` is recorded as a default topology hint, which can be
    /// queried with [`node_count()`](Self::node_count). Node-aware queries
    /// take their own node count parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// # use numa_bitmap::{NumaBitmap, DEFAULT_SIZE};
    /// # use std::num::NonZeroUsize;
    /// let four = NonZeroUsize::new(4).unwrap();
    /// assert_eq!(NumaBitmap::new(48, four).size(), 48);
    /// assert_eq!(NumaBitmap::new(0, four).size(), DEFAULT_SIZE);
    /// assert_eq!(NumaBitmap::new(4096, four).size(), DEFAULT_SIZE);
    /// ```
    pub fn new(size: usize, node_count: NonZeroUsize) -> Self {
        let size = if Self::is_valid_size(size) {
            size
        } else {
            tracing::debug!(
                requested = size,
                substituted = DEFAULT_SIZE,
                "invalid bitmap size, using default size"
            );
            DEFAULT_SIZE
        };
        Self {
            bits: vec![0; layout::storage_len(size)].into_boxed_slice(),
            size,
            node_count,
        }
    }

    /// Create a bitmap with `size` bits, all unset, rejecting invalid sizes
    ///
    /// This is a strict alternative to [`new()`](Self::new) which does not
    /// substitute a default size.
    ///
    /// # Errors
    ///
    /// [`ParameterError`] if `size` is 0 or greater than [`MAX_SIZE`].
    pub fn try_new(size: usize, node_count: NonZeroUsize) -> Result<Self, ParameterError<usize>> {
        if Self::is_valid_size(size) {
            Ok(Self::new(size, node_count))
        } else {
            Err(ParameterError(size))
        }
    }

    /// Truth that `size` can be used without substitution
    fn is_valid_size(size: usize) -> bool {
        (1..=MAX_SIZE).contains(&size)
    }

    // === Properties ===

    /// Logical number of bits, i.e. the exclusive upper bound of valid offsets
    pub fn size(&self) -> usize {
        self.size
    }

    /// Default node count that this bitmap was created with
    pub fn node_count(&self) -> NonZeroUsize {
        self.node_count
    }

    /// Number of bits that are physically allocated
    ///
    /// This is [`size()`](Self::size) rounded up to a multiple of 8.
    pub fn storage_bits(&self) -> usize {
        self.bits.len() * BITS_PER_BYTE
    }

    /// Backing storage, bit `offset` being bit `offset % 8` of byte
    /// `offset / 8`
    ///
    /// Padding bits past [`size()`](Self::size) are always zero.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    // === Bit access ===

    /// Set (`value == true`) or clear (`value == false`) bit `offset`
    ///
    /// Setting a bit to the value it already has does nothing.
    ///
    /// # Errors
    ///
    /// [`OutOfRange`] if `offset >= self.size()`. The bitmap is not modified.
    pub fn set_bit(&mut self, offset: usize, value: bool) -> Result<(), OutOfRange> {
        let pos = self.position(offset)?;
        if value {
            self.bits[pos.byte] |= pos.mask;
        } else {
            self.bits[pos.byte] &= !pos.mask;
        }
        Ok(())
    }

    /// Mark CPU `offset` as in use
    ///
    /// # Errors
    ///
    /// [`OutOfRange`] if `offset >= self.size()`.
    pub fn set(&mut self, offset: usize) -> Result<(), OutOfRange> {
        self.set_bit(offset, true)
    }

    /// Mark CPU `offset` as free
    ///
    /// # Errors
    ///
    /// [`OutOfRange`] if `offset >= self.size()`.
    pub fn unset(&mut self, offset: usize) -> Result<(), OutOfRange> {
        self.set_bit(offset, false)
    }

    /// Value of bit `offset`
    ///
    /// # Errors
    ///
    /// [`OutOfRange`] if `offset >= self.size()`.
    pub fn get_bit(&self, offset: usize) -> Result<bool, OutOfRange> {
        let pos = self.position(offset)?;
        Ok(self.bits[pos.byte] & pos.mask != 0)
    }

    /// Clear all bits
    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    /// Locate bit `offset`, checking that it is in range
    /// Mark every CPU of `offsets` as in use
    ///
    /// Offsets must have been validated against `self.size()` beforehand,
    /// e.g. by coming out of an enumeration of this bitmap.
    pub(crate) fn set_validated(&mut self, offsets: &[usize]) {
        for &offset in offsets {
            debug_assert!(offset < self.size, "offset {offset} was not validated");
            let pos = BitPosition::new(offset);
            self.bits[pos.byte] |= pos.mask;
        }
    }

    fn position(&self, offset: usize) -> Result<BitPosition, OutOfRange> {
        if offset < self.size {
            Ok(BitPosition::new(offset))
        } else {
            Err(OutOfRange {
                offset,
                size: self.size,
            })
        }
    }

    // === Enumeration ===

    /// Ascending offsets of all set bits
    ///
    /// # Examples
    ///
    /// ```
    /// # use numa_bitmap::NumaBitmap;
    /// let mut bitmap = NumaBitmap::default();
    /// bitmap.set(10)?;
    /// bitmap.set(1)?;
    /// assert_eq!(bitmap.ones_offsets(), [1, 10]);
    /// # Ok::<(), numa_bitmap::errors::OutOfRange>(())
    /// ```
    pub fn ones_offsets(&self) -> Vec<usize> {
        self.offsets_with(true)
    }

    /// Ascending offsets of all unset bits
    pub fn zeros_offsets(&self) -> Vec<usize> {
        self.offsets_with(false)
    }

    /// Number of set bits
    pub fn weight(&self) -> usize {
        // Padding bits are never set, so they can be counted too
        self.bits.iter().map(|byte| byte.count_ones() as usize).sum()
    }

    /// Truth that no bit is set
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&byte| byte == 0)
    }

    /// Human-readable listing of the set offsets, e.g. `[1, 10]`
    ///
    /// This is the same as the [`Display`] output.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Ascending offsets of all bits equal to `value`
    fn offsets_with(&self, value: bool) -> Vec<usize> {
        let mut offsets = Vec::new();
        let result = self.scan(|offset, bit| {
            if bit == value {
                offsets.push(offset);
            }
            Ok::<(), Infallible>(())
        });
        match result {
            Ok(()) => offsets,
            Err(never) => match never {},
        }
    }

    /// Visit every in-range bit in ascending offset order
    ///
    /// The scan stops at the first error returned by `visit`, which is then
    /// propagated to the caller. Padding bits are never visited.
    pub(crate) fn scan<E>(
        &self,
        mut visit: impl FnMut(usize, bool) -> Result<(), E>,
    ) -> Result<(), E> {
        for (byte, &bits) in self.bits.iter().enumerate() {
            for bit in 0..BITS_PER_BYTE {
                let offset = BitPosition::offset(byte, bit);
                if offset >= self.size {
                    return Ok(());
                }
                visit(offset, (bits >> bit) & 1 != 0)?;
            }
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "proptest"))]
impl Arbitrary for NumaBitmap {
    type Parameters = ();
    type Strategy = prop::strategy::Map<
        (
            std::ops::RangeInclusive<usize>,
            std::ops::RangeInclusive<usize>,
            prop::collection::VecStrategy<std::ops::Range<usize>>,
            prop::bool::Any,
        ),
        fn((usize, usize, Vec<usize>, bool)) -> Self,
    >;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (
            1..=MAX_SIZE,
            1..=16usize,
            prop::collection::vec(0..MAX_SIZE, 0..=64),
            prop::bool::ANY,
        )
            .prop_map(|(size, node_count, offsets, invert)| {
                let node_count = NonZeroUsize::new(node_count).unwrap_or(DEFAULT_NODE_COUNT);
                let mut result = Self::new(size, node_count);

                // Fold the offsets into range, some bits may be hit twice
                for offset in offsets {
                    result
                        .set(offset % size)
                        .expect("offset was folded into range");
                }

                // Decide by coin flip to invert it, to get mostly-full bitmaps
                if invert {
                    for offset in 0..size {
                        let value = result.get_bit(offset).expect("offset is in range");
                        result
                            .set_bit(offset, !value)
                            .expect("offset is in range");
                    }
                }

                result
            })
    }
}

impl Debug for NumaBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumaBitmap")
            .field("size", &self.size)
            .field("node_count", &self.node_count)
            .field("ones", &self.ones_offsets())
            .finish()
    }
}

impl Default for NumaBitmap {
    /// Bitmap of [`DEFAULT_SIZE`] CPUs over [`DEFAULT_NODE_COUNT`] nodes
    fn default() -> Self {
        Self::new(DEFAULT_SIZE, DEFAULT_NODE_COUNT)
    }
}

impl Display for NumaBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ones_offsets()).finish()
    }
}
