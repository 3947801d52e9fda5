//! Bit-packed bin storage.
//!
//! Every value of a column uses the same width, `ceil(log2(bin_count))` bits.
//! Values are packed little-end first into `u64` words and never straddle a
//! word boundary, so a word holds `64 / bits` values:
//!
//! ```text
//! bits = 3, 21 values per word
//! word 0: [v0 v1 v2 ... v20 | 1 unused bit]
//! word 1: [v21 ... v41      | 1 unused bit]
//! ```

use crate::error::PoolError;

const WORD_BITS: u32 = u64::BITS;

/// Number of bits needed to store indices in `[0, bin_count)`.
///
/// Zero or one bin needs no bits at all.
#[inline]
pub fn bits_for_bin_count(bin_count: u32) -> u32 {
    if bin_count <= 1 {
        0
    } else {
        u32::BITS - (bin_count - 1).leading_zeros()
    }
}

/// An immutable, word-aligned column of fixed-width bin indices.
///
/// # Example
///
/// ```
/// use quantpool::data::PackedBins;
///
/// let packed = PackedBins::pack(&[0u8, 3, 1, 2], 4).unwrap();
/// assert_eq!(packed.bits_per_value(), 2);
/// assert_eq!(packed.get(1), 3);
/// assert_eq!(packed.unpack(), vec![0, 3, 1, 2]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedBins {
    words: Box<[u64]>,
    bits: u32,
    len: usize,
}

impl PackedBins {
    /// Pack `indices`, each of which must lie in `[0, bin_count)`.
    ///
    /// With `bin_count <= 1` the column is degenerate: no words are stored and
    /// every value reads back as 0.
    pub fn pack<T>(indices: &[T], bin_count: u32) -> Result<Self, PoolError>
    where
        T: Copy + Into<u32>,
    {
        let bits = bits_for_bin_count(bin_count);
        let len = indices.len();

        if bits == 0 {
            if let Some(bin) = indices.iter().map(|&v| Into::<u32>::into(v)).find(|&v| v != 0) {
                return Err(PoolError::BinOutOfRange { bin, bin_count });
            }
            return Ok(Self {
                words: Box::new([]),
                bits,
                len,
            });
        }

        let per_word = (WORD_BITS / bits) as usize;
        let mut words = vec![0u64; len.div_ceil(per_word)];

        for (chunk, word) in indices.chunks(per_word).zip(words.iter_mut()) {
            let mut packed = 0u64;
            for (slot, &value) in chunk.iter().enumerate() {
                let bin: u32 = value.into();
                if bin >= bin_count {
                    return Err(PoolError::BinOutOfRange { bin, bin_count });
                }
                packed |= (bin as u64) << (slot as u32 * bits);
            }
            *word = packed;
        }

        Ok(Self {
            words: words.into_boxed_slice(),
            bits,
            len,
        })
    }

    /// Number of packed values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of a single value in bits.
    #[inline]
    pub fn bits_per_value(&self) -> u32 {
        self.bits
    }

    /// Values stored per `u64` word (0 for a degenerate column).
    #[inline]
    pub fn values_per_word(&self) -> usize {
        if self.bits == 0 {
            0
        } else {
            (WORD_BITS / self.bits) as usize
        }
    }

    /// Raw packed words, as uploaded to the device.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Memory size in bytes.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    /// Bin index at position `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= self.len()`.
    #[inline]
    pub fn get(&self, idx: usize) -> u32 {
        assert!(idx < self.len, "index {idx} out of bounds for {} values", self.len);
        if self.bits == 0 {
            return 0;
        }
        let per_word = self.values_per_word();
        let word = self.words[idx / per_word];
        let shift = (idx % per_word) as u32 * self.bits;
        ((word >> shift) & self.mask()) as u32
    }

    /// Iterate over all bin indices in order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).map(move |idx| self.get(idx))
    }

    /// Decode the whole column.
    pub fn unpack(&self) -> Vec<u32> {
        self.iter().collect()
    }

    #[inline]
    fn mask(&self) -> u64 {
        if self.bits >= WORD_BITS {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }
}
