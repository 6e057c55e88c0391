//! Fixed-width bit sets.
//!
//! A [`BitArray`] stores its bits in an array of unsigned words. Bits are
//! numbered from the most significant bit of the first word, so that the
//! big-endian byte image of a set does not depend on the word type. Sets with
//! different word types but the same number of bits can therefore be combined
//! with the `*_with` methods.

use std::fmt;
use std::hash::Hash;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Unsigned integer type usable as the storage word of a [`BitArray`].
pub trait Word:
    Copy
    + Eq
    + Hash
    + fmt::Debug
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + Not<Output = Self>
    + BitAndAssign
    + BitOrAssign
{
    /// Number of bits in the word.
    const BITS: usize;

    /// Number of bytes in the word.
    const BYTES: usize;

    /// Word with no bits set.
    const ZERO: Self;

    /// Word with every bit set.
    const MAX: Self;

    /// Returns a word with `len` consecutive bits set, starting `offset` bits
    /// from the most significant end.
    fn span(offset: usize, len: usize) -> Self;

    /// Returns the number of bits set in the word.
    fn count_ones(self) -> u32;

    /// Writes the word into `out` in big-endian order.
    fn write_be(self, out: &mut [u8]);

    /// Reads a word from its big-endian representation.
    fn read_be(bytes: &[u8]) -> Self;
}

macro_rules! impl_word {
    ($($t:ty),*) => {
        $(
            impl Word for $t {
                const BITS: usize = <$t>::BITS as usize;
                const BYTES: usize = std::mem::size_of::<$t>();
                const ZERO: Self = 0;
                const MAX: Self = <$t>::MAX;

                #[inline]
                fn span(offset: usize, len: usize) -> Self {
                    let bits = <Self as Word>::BITS;
                    debug_assert!(offset + len <= bits);
                    if len == 0 {
                        return 0;
                    }
                    (<$t>::MAX >> (bits - len)) << (bits - offset - len)
                }

                #[inline]
                fn count_ones(self) -> u32 {
                    <$t>::count_ones(self)
                }

                #[inline]
                fn write_be(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_be_bytes());
                }

                #[inline]
                fn read_be(bytes: &[u8]) -> Self {
                    let mut buf = [0; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_be_bytes(buf)
                }
            }
        )*
    };
}

impl_word!(u8, u16, u32, u64, u128);

// Big enough for the widest word.
const MAX_WORD_BYTES: usize = 16;

/// A set of `N * W::BITS` bits stored in `N` words of type `W`.
///
/// ```rust
/// use corothread::bits::BitArray;
///
/// let mut a = BitArray::<u8, 4>::empty();
/// a.set_range(6, 4);
/// assert!(a.get_bit(7) && a.get_bit(8));
/// assert_eq!(a.to_string(), "00000011110000000000000000000000");
///
/// // Same 32 bits, stored in a single word.
/// let b = a.cast::<u32, 1>();
/// assert!(a.collides_with(&b));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitArray<W: Word, const N: usize> {
    words: [W; N],
}

impl<W: Word, const N: usize> BitArray<W, N> {
    /// Total number of bits in the set.
    pub const BITS: usize = N * W::BITS;

    /// Creates a set with every bit equal to `initial`.
    pub fn new(initial: bool) -> Self {
        if initial {
            Self::full()
        } else {
            Self::empty()
        }
    }

    /// Creates a set with no bits set.
    pub fn empty() -> Self {
        Self { words: [W::ZERO; N] }
    }

    /// Creates a set with every bit set.
    pub fn full() -> Self {
        Self { words: [W::MAX; N] }
    }

    #[inline]
    fn locate(index: usize) -> (usize, W) {
        assert!(
            index < Self::BITS,
            "bit index {} out of range for a set of {} bits",
            index,
            Self::BITS
        );
        (index / W::BITS, W::span(index % W::BITS, 1))
    }

    /// Returns whether bit `index` is set.
    pub fn get_bit(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.words[word] & mask != W::ZERO
    }

    /// Sets bit `index`.
    pub fn set_bit(&mut self, index: usize) {
        let (word, mask) = Self::locate(index);
        self.words[word] |= mask;
    }

    /// Clears bit `index`.
    pub fn clear_bit(&mut self, index: usize) {
        let (word, mask) = Self::locate(index);
        self.words[word] &= !mask;
    }

    /// Sets the `len` bits starting at `start`.
    pub fn set_range(&mut self, start: usize, len: usize) {
        self.for_each_span(start, len, |word, mask| *word |= mask);
    }

    /// Clears the `len` bits starting at `start`.
    pub fn clear_range(&mut self, start: usize, len: usize) {
        self.for_each_span(start, len, |word, mask| *word &= !mask);
    }

    // Calls `f` once per word overlapping the range, with the mask of the
    // range's bits within that word.
    fn for_each_span(&mut self, start: usize, len: usize, mut f: impl FnMut(&mut W, W)) {
        let end = start.checked_add(len).filter(|&end| end <= Self::BITS);
        let end = match end {
            Some(end) => end,
            None => panic!(
                "bit range {}+{} out of range for a set of {} bits",
                start,
                len,
                Self::BITS
            ),
        };

        let mut bit = start;
        while bit < end {
            let offset = bit % W::BITS;
            let take = (W::BITS - offset).min(end - bit);
            f(&mut self.words[bit / W::BITS], W::span(offset, take));
            bit += take;
        }
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.words = [W::ZERO; N];
    }

    /// Sets every bit.
    pub fn fill(&mut self) {
        self.words = [W::MAX; N];
    }

    /// Returns the number of bits set.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns whether the two sets have at least one bit in common.
    pub fn collides(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(&a, &b)| a & b != W::ZERO)
    }

    /// Sets every bit which is set in `other`.
    pub fn merge(&mut self, other: &Self) {
        for (a, &b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    /// Clears every bit which is not set in `other`.
    pub fn intersect(&mut self, other: &Self) {
        for (a, &b) in self.words.iter_mut().zip(&other.words) {
            *a &= b;
        }
    }

    fn byte(&self, index: usize) -> u8 {
        let mut buf = [0; MAX_WORD_BYTES];
        self.words[index / W::BYTES].write_be(&mut buf[..W::BYTES]);
        buf[index % W::BYTES]
    }

    /// Converts the set to another word type, keeping every bit at the same
    /// index.
    ///
    /// # Panics
    ///
    /// Panics if the two set types do not have the same number of bits.
    pub fn cast<V: Word, const M: usize>(&self) -> BitArray<V, M> {
        assert_eq!(
            Self::BITS,
            BitArray::<V, M>::BITS,
            "bit sets must have the same number of bits"
        );

        let mut out = BitArray::<V, M>::empty();
        let mut buf = [0; MAX_WORD_BYTES];
        for (i, word) in out.words.iter_mut().enumerate() {
            for (j, byte) in buf[..V::BYTES].iter_mut().enumerate() {
                *byte = self.byte(i * V::BYTES + j);
            }
            *word = V::read_be(&buf[..V::BYTES]);
        }
        out
    }

    /// Like [`BitArray::collides`], for a set with a different word type.
    pub fn collides_with<V: Word, const M: usize>(&self, other: &BitArray<V, M>) -> bool {
        self.collides(&other.cast())
    }

    /// Like [`BitArray::merge`], for a set with a different word type.
    pub fn merge_with<V: Word, const M: usize>(&mut self, other: &BitArray<V, M>) {
        self.merge(&other.cast());
    }

    /// Like [`BitArray::intersect`], for a set with a different word type.
    pub fn intersect_with<V: Word, const M: usize>(&mut self, other: &BitArray<V, M>) {
        self.intersect(&other.cast());
    }
}

impl<W: Word, const N: usize> Default for BitArray<W, N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<W: Word, const N: usize> BitOr for BitArray<W, N> {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        self.merge(&rhs);
        self
    }
}

impl<W: Word, const N: usize> BitOrAssign for BitArray<W, N> {
    fn bitor_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

impl<W: Word, const N: usize> BitAnd for BitArray<W, N> {
    type Output = Self;

    fn bitand(mut self, rhs: Self) -> Self {
        self.intersect(&rhs);
        self
    }
}

impl<W: Word, const N: usize> BitAndAssign for BitArray<W, N> {
    fn bitand_assign(&mut self, rhs: Self) {
        self.intersect(&rhs);
    }
}

impl<W: Word, const N: usize> fmt::Display for BitArray<W, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in 0..Self::BITS {
            f.write_str(if self.get_bit(index) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl<W: Word, const N: usize> fmt::Debug for BitArray<W, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitArray({})", self)
    }
}
