//! Fixed-point scaled integers.
//!
//! A [`ShiftedInt<I, SHIFT>`] represents a value whose lowest `SHIFT` bits
//! are always zero by storing `value >> SHIFT` in an integer of type `I`. This
//! extends the range of `I` by `SHIFT` bits at the cost of precision.

use std::error::Error;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign};

/// Integer type usable as the storage of a [`ShiftedInt`].
pub trait FixedInt: Copy + Eq + Ord + fmt::Debug {
    /// Smallest value of the type.
    const MIN: Self;

    /// Largest value of the type.
    const MAX: Self;

    /// Number of bits holding the magnitude, excluding any sign bit.
    const MAGNITUDE_BITS: u32;

    /// Widens the value to an `i128`.
    fn to_i128(self) -> i128;

    /// Narrows an `i128`, keeping only the low bits.
    fn wrap(value: i128) -> Self;
}

macro_rules! impl_fixed_int {
    ($($t:ty: $magnitude:expr),*) => {
        $(
            impl FixedInt for $t {
                const MIN: Self = <$t>::MIN;
                const MAX: Self = <$t>::MAX;
                const MAGNITUDE_BITS: u32 = $magnitude;

                #[inline]
                fn to_i128(self) -> i128 {
                    self as i128
                }

                #[inline]
                fn wrap(value: i128) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_fixed_int!(
    u8: 8, u16: 16, u32: 32, u64: 64,
    i8: 7, i16: 15, i32: 31, i64: 63
);

/// Error returned when a value cannot be represented exactly by a
/// [`ShiftedInt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrecisionLoss {
    /// The value is outside of the representable range.
    TooLarge,

    /// Some of the low bits dropped by the shift were set.
    LowBitsLost,
}

impl fmt::Display for PrecisionLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecisionLoss::TooLarge => f.write_str("input type is too large"),
            PrecisionLoss::LowBitsLost => f.write_str("lower digits are lost"),
        }
    }
}

impl Error for PrecisionLoss {}

/// An integer stored shifted right by `SHIFT` bits.
///
/// The represented value must fit in an `i128`, so the magnitude bits of `I`
/// plus `SHIFT` may not exceed 127. Larger combinations fail to compile:
///
/// ```compile_fail
/// use corothread::fixed::ShiftedInt;
///
/// let _ = ShiftedInt::<u64, 64>::from_shifted(1);
/// ```
///
/// ```rust
/// use corothread::fixed::{PrecisionLoss, ShiftedInt};
///
/// type Pages = ShiftedInt<u16, 12>;
///
/// let a = Pages::try_new(0x3000).unwrap();
/// assert_eq!(a.shifted(), 3);
/// assert_eq!((a + Pages::new(0x1000)).value(), 0x4000);
/// assert_eq!(Pages::try_new(0x3001), Err(PrecisionLoss::LowBitsLost));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShiftedInt<I: FixedInt, const SHIFT: u32> {
    shifted: I,
}

impl<I: FixedInt, const SHIFT: u32> ShiftedInt<I, SHIFT> {
    const FITS_I128: () = assert!(
        I::MAGNITUDE_BITS + SHIFT <= 127,
        "shifted value does not fit in an i128"
    );

    const LOW_MASK: i128 = (1 << SHIFT) - 1;

    fn check(value: i128) -> Result<(), PrecisionLoss> {
        let shifted = value >> SHIFT;
        if shifted > I::MAX.to_i128() || shifted < I::MIN.to_i128() {
            return Err(PrecisionLoss::TooLarge);
        }
        if value & Self::LOW_MASK != 0 {
            return Err(PrecisionLoss::LowBitsLost);
        }
        Ok(())
    }

    #[inline]
    fn shift_in(value: i128) -> I {
        I::wrap(value >> SHIFT)
    }

    /// Creates a scaled integer from `value`, dropping its low bits.
    ///
    /// Debug builds assert that no precision is lost; use
    /// [`ShiftedInt::try_new`] to check explicitly.
    pub fn new(value: impl Into<i128>) -> Self {
        let value = value.into();
        debug_assert_eq!(Self::check(value), Ok(()), "precision lost for {}", value);
        Self::from_shifted(Self::shift_in(value))
    }

    /// Creates a scaled integer from `value`, failing if it cannot be
    /// represented exactly.
    pub fn try_new(value: impl Into<i128>) -> Result<Self, PrecisionLoss> {
        let value = value.into();
        Self::check(value)?;
        Ok(Self::from_shifted(Self::shift_in(value)))
    }

    /// Creates a scaled integer from its stored representation.
    #[inline]
    pub fn from_shifted(shifted: I) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS_I128;
        Self { shifted }
    }

    /// Returns the stored representation, `value >> SHIFT`.
    #[inline]
    pub fn shifted(self) -> I {
        self.shifted
    }

    /// Returns the represented value.
    #[inline]
    pub fn value(self) -> i128 {
        self.shifted.to_i128() << SHIFT
    }

    /// Returns the represented value converted to `R`, or `None` if it does
    /// not fit.
    pub fn value_as<R: TryFrom<i128>>(self) -> Option<R> {
        R::try_from(self.value()).ok()
    }

    /// Adds a plain integer, dropping its low bits.
    pub fn add_value(self, value: impl Into<i128>) -> Self {
        let value = value.into();
        debug_assert_eq!(Self::check(value), Ok(()), "precision lost for {}", value);
        let sum = self.shifted.to_i128().wrapping_add(value >> SHIFT);
        Self::from_shifted(I::wrap(sum))
    }

    /// Multiplies by a plain integer factor.
    pub fn scale(self, factor: impl Into<i128>) -> Self {
        let product = self.shifted.to_i128().wrapping_mul(factor.into());
        Self::from_shifted(I::wrap(product))
    }

    /// Returns whether this represents the same value as the plain integer
    /// `value`, ignoring the low bits of `value`.
    ///
    /// Values outside the representable range never compare equal.
    pub fn eq_value(self, value: impl Into<i128>) -> bool {
        self.shifted.to_i128() == value.into() >> SHIFT
    }
}

impl<I: FixedInt, const SHIFT: u32> Add for ShiftedInt<I, SHIFT> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let sum = self.shifted.to_i128().wrapping_add(rhs.shifted.to_i128());
        Self::from_shifted(I::wrap(sum))
    }
}

impl<I: FixedInt, const SHIFT: u32> AddAssign for ShiftedInt<I, SHIFT> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<I: FixedInt, const SHIFT: u32> Mul for ShiftedInt<I, SHIFT> {
    type Output = Self;

    // (a << S) * (b << S) == (a * b << S) << S
    fn mul(self, rhs: Self) -> Self {
        let product = self
            .shifted
            .to_i128()
            .wrapping_mul(rhs.shifted.to_i128())
            .wrapping_shl(SHIFT);
        Self::from_shifted(I::wrap(product))
    }
}

impl<I: FixedInt, const SHIFT: u32> MulAssign for ShiftedInt<I, SHIFT> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<I: FixedInt, const SHIFT: u32> fmt::Debug for ShiftedInt<I, SHIFT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?} << {})", self.value(), self.shifted, SHIFT)
    }
}
