//! Checked integer conversions and arithmetic.
//!
//! Every offset, length and size computed by the reader and writer goes
//! through these helpers, so a value that does not fit surfaces as
//! [`Bw64Error::Overflow`] or [`Bw64Error::Underflow`] instead of wrapping
//! around inside a header field.

use crate::error::{Bw64Error, Result};
use std::fmt::Display;
use std::ops::{Add, Sub};

pub trait BoundedInt:
    Copy + PartialOrd + Display + Add<Output = Self> + Sub<Output = Self>
{
    const MIN: Self;
    const MAX: Self;
    const ZERO: Self;

    fn checked_mul(self, rhs: Self) -> Option<Self>;
}

macro_rules! impl_bounded_int {
    ($($t:ty),*) => {
        $(
            impl BoundedInt for $t {
                const MIN: Self = <$t>::MIN;
                const MAX: Self = <$t>::MAX;
                const ZERO: Self = 0;

                fn checked_mul(self, rhs: Self) -> Option<Self> {
                    <$t>::checked_mul(self, rhs)
                }
            }
        )*
    };
}

impl_bounded_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// Convert `x` to `To`, failing if it lies outside the target range.
///
/// The range test is done by `TryFrom`, which compares in the wider of the
/// two domains, so e.g. `i64::MAX -> u32` is an overflow and `-1i64 -> u32`
/// an underflow without any sign-promotion surprises.
pub fn safe_cast<To, Src>(x: Src) -> Result<To>
where
    Src: BoundedInt,
    To: TryFrom<Src>,
{
    To::try_from(x).map_err(|_| {
        let expr = x.to_string();
        let ty = std::any::type_name::<To>();
        if x < Src::ZERO {
            Bw64Error::Underflow { expr, ty }
        } else {
            Bw64Error::Overflow { expr, ty }
        }
    })
}

/// Add two values of the same type. The bound at risk is checked before the
/// addition is performed.
pub fn safe_add<T: BoundedInt>(x: T, y: T) -> Result<T> {
    if y > T::ZERO && x > T::MAX - y {
        return Err(Bw64Error::Overflow {
            expr: format!("{x} + {y}"),
            ty: std::any::type_name::<T>(),
        });
    }
    if y < T::ZERO && x < T::MIN - y {
        return Err(Bw64Error::Underflow {
            expr: format!("{x} + {y}"),
            ty: std::any::type_name::<T>(),
        });
    }
    Ok(x + y)
}

/// Subtract `y` from `x`, both of the same type.
pub fn safe_sub<T: BoundedInt>(x: T, y: T) -> Result<T> {
    if y > T::ZERO && x < T::MIN + y {
        return Err(Bw64Error::Underflow {
            expr: format!("{x} - {y}"),
            ty: std::any::type_name::<T>(),
        });
    }
    if y < T::ZERO && x > T::MAX + y {
        return Err(Bw64Error::Overflow {
            expr: format!("{x} - {y}"),
            ty: std::any::type_name::<T>(),
        });
    }
    Ok(x - y)
}

/// Multiply two values of the same type.
pub fn safe_mul<T: BoundedInt>(x: T, y: T) -> Result<T> {
    x.checked_mul(y).ok_or_else(|| {
        let expr = format!("{x} * {y}");
        let ty = std::any::type_name::<T>();
        // the product is negative exactly when the signs differ
        if (x < T::ZERO) != (y < T::ZERO) {
            Bw64Error::Underflow { expr, ty }
        } else {
            Bw64Error::Overflow { expr, ty }
        }
    })
}
