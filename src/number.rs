//! Integers that never overflow.
//!
//! Populations and world coordinates of a quadtree with `level` levels reach
//! `4^level` and `2^level` respectively. Almost every universe stays well
//! inside `i64`, so [`Number`] keeps a machine word and only switches to
//! [`BigInt`] when a checked operation overflows. Results that fit back into
//! a machine word are normalized back to a machine word, which keeps equality,
//! ordering and hashing consistent across both representations.

use num_bigint::{BigInt, Sign};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, BitOr, Neg, Shl, Sub};

/// An integer of any size.
///
/// The representation is private so that every value stays normalized:
/// anything that fits into `i64` is stored as a machine word.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Number(Repr);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Repr {
    /// Fast path, used whenever the value fits into `i64`.
    Small(i64),
    /// Never holds a value representable as `Small`.
    Big(BigInt),
}

impl Number {
    pub const ZERO: Number = Number::small(0);
    pub const ONE: Number = Number::small(1);

    const fn small(value: i64) -> Self {
        Number(Repr::Small(value))
    }

    /// `value` must not fit into `i64`.
    fn big(value: BigInt) -> Self {
        Number(Repr::Big(value))
    }

    fn from_big(value: BigInt) -> Self {
        match i64::try_from(&value) {
            Ok(x) => Number::small(x),
            Err(_) => Number::big(value),
        }
    }

    /// `2^exp`
    pub fn pow2(exp: u32) -> Self {
        Number::ONE << exp
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.0, Repr::Small(0))
    }

    pub fn is_one(&self) -> bool {
        matches!(self.0, Repr::Small(1))
    }

    pub fn is_negative(&self) -> bool {
        match &self.0 {
            Repr::Small(x) => *x < 0,
            Repr::Big(x) => x.sign() == Sign::Minus,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match &self.0 {
            Repr::Small(x) => Some(*x),
            Repr::Big(_) => None,
        }
    }

    pub fn to_bigint(&self) -> BigInt {
        match &self.0 {
            Repr::Small(x) => BigInt::from(*x),
            Repr::Big(x) => x.clone(),
        }
    }

    /// Minimum number of characters needed to print the value at full
    /// precision, the minus sign included.
    pub fn digits(&self) -> usize {
        match &self.0 {
            Repr::Small(x) => {
                let sign = usize::from(*x < 0);
                let magnitude = x.unsigned_abs();
                sign + magnitude.checked_ilog10().map_or(1, |d| d as usize + 1)
            }
            Repr::Big(x) => x.to_string().len(),
        }
    }

    pub fn min(self, other: Number) -> Number {
        if other < self {
            other
        } else {
            self
        }
    }

    pub fn max(self, other: Number) -> Number {
        if other > self {
            other
        } else {
            self
        }
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::ZERO
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::small(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::small(value as i64)
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number::small(value as i64)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(x) => Number::small(x),
            Err(_) => Number::big(BigInt::from(value)),
        }
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number::from(value as u64)
    }
}

impl From<BigInt> for Number {
    fn from(value: BigInt) -> Self {
        Number::from_big(value)
    }
}

impl From<&Number> for BigInt {
    fn from(value: &Number) -> Self {
        value.to_bigint()
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Repr::Small(a), Repr::Small(b)) => a.cmp(b),
            // a normalized Big is always outside the i64 range
            (Repr::Small(_), Repr::Big(b)) => {
                if b.sign() == Sign::Minus {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Repr::Big(a), Repr::Small(_)) => {
                if a.sign() == Sign::Minus {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Repr::Big(a), Repr::Big(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Small(x) => fmt::Display::fmt(x, f),
            Repr::Big(x) => fmt::Display::fmt(x, f),
        }
    }
}

impl Add<&Number> for &Number {
    type Output = Number;

    fn add(self, rhs: &Number) -> Number {
        if let (Repr::Small(a), Repr::Small(b)) = (&self.0, &rhs.0) {
            if let Some(x) = a.checked_add(*b) {
                return Number::small(x);
            }
        }
        Number::from_big(self.to_bigint() + rhs.to_bigint())
    }
}

impl Sub<&Number> for &Number {
    type Output = Number;

    fn sub(self, rhs: &Number) -> Number {
        if let (Repr::Small(a), Repr::Small(b)) = (&self.0, &rhs.0) {
            if let Some(x) = a.checked_sub(*b) {
                return Number::small(x);
            }
        }
        Number::from_big(self.to_bigint() - rhs.to_bigint())
    }
}

impl Neg for &Number {
    type Output = Number;

    fn neg(self) -> Number {
        match &self.0 {
            Repr::Small(x) => match x.checked_neg() {
                Some(x) => Number::small(x),
                None => Number::big(-BigInt::from(*x)),
            },
            Repr::Big(x) => Number::from_big(-x.clone()),
        }
    }
}

impl Shl<u32> for &Number {
    type Output = Number;

    fn shl(self, rhs: u32) -> Number {
        if let Repr::Small(x) = &self.0 {
            if rhs < 63 {
                let shifted = *x << rhs;
                if shifted >> rhs == *x {
                    return Number::small(shifted);
                }
            }
            if *x == 0 {
                return Number::ZERO;
            }
        }
        Number::from_big(self.to_bigint() << rhs as usize)
    }
}

impl BitOr<&Number> for &Number {
    type Output = Number;

    fn bitor(self, rhs: &Number) -> Number {
        match (&self.0, &rhs.0) {
            (Repr::Small(a), Repr::Small(b)) => Number::small(a | b),
            _ => Number::from_big(self.to_bigint() | rhs.to_bigint()),
        }
    }
}

/// Forwards the owned flavours of a binary operator to the by-reference one.
macro_rules! forward_binop {
    ($trait:ident, $method:ident) => {
        impl $trait<Number> for Number {
            type Output = Number;
            fn $method(self, rhs: Number) -> Number {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&Number> for Number {
            type Output = Number;
            fn $method(self, rhs: &Number) -> Number {
                (&self).$method(rhs)
            }
        }

        impl $trait<Number> for &Number {
            type Output = Number;
            fn $method(self, rhs: Number) -> Number {
                self.$method(&rhs)
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(BitOr, bitor);

impl Neg for Number {
    type Output = Number;
    fn neg(self) -> Number {
        -&self
    }
}

impl Shl<u32> for Number {
    type Output = Number;
    fn shl(self, rhs: u32) -> Number {
        &self << rhs
    }
}

impl std::iter::Sum for Number {
    fn sum<I: Iterator<Item = Number>>(iter: I) -> Self {
        iter.fold(Number::ZERO, |acc, x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_promotes_and_demotes() {
        let max = Number::from(i64::MAX);
        let sum = &max + &Number::ONE;
        assert!(matches!(sum.0, Repr::Big(_)));
        assert_eq!(sum.to_bigint(), BigInt::from(i64::MAX) + 1);

        let back = &sum - &Number::ONE;
        assert_eq!(back, Number::small(i64::MAX));
    }

    #[test]
    fn test_bigint_conversion_normalizes() {
        use std::collections::HashSet;

        let one = Number::from(BigInt::from(1));
        assert_eq!(one, Number::ONE);
        assert!(one.is_one());
        assert!(matches!(one.0, Repr::Small(1)));

        let wide = Number::from(BigInt::from(i64::MIN) - 1);
        assert!(matches!(wide.0, Repr::Big(_)));
        let set: HashSet<Number> = [one, Number::from(1i64), wide.clone(), &wide + &Number::ZERO]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_neg_min() {
        let min = Number::from(i64::MIN);
        let negated = -&min;
        assert_eq!(negated.to_bigint(), -BigInt::from(i64::MIN));
        assert_eq!(-negated, min);
    }

    #[test]
    fn test_ordering_across_representations() {
        let big_positive = Number::pow2(100);
        let big_negative = -&big_positive;
        let small = Number::from(-5i64);
        assert!(big_negative < small);
        assert!(small < big_positive);
        assert!(big_negative < big_positive);
        assert_eq!(small.clone().max(big_positive.clone()), big_positive);
        assert_eq!(small.clone().min(big_negative.clone()), big_negative);
    }

    #[test]
    fn test_shl() {
        assert_eq!(Number::pow2(0), Number::ONE);
        assert_eq!(Number::pow2(62), Number::small(1 << 62));
        assert!(matches!(Number::pow2(63).0, Repr::Big(_)));
        assert_eq!(Number::pow2(2048).to_bigint(), BigInt::from(1) << 2048usize);
        assert_eq!(Number::from(-3i64) << 2, Number::from(-12i64));
        assert_eq!(Number::ZERO << 1000, Number::ZERO);
    }

    #[test]
    fn test_bitor() {
        let mask = Number::pow2(3) | Number::pow2(2);
        assert_eq!(mask, Number::from(12i64));
        let wide = Number::pow2(70) | Number::ONE;
        assert_eq!(wide.to_bigint(), (BigInt::from(1) << 70usize) + 1);
    }

    #[test]
    fn test_predicates() {
        assert!(Number::ZERO.is_zero());
        assert!(Number::ONE.is_one());
        assert!(!Number::pow2(64).is_zero());
        assert!((Number::pow2(64) - Number::pow2(64)).is_zero());
    }

    #[test]
    fn test_digits() {
        assert_eq!(Number::ZERO.digits(), 1);
        assert_eq!(Number::from(9i64).digits(), 1);
        assert_eq!(Number::from(10i64).digits(), 2);
        assert_eq!(Number::from(-10i64).digits(), 3);
        assert_eq!(Number::from(i64::MIN).digits(), i64::MIN.to_string().len());
        let big = Number::pow2(100);
        assert_eq!(big.digits(), big.to_string().len());
    }

    #[test]
    fn test_sum() {
        let total: Number = [1i64, 2, 3, i64::MAX]
            .into_iter()
            .map(Number::from)
            .sum();
        assert_eq!(total.to_bigint(), BigInt::from(i64::MAX) + 6);
    }
}
