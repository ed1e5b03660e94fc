//! Numeric coefficients of symbolic expressions
//!
//! Coefficients stay exact rationals as long as they fit in `i64`; anything
//! that overflows, or that came in as a float, is carried as `f64`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Greatest common divisor using Euclidean algorithm
fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// A numeric coefficient
#[derive(Debug, Clone, Copy)]
pub enum Coefficient {
    /// Exact rational number (numerator, denominator)
    /// Invariant: denominator > 0, gcd(num, den) == 1
    Rational(i64, i64),
    /// Floating-point approximation
    Float(f64),
}

impl Coefficient {
    /// Create an integer coefficient
    pub fn int(n: i64) -> Self {
        Coefficient::Rational(n, 1)
    }

    /// Create a rational coefficient, automatically reducing
    pub fn rational(num: i64, den: i64) -> Self {
        Self::reduce(num as i128, den as i128)
    }

    /// Create a floating-point coefficient
    pub fn float(f: f64) -> Self {
        Coefficient::Float(f)
    }

    fn reduce(num: i128, den: i128) -> Self {
        if den == 0 {
            return Coefficient::Float(match num.cmp(&0) {
                Ordering::Greater => f64::INFINITY,
                Ordering::Less => f64::NEG_INFINITY,
                Ordering::Equal => f64::NAN,
            });
        }

        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let g = gcd(num, den).max(1);
        let (num, den) = (num / g, den / g);

        match (i64::try_from(num), i64::try_from(den)) {
            (Ok(n), Ok(d)) => Coefficient::Rational(n, d),
            _ => Coefficient::Float(num as f64 / den as f64),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Coefficient::Rational(n, _) => *n == 0,
            Coefficient::Float(f) => *f == 0.0,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Coefficient::Rational(n, d) => *n == 1 && *d == 1,
            Coefficient::Float(f) => *f == 1.0,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Coefficient::Rational(n, _) => *n < 0,
            Coefficient::Float(f) => *f < 0.0,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Coefficient::Float(_))
    }

    /// The value as an integer, if it is an exact one
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Coefficient::Rational(n, 1) => Some(*n),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Coefficient::Rational(n, d) => *n as f64 / *d as f64,
            Coefficient::Float(f) => *f,
        }
    }

    pub fn abs(&self) -> Self {
        if self.is_negative() { -*self } else { *self }
    }

    /// Compute power with integer exponent
    pub fn pow_int(&self, exp: i64) -> Self {
        if exp < 0 {
            return Coefficient::int(1) / self.pow_int(exp.saturating_neg());
        }
        if let Coefficient::Float(f) = self {
            return Coefficient::Float(f.powf(exp as f64));
        }

        let mut result = Coefficient::int(1);
        let mut base = *self;
        let mut exp = exp;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result * base;
            }
            base = base * base;
            exp >>= 1;
        }
        result
    }

    /// Exact square root of a non-negative rational whose numerator and
    /// denominator are both perfect squares
    pub fn sqrt_exact(&self) -> Option<Self> {
        match self {
            Coefficient::Rational(n, d) if *n >= 0 => {
                let root = |v: i64| {
                    let r = (v as f64).sqrt().round() as i64;
                    (r.checked_mul(r) == Some(v)).then_some(r)
                };
                Some(Coefficient::Rational(root(*n)?, root(*d)?))
            }
            _ => None,
        }
    }

    /// Raise to an arbitrary power in floating point
    pub fn powf(&self, exp: &Coefficient) -> Self {
        Coefficient::Float(self.to_f64().powf(exp.to_f64()))
    }
}

impl Add for Coefficient {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => Self::reduce(
                a as i128 * d as i128 + c as i128 * b as i128,
                b as i128 * d as i128,
            ),
            (lhs, rhs) => Coefficient::Float(lhs.to_f64() + rhs.to_f64()),
        }
    }
}

impl Sub for Coefficient {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for Coefficient {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                Self::reduce(a as i128 * c as i128, b as i128 * d as i128)
            }
            (lhs, rhs) => Coefficient::Float(lhs.to_f64() * rhs.to_f64()),
        }
    }
}

impl Div for Coefficient {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                Self::reduce(a as i128 * d as i128, b as i128 * c as i128)
            }
            (lhs, rhs) => Coefficient::Float(lhs.to_f64() / rhs.to_f64()),
        }
    }
}

impl Neg for Coefficient {
    type Output = Self;

    fn neg(self) -> Self {
        match self {
            Coefficient::Rational(n, d) => Self::reduce(-(n as i128), d as i128),
            Coefficient::Float(f) => Coefficient::Float(-f),
        }
    }
}

impl PartialEq for Coefficient {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => a == c && b == d,
            (Coefficient::Float(a), Coefficient::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Coefficient {}

impl Hash for Coefficient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Coefficient::Rational(n, d) => {
                0u8.hash(state);
                n.hash(state);
                d.hash(state);
            }
            Coefficient::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
        }
    }
}

impl PartialOrd for Coefficient {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coefficient {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Coefficient::Rational(a, b), Coefficient::Rational(c, d)) => {
                (*a as i128 * *d as i128).cmp(&(*c as i128 * *b as i128))
            }
            (Coefficient::Float(a), Coefficient::Float(b)) => a.total_cmp(b),
            // Mixed: by value, exact before approximate on ties.
            (Coefficient::Rational(..), Coefficient::Float(_)) => self
                .to_f64()
                .total_cmp(&other.to_f64())
                .then(Ordering::Less),
            (Coefficient::Float(_), Coefficient::Rational(..)) => self
                .to_f64()
                .total_cmp(&other.to_f64())
                .then(Ordering::Greater),
        }
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Rational(n, 1) => write!(f, "{}", n),
            Coefficient::Rational(n, d) => write!(f, "{}/{}", n, d),
            Coefficient::Float(v) => write!(f, "{}", v),
        }
    }
}
