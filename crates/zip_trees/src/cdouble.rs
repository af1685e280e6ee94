//! Epsilon-tolerant double, used for bin-packing capacities. Ported from
//! `cdouble.{h,cpp}`; `sub` clamps at `0.0` where the original left an
//! unclamped subtraction the Design Notes flag as suspicious (remaining
//! capacity must never drift negative from floating-point residue).

use std::ops::{Add, Sub};

const EQ_THRESHOLD: f64 = f64::EPSILON;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CDouble {
    pub val: f64,
}

impl CDouble {
    pub fn new(val: f64) -> Self {
        Self { val }
    }

    pub fn ge(self, other: CDouble) -> bool {
        self.val >= other.val - EQ_THRESHOLD
    }

    pub fn lt(self, other: CDouble) -> bool {
        self.val < other.val - EQ_THRESHOLD
    }

    pub fn approx_eq(self, other: CDouble) -> bool {
        (self.val - other.val).abs() <= EQ_THRESHOLD
    }

    pub fn sub(self, other: CDouble) -> CDouble {
        CDouble::new((self.val - other.val).max(0.0))
    }
}

impl From<f64> for CDouble {
    fn from(val: f64) -> Self {
        CDouble::new(val)
    }
}

impl Add for CDouble {
    type Output = CDouble;

    fn add(self, rhs: CDouble) -> CDouble {
        CDouble::new(self.val + rhs.val)
    }
}

impl Sub for CDouble {
    type Output = CDouble;

    fn sub(self, rhs: CDouble) -> CDouble {
        self.sub(rhs)
    }
}
