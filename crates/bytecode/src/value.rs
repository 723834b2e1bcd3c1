// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// The result of compiling an expression. A known value means nothing was emitted and the
/// caller may keep folding; `Indeterminate` means the bytecode for the expression has been
/// written and the value is only known at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize)]
pub enum CompileTimeValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    #[default]
    Indeterminate,
}

use CompileTimeValue::*;

impl CompileTimeValue {
    pub fn is_known(self) -> bool {
        !matches!(self, Indeterminate)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Float(_))
    }

    /// Truthiness as the runtime sees it: any non-zero value.
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Int(i) => Some(i != 0),
            Float(f) => Some(f != 0.0),
            Bool(b) => Some(b),
            Indeterminate => None,
        }
    }

    /// Integer conversion, truncating floats toward zero.
    pub fn to_i32(self) -> Option<i32> {
        match self {
            Int(i) => Some(i),
            Float(f) => Some(f as i32),
            Bool(b) => Some(b as i32),
            Indeterminate => None,
        }
    }

    pub fn to_f32(self) -> Option<f32> {
        match self {
            Int(i) => Some(i as f32),
            Float(f) => Some(f),
            Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Indeterminate => None,
        }
    }

    pub fn neg(self) -> Self {
        match self {
            Int(i) => Int(i.wrapping_neg()),
            Float(f) => Float(-f),
            Bool(b) => Int(-(b as i32)),
            Indeterminate => Indeterminate,
        }
    }

    pub fn bit_not(self) -> Self {
        match self {
            Float(_) | Indeterminate => Indeterminate,
            other => other.to_i32().map_or(Indeterminate, |i| Int(!i)),
        }
    }

    pub fn bool_not(self) -> Self {
        self.to_bool().map_or(Indeterminate, |b| Bool(!b))
    }

    fn arith(
        self,
        rhs: Self,
        int: impl Fn(i32, i32) -> Option<i32>,
        float: impl Fn(f32, f32) -> f32,
    ) -> Self {
        if !self.is_known() || !rhs.is_known() {
            return Indeterminate;
        }
        if self.is_float() || rhs.is_float() {
            match (self.to_f32(), rhs.to_f32()) {
                (Some(a), Some(b)) => Float(float(a, b)),
                _ => Indeterminate,
            }
        } else {
            match (self.to_i32(), rhs.to_i32()) {
                (Some(a), Some(b)) => int(a, b).map_or(Indeterminate, Int),
                _ => Indeterminate,
            }
        }
    }

    pub fn add(self, rhs: Self) -> Self {
        self.arith(rhs, |a, b| Some(a.wrapping_add(b)), |a, b| a + b)
    }

    pub fn sub(self, rhs: Self) -> Self {
        self.arith(rhs, |a, b| Some(a.wrapping_sub(b)), |a, b| a - b)
    }

    pub fn mul(self, rhs: Self) -> Self {
        self.arith(rhs, |a, b| Some(a.wrapping_mul(b)), |a, b| a * b)
    }

    /// Integer division by zero is left for the runtime to deal with.
    pub fn div(self, rhs: Self) -> Self {
        self.arith(
            rhs,
            |a, b| (b != 0).then(|| a.wrapping_div(b)),
            |a, b| a / b,
        )
    }

    pub fn rem(self, rhs: Self) -> Self {
        self.arith(
            rhs,
            |a, b| (b != 0).then(|| a.wrapping_rem(b)),
            |a, b| a % b,
        )
    }

    /// Integer base with a non-negative integer exponent stays integral; anything else is
    /// computed in floating point.
    pub fn pow(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Indeterminate, _) | (_, Indeterminate) => Indeterminate,
            (a, b) if !a.is_float() && !b.is_float() => match (a.to_i32(), b.to_i32()) {
                (Some(base), Some(exp)) if exp >= 0 => Int(base.wrapping_pow(exp as u32)),
                (Some(base), Some(exp)) => Float((base as f32).powi(exp)),
                _ => Indeterminate,
            },
            (a, b) => match (a.to_f32(), b.to_f32()) {
                (Some(base), Some(exp)) => Float(base.powf(exp)),
                _ => Indeterminate,
            },
        }
    }

    fn compare(
        self,
        rhs: Self,
        int: impl Fn(i32, i32) -> bool,
        float: impl Fn(f32, f32) -> bool,
    ) -> Self {
        if !self.is_known() || !rhs.is_known() {
            return Indeterminate;
        }
        if self.is_float() || rhs.is_float() {
            match (self.to_f32(), rhs.to_f32()) {
                (Some(a), Some(b)) => Bool(float(a, b)),
                _ => Indeterminate,
            }
        } else {
            match (self.to_i32(), rhs.to_i32()) {
                (Some(a), Some(b)) => Bool(int(a, b)),
                _ => Indeterminate,
            }
        }
    }

    pub fn equal(self, rhs: Self) -> Self {
        self.compare(rhs, |a, b| a == b, |a, b| a == b)
    }

    pub fn not_equal(self, rhs: Self) -> Self {
        self.compare(rhs, |a, b| a != b, |a, b| a != b)
    }

    pub fn greater(self, rhs: Self) -> Self {
        self.compare(rhs, |a, b| a > b, |a, b| a > b)
    }

    pub fn greater_eq(self, rhs: Self) -> Self {
        self.compare(rhs, |a, b| a >= b, |a, b| a >= b)
    }

    pub fn less(self, rhs: Self) -> Self {
        self.compare(rhs, |a, b| a < b, |a, b| a < b)
    }

    pub fn less_eq(self, rhs: Self) -> Self {
        self.compare(rhs, |a, b| a <= b, |a, b| a <= b)
    }

    fn bits(self, rhs: Self, f: impl Fn(i32, i32) -> i32) -> Self {
        if self.is_float() || rhs.is_float() {
            return Indeterminate;
        }
        match (self.to_i32(), rhs.to_i32()) {
            (Some(a), Some(b)) => Int(f(a, b)),
            _ => Indeterminate,
        }
    }

    pub fn bit_and(self, rhs: Self) -> Self {
        self.bits(rhs, |a, b| a & b)
    }

    pub fn bit_xor(self, rhs: Self) -> Self {
        self.bits(rhs, |a, b| a ^ b)
    }

    pub fn bit_or(self, rhs: Self) -> Self {
        self.bits(rhs, |a, b| a | b)
    }

    fn logic(self, rhs: Self, f: impl Fn(bool, bool) -> bool) -> Self {
        match (self.to_bool(), rhs.to_bool()) {
            (Some(a), Some(b)) => Bool(f(a, b)),
            _ => Indeterminate,
        }
    }

    pub fn bool_and(self, rhs: Self) -> Self {
        self.logic(rhs, |a, b| a && b)
    }

    pub fn bool_xor(self, rhs: Self) -> Self {
        self.logic(rhs, |a, b| a != b)
    }

    pub fn bool_or(self, rhs: Self) -> Self {
        self.logic(rhs, |a, b| a || b)
    }

    /// Apply a one-argument float function, keeping the result only when it is finite.
    pub fn map_float(self, f: impl Fn(f32) -> f32) -> Self {
        match self.to_f32().map(f) {
            Some(r) if r.is_finite() => Float(r),
            _ => Indeterminate,
        }
    }
}

impl Display for CompileTimeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Int(i) => write!(f, "{i}"),
            Float(x) => write!(f, "{x:?}"),
            Bool(b) => write!(f, "{b}"),
            Indeterminate => write!(f, "<runtime>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_arithmetic_promotes() {
        assert_eq!(Int(1).add(Float(0.5)), Float(1.5));
        assert_eq!(Int(7).div(Int(2)), Int(3));
        assert_eq!(Int(7).div(Float(2.0)), Float(3.5));
        assert_eq!(Bool(true).add(Int(1)), Int(2));
    }

    #[test]
    fn unfoldable_arithmetic() {
        assert_eq!(Int(1).div(Int(0)), Indeterminate);
        assert_eq!(Int(1).rem(Int(0)), Indeterminate);
        assert_eq!(Int(1).add(Indeterminate), Indeterminate);
        assert_eq!(Float(0.0).map_float(f32::ln), Indeterminate);
        assert_eq!(Float(1.5).bit_and(Int(1)), Indeterminate);
    }

    #[test]
    fn wrapping_and_pow() {
        assert_eq!(Int(i32::MAX).add(Int(1)), Int(i32::MIN));
        assert_eq!(Int(2).pow(Int(10)), Int(1024));
        assert_eq!(Int(2).pow(Int(-1)), Float(0.5));
        assert_eq!(Float(2.0).pow(Int(3)), Float(8.0));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(Int(1).equal(Float(1.0)), Bool(true));
        assert_eq!(Int(3).less(Int(2)), Bool(false));
        assert_eq!(Int(2).bool_and(Float(0.0)), Bool(false));
        assert_eq!(Int(0).bool_xor(Int(5)), Bool(true));
        assert_eq!(Int(0).bool_not(), Bool(true));
        assert_eq!(Int(5).bit_not(), Int(-6));
    }
}
