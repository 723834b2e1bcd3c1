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

//! Binary operator levels, loosest first:
//!
//! `||` `^^` `&&` `|` `^` `&` `=`/`!=` (and ranges) `<`/`<=`/`>`/`>=` `+`/`-` `*`/`/`/`%` `**`
//!
//! Every level is entered with the first token of its left operand current and returns with
//! the first token it did not consume current. When both operands of an operator are known at
//! compile time the result is folded and nothing is emitted.

use cns_bytecode::{BytecodeExp, CompileTimeValue, Jump, OpCode};

use crate::errors::CompileError;
use crate::lexer::next_token;
use crate::session::CompileSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    BitAnd,
    BitXor,
    BitOr,
    BlXor,
}

impl BinOp {
    pub(crate) fn opcode(self) -> OpCode {
        match self {
            BinOp::Add => OpCode::Add,
            BinOp::Sub => OpCode::Sub,
            BinOp::Mul => OpCode::Mul,
            BinOp::Div => OpCode::Div,
            BinOp::Mod => OpCode::Mod,
            BinOp::Pow => OpCode::Pow,
            BinOp::Eq => OpCode::Eq,
            BinOp::Ne => OpCode::Ne,
            BinOp::Gt => OpCode::Gt,
            BinOp::Ge => OpCode::Ge,
            BinOp::Lt => OpCode::Lt,
            BinOp::Le => OpCode::Le,
            BinOp::BitAnd => OpCode::BitAnd,
            BinOp::BitXor => OpCode::BitXor,
            BinOp::BitOr => OpCode::BitOr,
            BinOp::BlXor => OpCode::BlXor,
        }
    }

    pub(crate) fn fold(self, a: CompileTimeValue, b: CompileTimeValue) -> CompileTimeValue {
        match self {
            BinOp::Add => a.add(b),
            BinOp::Sub => a.sub(b),
            BinOp::Mul => a.mul(b),
            BinOp::Div => a.div(b),
            BinOp::Mod => a.rem(b),
            BinOp::Pow => a.pow(b),
            BinOp::Eq => a.equal(b),
            BinOp::Ne => a.not_equal(b),
            BinOp::Gt => a.greater(b),
            BinOp::Ge => a.greater_eq(b),
            BinOp::Lt => a.less(b),
            BinOp::Le => a.less_eq(b),
            BinOp::BitAnd => a.bit_and(b),
            BinOp::BitXor => a.bit_xor(b),
            BinOp::BitOr => a.bit_or(b),
            BinOp::BlXor => a.bool_xor(b),
        }
    }

    /// The comparison a token names, if any.
    pub(crate) fn comparison(token: &str) -> Option<Self> {
        Some(match token {
            "=" => BinOp::Eq,
            "!=" => BinOp::Ne,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            _ => return None,
        })
    }
}

/// Fold `lhs op rhs`, or emit it. `out` must already hold the code of `lhs` when `lhs` is not
/// known; `rhs_code` holds the code of `rhs` when it is not known.
pub(crate) fn fold_or_emit(
    out: &mut BytecodeExp,
    lhs: CompileTimeValue,
    rhs_code: &BytecodeExp,
    rhs: CompileTimeValue,
    op: BinOp,
) -> CompileTimeValue {
    let folded = op.fold(lhs, rhs);
    if folded.is_known() {
        return folded;
    }
    out.append_value(lhs);
    out.append_exp(rhs_code);
    out.append_value(rhs);
    out.append_op(op.opcode());
    CompileTimeValue::Indeterminate
}

type Level<S> =
    fn(&mut S, &mut BytecodeExp, &mut &str) -> Result<CompileTimeValue, CompileError>;

impl CompileSession<'_> {
    /// Read the first token of an expression, then compile all of it.
    pub(crate) fn full_expr(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.advance(input);
        self.expr(out, input)
    }

    /// Compile an expression whose first token is current.
    pub(crate) fn expr(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.expr_bool_or(out, input)
    }

    /// Compile an expression and materialize its value, so the returned code always leaves
    /// exactly one value behind.
    pub(crate) fn value_exp(
        &mut self,
        input: &mut &str,
    ) -> Result<(CompileTimeValue, BytecodeExp), CompileError> {
        let mut code = BytecodeExp::new();
        let value = self.expr(&mut code, input)?;
        code.append_value(value);
        Ok((value, code))
    }

    fn expr_bool_or(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.short_circuit(out, input, "||", Jump::IfNonZero, Self::expr_bool_xor)
    }

    fn expr_bool_xor(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.binary(out, input, &[("^^", BinOp::BlXor)], Self::expr_bool_and)
    }

    fn expr_bool_and(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.short_circuit(out, input, "&&", Jump::IfZero, Self::expr_bit_or)
    }

    fn expr_bit_or(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.binary(out, input, &[("|", BinOp::BitOr)], Self::expr_bit_xor)
    }

    fn expr_bit_xor(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.binary(out, input, &[("^", BinOp::BitXor)], Self::expr_bit_and)
    }

    fn expr_bit_and(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.binary(out, input, &[("&", BinOp::BitAnd)], Self::expr_equality)
    }

    fn expr_equality(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let mut code = BytecodeExp::new();
        let mut lhs = self.expr_relational(&mut code, input)?;
        loop {
            let negate = match self.token.as_str() {
                "=" => false,
                "!=" => true,
                _ => break,
            };
            self.advance(input);
            if self.token == "[" || (self.token == "(" && range_follows(input)) {
                lhs = self.range(&mut code, lhs, input, negate)?;
                continue;
            }
            let mut rhs_code = BytecodeExp::new();
            let rhs = self.expr_relational(&mut rhs_code, input)?;
            let op = if negate { BinOp::Ne } else { BinOp::Eq };
            lhs = fold_or_emit(&mut code, lhs, &rhs_code, rhs, op);
        }
        out.append_exp(&code);
        Ok(lhs)
    }

    /// `v = [lo, hi]`, `v != (lo, hi]` and so on; square brackets are inclusive. The current
    /// token is the opening bracket, and `code` holds `v` if it is not known.
    fn range(
        &mut self,
        code: &mut BytecodeExp,
        value: CompileTimeValue,
        input: &mut &str,
        negate: bool,
    ) -> Result<CompileTimeValue, CompileError> {
        let low_inclusive = self.token == "[";
        let mut low_code = BytecodeExp::new();
        let low = self.full_expr(&mut low_code, input)?;
        self.expect(",", input)?;
        let mut high_code = BytecodeExp::new();
        let high = self.expr(&mut high_code, input)?;
        let high_inclusive = match self.token.as_str() {
            "]" => true,
            ")" => false,
            _ => return Err(CompileError::Missing("]".to_string())),
        };
        self.advance(input);

        let (low_op, high_op) = (
            if low_inclusive { BinOp::Ge } else { BinOp::Gt },
            if high_inclusive { BinOp::Le } else { BinOp::Lt },
        );
        let within = low_op
            .fold(value, low)
            .bool_and(high_op.fold(value, high));
        let folded = if negate { within.bool_not() } else { within };
        if folded.is_known() {
            return Ok(folded);
        }

        code.append_value(value);
        code.append_op(OpCode::Dup);
        code.append_exp(&low_code);
        code.append_value(low);
        code.append_op(low_op.opcode());
        code.append_op(OpCode::Swap);
        code.append_exp(&high_code);
        code.append_value(high);
        code.append_op(high_op.opcode());
        code.append_op(OpCode::BlAnd);
        if negate {
            code.append_op(OpCode::BlNot);
        }
        Ok(CompileTimeValue::Indeterminate)
    }

    pub(crate) fn expr_relational(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.binary(
            out,
            input,
            &[
                (">", BinOp::Gt),
                (">=", BinOp::Ge),
                ("<", BinOp::Lt),
                ("<=", BinOp::Le),
            ],
            Self::expr_additive,
        )
    }

    pub(crate) fn expr_additive(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.binary(
            out,
            input,
            &[("+", BinOp::Add), ("-", BinOp::Sub)],
            Self::expr_multiplicative,
        )
    }

    fn expr_multiplicative(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.binary(
            out,
            input,
            &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)],
            Self::expr_power,
        )
    }

    /// `**` groups to the right: `2 ** 3 ** 2` is `2 ** 9`.
    fn expr_power(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let mut code = BytecodeExp::new();
        let base = self.exp_value(&mut code, input, false)?;
        if self.token != "**" {
            out.append_exp(&code);
            return Ok(base);
        }
        self.advance(input);
        let mut rhs_code = BytecodeExp::new();
        let exponent = self.expr_power(&mut rhs_code, input)?;
        let value = fold_or_emit(&mut code, base, &rhs_code, exponent, BinOp::Pow);
        out.append_exp(&code);
        Ok(value)
    }

    fn binary(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        ops: &[(&str, BinOp)],
        next: Level<Self>,
    ) -> Result<CompileTimeValue, CompileError> {
        let mut code = BytecodeExp::new();
        let mut lhs = next(self, &mut code, input)?;
        while let Some(&(_, op)) = ops.iter().find(|(t, _)| *t == self.token) {
            self.advance(input);
            let mut rhs_code = BytecodeExp::new();
            let rhs = next(self, &mut rhs_code, input)?;
            lhs = fold_or_emit(&mut code, lhs, &rhs_code, rhs, op);
        }
        out.append_exp(&code);
        Ok(lhs)
    }

    /// `&&` and `||`: the right operand only runs when the left one does not decide the
    /// result. `jump` is taken when it does.
    fn short_circuit(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        token: &str,
        jump: Jump,
        next: Level<Self>,
    ) -> Result<CompileTimeValue, CompileError> {
        let mut code = BytecodeExp::new();
        let mut lhs = next(self, &mut code, input)?;
        while self.token == token {
            self.advance(input);
            let mut rhs_code = BytecodeExp::new();
            let rhs = next(self, &mut rhs_code, input)?;
            let decided_by_lhs = lhs
                .to_bool()
                .map(|b| if jump == Jump::IfZero { !b } else { b });
            lhs = match decided_by_lhs {
                Some(true) => CompileTimeValue::Bool(jump == Jump::IfNonZero),
                Some(false) => match rhs.to_bool() {
                    Some(b) => CompileTimeValue::Bool(b),
                    None => {
                        code = rhs_code;
                        CompileTimeValue::Indeterminate
                    }
                },
                None => {
                    rhs_code.append_value(rhs);
                    code.append_short_circuit(jump, &rhs_code);
                    CompileTimeValue::Indeterminate
                }
            };
        }
        out.append_exp(&code);
        Ok(lhs)
    }
}

/// With the cursor just past a `(` that follows `=` or `!=`: whether a comma appears at the
/// top level before the matching `)`, which makes the parenthesis an exclusive range.
fn range_follows(input: &str) -> bool {
    let mut look = input;
    let mut depth = 0usize;
    loop {
        match next_token(&mut look).as_str() {
            "" => return false,
            "(" | "[" => depth += 1,
            ")" | "]" if depth == 0 => return false,
            ")" | "]" => depth -= 1,
            "," if depth == 0 => return true,
            "\"" => {
                if crate::lexer::read_string(&mut look).is_none() {
                    return false;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_detected_by_top_level_comma() {
        assert!(range_follows("0, 10)"));
        assert!(!range_follows("1 + 2) * 3"));
        assert!(!range_follows("ifelse(a, b, c))"));
        assert!(range_follows("min(a, b), 3)"));
    }

    #[test]
    fn folding_emits_nothing() {
        let mut out = BytecodeExp::new();
        let v = fold_or_emit(
            &mut out,
            CompileTimeValue::Int(2),
            &BytecodeExp::new(),
            CompileTimeValue::Int(3),
            BinOp::Mul,
        );
        assert_eq!(v, CompileTimeValue::Int(6));
        assert!(out.is_empty());
    }

    #[test]
    fn unfoldable_literals_are_materialized() {
        let mut out = BytecodeExp::new();
        let v = fold_or_emit(
            &mut out,
            CompileTimeValue::Int(1),
            &BytecodeExp::new(),
            CompileTimeValue::Int(0),
            BinOp::Div,
        );
        assert_eq!(v, CompileTimeValue::Indeterminate);
        let mut expected = BytecodeExp::new();
        expected.append_int(1);
        expected.append_int(0);
        expected.append_op(OpCode::Div);
        assert_eq!(out, expected);
    }
}
