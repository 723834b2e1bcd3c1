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

use std::f32::consts;

use cns_bytecode::{BytecodeExp, CompileTimeValue, OpCode};

use crate::errors::CompileError;
use crate::lexer::{is_number, is_operator, parse_number};
use crate::redirect::redirect_op;
use crate::session::CompileSession;
use crate::var_scope::DeclType;

/// A compiled argument: its value if known, otherwise the code computing it.
pub(crate) type Arg = (CompileTimeValue, BytecodeExp);

pub(crate) fn emit_arg(out: &mut BytecodeExp, (value, code): &Arg) {
    out.append_exp(code);
    out.append_value(*value);
}

fn math_op(name: &str) -> Option<OpCode> {
    Some(match name {
        "abs" => OpCode::Abs,
        "acos" => OpCode::Acos,
        "asin" => OpCode::Asin,
        "atan" => OpCode::Atan,
        "ceil" => OpCode::Ceil,
        "cos" => OpCode::Cos,
        "exp" => OpCode::Exp,
        "floor" => OpCode::Floor,
        "ln" => OpCode::Ln,
        "log" => OpCode::Log,
        "sin" => OpCode::Sin,
        "tan" => OpCode::Tan,
        "min" => OpCode::Min,
        "max" => OpCode::Max,
        _ => return None,
    })
}

/// Evaluate a math builtin over known arguments. Results the runtime would treat as errors
/// (non-finite floats) are left to the runtime.
fn fold_math(op: OpCode, args: &[CompileTimeValue]) -> CompileTimeValue {
    use CompileTimeValue::*;
    let a = args[0];
    match op {
        OpCode::Abs => match a {
            Float(f) => Float(f.abs()),
            v => v.to_i32().map_or(Indeterminate, |i| Int(i.wrapping_abs())),
        },
        OpCode::Ceil | OpCode::Floor => match a {
            Float(f) => {
                let r = if op == OpCode::Ceil { f.ceil() } else { f.floor() };
                if r.is_finite() { Int(r as i32) } else { Indeterminate }
            }
            v => v.to_i32().map_or(Indeterminate, Int),
        },
        OpCode::Acos => a.map_float(f32::acos),
        OpCode::Asin => a.map_float(f32::asin),
        OpCode::Atan => a.map_float(f32::atan),
        OpCode::Cos => a.map_float(f32::cos),
        OpCode::Exp => a.map_float(f32::exp),
        OpCode::Ln => a.map_float(f32::ln),
        OpCode::Sin => a.map_float(f32::sin),
        OpCode::Tan => a.map_float(f32::tan),
        OpCode::Log => match (a.to_f32(), args[1].to_f32()) {
            (Some(base), Some(v)) => Float(v.ln() / base.ln()).map_float(|f| f),
            _ => Indeterminate,
        },
        OpCode::Min | OpCode::Max => {
            let b = args[1];
            let pick_a = if op == OpCode::Min {
                a.less_eq(b).to_bool()
            } else {
                a.greater_eq(b).to_bool()
            };
            match pick_a {
                None => Indeterminate,
                Some(pick_a) if a.is_float() || b.is_float() => {
                    let v = if pick_a { a } else { b };
                    v.to_f32().map_or(Indeterminate, Float)
                }
                Some(pick_a) => {
                    let v = if pick_a { a } else { b };
                    v.to_i32().map_or(Indeterminate, Int)
                }
            }
        }
        _ => Indeterminate,
    }
}

impl CompileSession<'_> {
    /// Compile one operand: a literal, a parenthesized expression, a unary operation, a
    /// variable, a function or a trigger. Inside a redirection (`rd`) only plain operands are
    /// allowed; anything that would need its own precedence level must be written outside it.
    pub(crate) fn exp_value(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        rd: bool,
    ) -> Result<CompileTimeValue, CompileError> {
        let token = self.token.clone();
        if token.is_empty() {
            return Err(CompileError::MissingValue);
        }
        if is_number(&token) {
            let value = parse_number(&token, false).ok_or(CompileError::InvalidNumber(token))?;
            self.advance(input);
            return Ok(value);
        }
        if rd && (matches!(token.as_str(), "(" | "-" | "!" | "~") || redirect_op(&token).is_some())
        {
            return Err(CompileError::InRedirection(token));
        }
        match token.as_str() {
            "(" => {
                self.advance(input);
                let value = self.expr(out, input)?;
                self.expect(")", input)?;
                Ok(value)
            }
            "-" => self.negation(out, input),
            "!" => self.unary(out, input, OpCode::BlNot),
            "~" => self.unary(out, input, OpCode::BitNot),
            ")" | "]" | "," | ";" | "{" | "}" | "#" | "\"" => Err(CompileError::Unexpected(token)),
            t if is_operator(t) => Err(CompileError::ContiguousOperator(token)),
            _ => self.identifier(out, input, &token),
        }
    }

    fn negation(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        self.advance(input);
        if is_number(&self.token) {
            let value = parse_number(&self.token, true)
                .ok_or_else(|| CompileError::InvalidNumber(format!("-{}", self.token)))?;
            self.advance(input);
            return Ok(value);
        }
        let mut code = BytecodeExp::new();
        let value = self.exp_value(&mut code, input, false)?;
        if value.is_known() {
            return Ok(value.neg());
        }
        out.append_exp(&code);
        out.append_op(OpCode::Neg);
        Ok(CompileTimeValue::Indeterminate)
    }

    fn unary(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        op: OpCode,
    ) -> Result<CompileTimeValue, CompileError> {
        self.advance(input);
        let mut code = BytecodeExp::new();
        let value = self.exp_value(&mut code, input, false)?;
        let folded = match op {
            OpCode::BlNot => value.bool_not(),
            _ => value.bit_not(),
        };
        if folded.is_known() {
            return Ok(folded);
        }
        out.append_exp(&code);
        out.append_value(value);
        out.append_op(op);
        Ok(CompileTimeValue::Indeterminate)
    }

    fn identifier(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        name: &str,
    ) -> Result<CompileTimeValue, CompileError> {
        if let Some(local) = name.strip_prefix('$') {
            return self.local(out, input, local);
        }
        if let Some(op) = redirect_op(name) {
            return self.redirect(out, input, op, name);
        }
        if let Some(op) = math_op(name) {
            return self.math(out, input, op, name);
        }
        match name {
            "pi" => {
                self.advance(input);
                Ok(CompileTimeValue::Float(consts::PI))
            }
            "e" => {
                self.advance(input);
                Ok(CompileTimeValue::Float(consts::E))
            }
            "ifelse" => self.if_else(out, input),
            "cond" => self.cond(out, input),
            "var" => self.variable(out, input, name, OpCode::Var, OpCode::SetVar),
            "fvar" => self.variable(out, input, name, OpCode::FVar, OpCode::SetFVar),
            "sysvar" => self.variable(out, input, name, OpCode::SysVar, OpCode::SetSysVar),
            "sysfvar" => self.variable(out, input, name, OpCode::SysFVar, OpCode::SetSysFVar),
            _ => self.trigger(out, input, name),
        }
    }

    /// `$name` reads a local; `$name := value` assigns it, declaring it on first assignment.
    fn local(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        name: &str,
    ) -> Result<CompileTimeValue, CompileError> {
        if name.is_empty() {
            return Err(CompileError::InvalidData("$".to_string()));
        }
        self.advance(input);
        if self.token == ":=" {
            self.advance(input);
            let (_, code) = self.value_exp(input)?;
            let slot = self.scope.declare_or_use(name, DeclType::Assign)?;
            out.append_exp(&code);
            out.append_op_u8(OpCode::SetLocal, slot);
        } else {
            let slot = self
                .scope
                .find(name)
                .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))?;
            out.append_op_u8(OpCode::Local, slot);
        }
        Ok(CompileTimeValue::Indeterminate)
    }

    /// With `(` current: comma separated arguments up to the matching `)`, which is consumed.
    /// Known arguments come back with empty code.
    pub(crate) fn paren_args(&mut self, input: &mut &str) -> Result<Vec<Arg>, CompileError> {
        let mut args = vec![];
        loop {
            self.advance(input);
            let mut code = BytecodeExp::new();
            let value = self.expr(&mut code, input)?;
            args.push((value, code));
            match self.token.as_str() {
                "," => continue,
                ")" => break,
                _ => return Err(CompileError::Missing(")".to_string())),
            }
        }
        self.advance(input);
        Ok(args)
    }

    /// With the function name current: exactly `count` arguments in parentheses.
    pub(crate) fn call_args(
        &mut self,
        input: &mut &str,
        name: &str,
        count: usize,
    ) -> Result<Vec<Arg>, CompileError> {
        self.advance(input);
        if self.token != "(" {
            return Err(CompileError::Missing("(".to_string()));
        }
        let args = self.paren_args(input)?;
        if args.len() != count {
            return Err(CompileError::ArgumentCount {
                name: name.to_string(),
                expected: count,
                got: args.len(),
            });
        }
        Ok(args)
    }

    fn math(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        op: OpCode,
        name: &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let arity = if matches!(op, OpCode::Log | OpCode::Min | OpCode::Max) {
            2
        } else {
            1
        };
        let args = self.call_args(input, name, arity)?;
        if args.iter().all(|(v, _)| v.is_known()) {
            let values: Vec<_> = args.iter().map(|(v, _)| *v).collect();
            let folded = fold_math(op, &values);
            if folded.is_known() {
                return Ok(folded);
            }
        }
        for arg in &args {
            emit_arg(out, arg);
        }
        out.append_op(op);
        Ok(CompileTimeValue::Indeterminate)
    }

    /// `ifelse(c, a, b)` evaluates all three operands.
    fn if_else(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let args = self.call_args(input, "ifelse", 3)?;
        if let (Some(c), true, true) =
            (args[0].0.to_bool(), args[1].0.is_known(), args[2].0.is_known())
        {
            return Ok(if c { args[1].0 } else { args[2].0 });
        }
        for arg in &args {
            emit_arg(out, arg);
        }
        out.append_op(OpCode::IfElse);
        Ok(CompileTimeValue::Indeterminate)
    }

    /// `cond(c, a, b)` evaluates only the chosen operand.
    fn cond(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let args = self.call_args(input, "cond", 3)?;
        if let Some(c) = args[0].0.to_bool() {
            let (value, code) = &args[if c { 1 } else { 2 }];
            out.append_exp(code);
            return Ok(*value);
        }
        let mut then = BytecodeExp::new();
        emit_arg(&mut then, &args[1]);
        let mut otherwise = BytecodeExp::new();
        emit_arg(&mut otherwise, &args[2]);
        emit_arg(out, &args[0]);
        out.append_branch(&then, &otherwise);
        Ok(CompileTimeValue::Indeterminate)
    }

    /// `var(n)`, or `var(n) := value`.
    fn variable(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        name: &str,
        read: OpCode,
        write: OpCode,
    ) -> Result<CompileTimeValue, CompileError> {
        let args = self.call_args(input, name, 1)?;
        emit_arg(out, &args[0]);
        if self.token == ":=" {
            self.advance(input);
            let (_, code) = self.value_exp(input)?;
            out.append_exp(&code);
            out.append_op(write);
        } else {
            out.append_op(read);
        }
        Ok(CompileTimeValue::Indeterminate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CompileTimeValue::*;

    #[test]
    fn math_folding() {
        assert_eq!(fold_math(OpCode::Abs, &[Int(-3)]), Int(3));
        assert_eq!(fold_math(OpCode::Floor, &[Float(2.7)]), Int(2));
        assert_eq!(fold_math(OpCode::Ceil, &[Float(2.1)]), Int(3));
        assert_eq!(fold_math(OpCode::Min, &[Int(2), Int(5)]), Int(2));
        assert_eq!(fold_math(OpCode::Max, &[Int(2), Float(5.0)]), Float(5.0));
        assert_eq!(fold_math(OpCode::Ln, &[Int(0)]), Indeterminate);
        assert_eq!(fold_math(OpCode::Acos, &[Int(2)]), Indeterminate);
    }
}
