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

//! Redirection: `helper(1000), stateno` evaluates `stateno` on another player.
//!
//! Emitted as the selector arguments, then the redirect opcode carrying the length of the
//! redirected region, then the region itself:
//!
//! ```text
//!   <args...> <redirect op> len  run len2 <operand> ...
//! ```
//!
//! Non-literal selector arguments are wrapped in `run` so that they evaluate on the original
//! player. The runtime skips the region (pushing a placeholder) when no player matches.

use cns_bytecode::{BytecodeExp, CompileTimeValue, OpCode};

use crate::errors::CompileError;
use crate::session::CompileSession;

pub(crate) fn redirect_op(name: &str) -> Option<OpCode> {
    Some(match name {
        "parent" => OpCode::Parent,
        "root" => OpCode::Root,
        "helper" => OpCode::Helper,
        "target" => OpCode::Target,
        "partner" => OpCode::Partner,
        "enemy" => OpCode::Enemy,
        "enemynear" => OpCode::EnemyNear,
        "playerid" => OpCode::PlayerId,
        "p2" => OpCode::P2,
        "stateowner" => OpCode::StateOwner,
        "helperindex" => OpCode::HelperIndex,
        _ => return None,
    })
}

/// Values pushed for selector arguments left out, by position.
fn default_args(op: OpCode) -> &'static [Option<i32>] {
    match op {
        OpCode::Partner | OpCode::Enemy | OpCode::EnemyNear => &[Some(0)],
        // Any id, first match.
        OpCode::Helper | OpCode::Target => &[Some(-1), Some(0)],
        OpCode::PlayerId | OpCode::HelperIndex => &[None],
        _ => &[],
    }
}

impl CompileSession<'_> {
    pub(crate) fn redirect(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        op: OpCode,
        name: &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let defaults = default_args(op);
        self.advance(input);
        let args = if self.token == "(" {
            self.paren_args(input)?
        } else {
            vec![]
        };
        let required = defaults.iter().filter(|d| d.is_none()).count();
        if args.len() < required || args.len() > defaults.len() {
            return Err(CompileError::ArgumentCount {
                name: name.to_string(),
                expected: defaults.len(),
                got: args.len(),
            });
        }
        self.expect(",", input)?;

        let mut inner = BytecodeExp::new();
        let value = self.exp_value(&mut inner, input, true)?;
        inner.append_value(value);
        let mut region = BytecodeExp::new();
        region.append_run(&inner);

        for (value, code) in &args {
            if value.is_known() {
                out.append_value(*value);
            } else {
                out.append_run(code);
            }
        }
        for default in defaults.iter().skip(args.len()).flatten() {
            out.append_int(*default);
        }
        out.append_region(op, &region);
        Ok(CompileTimeValue::Indeterminate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_selector_argument() {
        for name in [
            "parent", "root", "helper", "target", "partner", "enemy", "enemynear", "playerid",
            "p2", "stateowner", "helperindex",
        ] {
            let op = redirect_op(name).unwrap();
            assert_eq!(Some(default_args(op).len() as u8), op.redirect_args(), "{name}");
        }
    }
}
