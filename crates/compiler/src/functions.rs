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

use std::collections::HashMap;

use cns_bytecode::{BytecodeExp, Function, StateBlock};
use tracing::debug;

use crate::errors::{CompileError, SourceError};
use crate::lexer::{read_raw_until, skip_braces};
use crate::session::CompileSession;
use crate::source::{SourceCursor, strip_block_comments};
use crate::var_scope::DISCARD;

/// `function name(args)[rets]`, before the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Signature {
    pub(crate) name: String,
    pub(crate) args: Vec<String>,
    pub(crate) rets: Vec<String>,
}

impl Signature {
    pub(crate) fn num_args(&self) -> u8 {
        self.args.len() as u8
    }

    pub(crate) fn num_rets(&self) -> u8 {
        self.rets.len() as u8
    }
}

/// Every function known to a session, by id. Ids are handed out at declaration so that a
/// call can be compiled before the body of its callee.
#[derive(Debug, Default)]
pub(crate) struct FunctionTable {
    sigs: Vec<Signature>,
    by_name: HashMap<String, usize>,
    bodies: Vec<Option<Function>>,
}

impl FunctionTable {
    pub(crate) fn declare(&mut self, sig: Signature) -> Result<i32, CompileError> {
        if self.by_name.contains_key(&sig.name) {
            return Err(CompileError::Duplicate {
                what: "function",
                name: sig.name,
            });
        }
        let id = self.sigs.len();
        self.by_name.insert(sig.name.clone(), id);
        self.sigs.push(sig);
        self.bodies.push(None);
        Ok(id as i32)
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<(i32, &Signature)> {
        let id = *self.by_name.get(name)?;
        Some((id as i32, &self.sigs[id]))
    }

    /// Attach the compiled body of a declared function.
    pub(crate) fn define(&mut self, id: i32, function: Function) -> Result<(), CompileError> {
        let slot = &mut self.bodies[id as usize];
        if slot.is_some() {
            return Err(CompileError::Duplicate {
                what: "function",
                name: function.name,
            });
        }
        *slot = Some(function);
        Ok(())
    }

    /// Bodies in id order. A function whose file failed to compile before its body was
    /// reached is left as an empty body of the declared shape.
    pub(crate) fn into_functions(self) -> Vec<Function> {
        self.sigs
            .into_iter()
            .zip(self.bodies)
            .map(|(sig, body)| {
                body.unwrap_or_else(|| Function {
                    num_args: sig.num_args(),
                    num_rets: sig.num_rets(),
                    num_locals: (sig.args.len() + sig.rets.len()) as u16,
                    name: sig.name,
                    block: StateBlock::sequential(),
                    code: BytecodeExp::new(),
                })
            })
            .collect()
    }
}

impl CompileSession<'_> {
    /// With `function` current: read the signature, leaving the token after it current.
    pub(crate) fn signature(&mut self, input: &mut &str) -> Result<Signature, CompileError> {
        self.advance(input);
        let name = std::mem::take(&mut self.token);
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(CompileError::InvalidData(format!("function name '{name}'")));
        }
        self.advance(input);
        let args = self.name_list(input, "(", ")")?;
        let rets = if self.token == "[" {
            self.name_list(input, "[", "]")?
        } else {
            vec![]
        };
        Ok(Signature { name, args, rets })
    }

    /// `open a, b, c close`, with `open` current. Names may carry the `$` of local variables.
    fn name_list(
        &mut self,
        input: &mut &str,
        open: &str,
        close: &str,
    ) -> Result<Vec<String>, CompileError> {
        self.expect(open, input)?;
        let mut names = vec![];
        if self.token == close {
            self.advance(input);
            return Ok(names);
        }
        loop {
            let name = self.token.trim_start_matches('$').to_string();
            if name.is_empty() || name == DISCARD {
                return Err(CompileError::InvalidData(format!("parameter name '{}'", self.token)));
            }
            if names.contains(&name) {
                return Err(CompileError::Duplicate {
                    what: "parameter",
                    name,
                });
            }
            if names.len() == u8::MAX as usize {
                let what = if open == "(" { "arguments" } else { "return values" };
                return Err(CompileError::ListLimit {
                    what,
                    max: u8::MAX as usize,
                });
            }
            names.push(name);
            self.advance(input);
            match self.token.as_str() {
                "," => self.advance(input),
                t if t == close => break,
                _ => return Err(CompileError::Missing(close.to_string())),
            }
        }
        self.advance(input);
        Ok(names)
    }

    /// Register the signature of every function of a block syntax file, skipping bodies.
    /// Anything malformed is left for the full compilation to report.
    pub(crate) fn declare_functions(&mut self, text: &str) -> Result<(), SourceError> {
        let text = strip_block_comments(text);
        let cursor = SourceCursor::new(&text);
        let mut input = text.as_str();
        loop {
            self.advance(&mut input);
            match self.token.as_str() {
                "" => return Ok(()),
                "function" => {
                    self.line = cursor.line_at(input);
                    let Ok(sig) = self.signature(&mut input) else {
                        return Ok(());
                    };
                    debug!(function = %sig.name, file = %self.file, "declared");
                    self.functions
                        .declare(sig)
                        .map_err(|e| self.source_error(e))?;
                }
                "[" => {
                    read_raw_until(&mut input, &[']']);
                    self.advance(&mut input);
                }
                _ => return Ok(()),
            }
            if self.token != "{" || !skip_braces(&mut input) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, args: usize, rets: usize) -> Signature {
        Signature {
            name: name.to_string(),
            args: (0..args).map(|i| format!("a{i}")).collect(),
            rets: (0..rets).map(|i| format!("r{i}")).collect(),
        }
    }

    #[test]
    fn ids_follow_declaration_order() {
        let mut table = FunctionTable::default();
        assert_eq!(table.declare(sig("f", 1, 0)), Ok(0));
        assert_eq!(table.declare(sig("g", 2, 2)), Ok(1));
        let (id, g) = table.lookup("g").unwrap();
        assert_eq!((id, g.num_args(), g.num_rets()), (1, 2, 2));
        assert!(table.lookup("h").is_none());
        assert_eq!(
            table.declare(sig("f", 0, 0)),
            Err(CompileError::Duplicate {
                what: "function",
                name: "f".to_string()
            })
        );
    }

    #[test]
    fn undefined_bodies_keep_their_shape() {
        let mut table = FunctionTable::default();
        table.declare(sig("f", 2, 1)).unwrap();
        let functions = table.into_functions();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].num_locals, 3);
        assert!(functions[0].code.is_empty());
    }
}
