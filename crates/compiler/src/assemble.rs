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

//! Turning one controller's `key = value` lines into a guarded controller.

use std::collections::BTreeMap;

use cns_bytecode::{
    BlockItem, BlockKind, BytecodeExp, CompileTimeValue, ControllerKind, Jump, MoveType,
    OpCode, ParamKind, ParamSpec, Persistence, Physics, StateBlock, StateController, StateType,
};
use tracing::debug;

use crate::errors::CompileError;
use crate::flags::{assert_flag, keyword, parse_attr, parse_hit_flags};
use crate::session::CompileSession;

/// One `key = value` (or `key: value`) line of a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    /// Lowercased, trimmed.
    pub(crate) key: String,
    /// Trimmed, case preserved.
    pub(crate) value: String,
    pub(crate) line: usize,
}

impl Entry {
    pub(crate) fn new(key: &str, value: &str, line: usize) -> Self {
        Self {
            key: key.trim().to_ascii_lowercase(),
            value: value.trim().to_string(),
            line,
        }
    }
}

/// `triggerN` gives `Some(N)`.
fn trigger_index(key: &str) -> Option<u32> {
    key.strip_prefix("trigger")
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .and_then(|n| n.parse().ok())
        .filter(|n| *n > 0)
}

/// The parameter name and index of a `var(N)` style key.
fn var_key(key: &str) -> Option<(&'static str, &str)> {
    let (name, rest) = key.split_once('(')?;
    let index = rest.strip_suffix(')')?.trim();
    let param = match name.trim() {
        "var" => "v",
        "fvar" => "fv",
        "sysvar" => "sysvar",
        "sysfvar" => "sysfvar",
        _ => return None,
    };
    Some((param, index))
}

/// A constant-false guard.
fn never() -> BytecodeExp {
    let mut guard = BytecodeExp::new();
    guard.append_bool(false);
    guard
}

/// Join materialized fragments with `&&`.
fn and_chain(parts: Vec<BytecodeExp>) -> BytecodeExp {
    let mut parts = parts.into_iter();
    let mut chain = parts.next().unwrap_or_default();
    for part in parts {
        chain.append_short_circuit(Jump::IfZero, &part);
    }
    chain
}

/// The `&&` of one trigger group's lines so far.
enum Group {
    Live(Vec<BytecodeExp>),
    /// Every line folded to true.
    Always,
    /// A line folded to false.
    Dead,
}

impl CompileSession<'_> {
    /// Compile one line's value as a complete expression.
    pub(crate) fn entry_expr(
        &mut self,
        entry: &Entry,
    ) -> Result<(CompileTimeValue, BytecodeExp), CompileError> {
        self.line = entry.line;
        let mut input = entry.value.as_str();
        self.advance(&mut input);
        let value = self.value_exp(&mut input)?;
        self.expect_end()?;
        Ok(value)
    }

    fn entry_constant(&mut self, entry: &Entry, what: &'static str) -> Result<i32, CompileError> {
        let (value, _) = self.entry_expr(entry)?;
        value.to_i32().ok_or(CompileError::NotConstant(what))
    }

    /// A classic `[State]` section: triggers, attributes and parameters, assembled into an
    /// `if` block around the controller.
    pub(crate) fn assemble_controller(
        &mut self,
        entries: &[Entry],
    ) -> Result<StateBlock, CompileError> {
        let type_entry = entries
            .iter()
            .find(|e| e.key == "type")
            .ok_or(CompileError::MissingType)?;
        self.line = type_entry.line;
        let kind = ControllerKind::from_type_name(&type_entry.value)
            .ok_or_else(|| CompileError::UnknownController(type_entry.value.clone()))?;
        if !entries.iter().any(|e| e.key == "trigger1") {
            return Err(CompileError::MissingTrigger1);
        }

        let mut block = StateBlock::new(BlockKind::If);
        let mut all = vec![];
        for entry in entries.iter().filter(|e| e.key == "triggerall") {
            let (value, code) = self.entry_expr(entry)?;
            match value.to_bool() {
                Some(true) => {}
                Some(false) => {
                    debug!(state = ?self.state_no, line = entry.line, "controller disabled by triggerall");
                    block.guard = never();
                    block.items.push(BlockItem::Controller(StateController::inert(kind)));
                    return Ok(block);
                }
                None => all.push(code),
            }
        }

        let Some(any) = self.trigger_groups(entries)? else {
            block.guard = never();
            block.items.push(BlockItem::Controller(StateController::inert(kind)));
            return Ok(block);
        };
        block.guard = match (all.is_empty(), any.is_empty()) {
            (true, _) => any,
            (false, true) => and_chain(all),
            (false, false) => {
                let mut guard = and_chain(all);
                guard.append_short_circuit(Jump::IfZero, &any);
                guard
            }
        };

        let mut rest = vec![];
        for entry in entries {
            match entry.key.as_str() {
                "persistent" => {
                    let count = self.entry_constant(entry, "persistent")?;
                    if count != 1 {
                        block.persistent = Some(self.persistence(count));
                    }
                }
                "type" | "triggerall" => {}
                key if trigger_index(key).is_some() => {}
                _ => rest.push(entry.clone()),
            }
        }
        let controller = self.controller(kind, &rest, false)?;
        block.items.push(BlockItem::Controller(controller));
        Ok(block)
    }

    /// OR of the trigger groups, stopping at the first missing index. `None` if no group can
    /// ever be true; empty code if one always is.
    fn trigger_groups(&mut self, entries: &[Entry]) -> Result<Option<BytecodeExp>, CompileError> {
        let mut groups: BTreeMap<u32, Vec<&Entry>> = BTreeMap::new();
        for entry in entries {
            if let Some(n) = trigger_index(&entry.key) {
                groups.entry(n).or_default().push(entry);
            }
        }
        let mut any: Option<BytecodeExp> = None;
        for (expected, (n, lines)) in (1..).zip(&groups) {
            if *n != expected {
                debug!(state = ?self.state_no, trigger = n, "trigger groups stop at first gap");
                break;
            }
            match self.trigger_group(lines)? {
                Group::Dead => {}
                Group::Always => {
                    return Ok(Some(match any {
                        None => BytecodeExp::new(),
                        Some(mut chain) => {
                            let mut tail = BytecodeExp::new();
                            tail.append_bool(true);
                            chain.append_short_circuit(Jump::IfNonZero, &tail);
                            chain
                        }
                    }));
                }
                Group::Live(parts) => {
                    let group = and_chain(parts);
                    any = Some(match any {
                        None => group,
                        Some(mut chain) => {
                            chain.append_short_circuit(Jump::IfNonZero, &group);
                            chain
                        }
                    });
                }
            }
        }
        Ok(any)
    }

    fn trigger_group(&mut self, lines: &[&Entry]) -> Result<Group, CompileError> {
        let mut parts = vec![];
        for entry in lines {
            let (value, code) = self.entry_expr(entry)?;
            match value.to_bool() {
                Some(true) => {}
                Some(false) => return Ok(Group::Dead),
                None => parts.push(code),
            }
        }
        Ok(if parts.is_empty() {
            Group::Always
        } else {
            Group::Live(parts)
        })
    }

    /// Allocate a persistence counter for a block that runs every `count` activations.
    pub(crate) fn persistence(&mut self, count: i32) -> Persistence {
        self.persistent.push(count);
        Persistence {
            count,
            slot: self.persistent.len() as i32 - 1,
        }
    }

    /// Compile parameter lines into a controller of `kind`. Entries are tokenized from their
    /// own text, so the current token of an enclosing statement is left as it was.
    pub(crate) fn controller(
        &mut self,
        kind: ControllerKind,
        entries: &[Entry],
        ignore_hit_pause: bool,
    ) -> Result<StateController, CompileError> {
        let token = std::mem::take(&mut self.token);
        let controller = self.controller_params(kind, entries, ignore_hit_pause);
        self.token = token;
        controller
    }

    fn controller_params(
        &mut self,
        kind: ControllerKind,
        entries: &[Entry],
        ignore_hit_pause: bool,
    ) -> Result<StateController, CompileError> {
        let mut ignore_hit_pause = ignore_hit_pause;
        let mut params: BTreeMap<u8, Vec<BytecodeExp>> = BTreeMap::new();
        for entry in entries {
            self.line = entry.line;
            if entry.key == "ignorehitpause" {
                ignore_hit_pause = self.entry_constant(entry, "ignorehitpause")? != 0;
                continue;
            }
            if kind.takes_var_keys()
                && let Some((name, index)) = var_key(&entry.key)
            {
                let Some((id, _)) = kind.param(name) else {
                    continue;
                };
                let index_entry = Entry::new(name, index, entry.line);
                let (_, index_code) = self.entry_expr(&index_entry)?;
                let (_, value_code) = self.entry_expr(entry)?;
                let value_id = kind.param("value").map(|(id, _)| id).unwrap_or(id);
                if params.contains_key(&id) || params.contains_key(&value_id) {
                    self.lenient(
                        CompileError::Duplicate {
                            what: "parameter",
                            name: entry.key.clone(),
                        },
                        (),
                    )?;
                    continue;
                }
                params.insert(id, vec![index_code]);
                params.insert(value_id, vec![value_code]);
                continue;
            }
            let Some((id, spec)) = kind.param(&entry.key) else {
                self.lenient(
                    CompileError::UnknownParameter {
                        controller: kind.to_string(),
                        name: entry.key.clone(),
                    },
                    (),
                )?;
                continue;
            };
            if params.contains_key(&id) {
                self.lenient(
                    CompileError::Duplicate {
                        what: "parameter",
                        name: entry.key.clone(),
                    },
                    (),
                )?;
                continue;
            }
            if let Some(values) = self.param_value(spec, &entry.value)? {
                params.insert(id, values);
            }
        }
        StateController::build(kind, params, ignore_hit_pause).map_err(|name| {
            CompileError::MissingParameter {
                controller: kind.to_string(),
                name,
            }
        })
    }

    /// Compile a parameter's value text. `None` when an invalid legacy value was dropped.
    pub(crate) fn param_value(
        &mut self,
        spec: &ParamSpec,
        text: &str,
    ) -> Result<Option<Vec<BytecodeExp>>, CompileError> {
        let literal = |value: i32| {
            let mut code = BytecodeExp::new();
            code.append_int(value);
            Some(vec![code])
        };
        match spec.kind {
            ParamKind::Exprs { .. } => self.expr_list(spec, text, vec![]).map(Some),
            ParamKind::Resource { .. } => {
                let mut chars = text.chars();
                let prefix = match (chars.next(), chars.next()) {
                    (Some('f' | 'F'), Some(c)) if c.is_ascii_digit() || c == ' ' => 1,
                    (Some('s' | 'S'), Some(c)) if c.is_ascii_digit() || c == ' ' => 2,
                    _ => 0,
                };
                let rest = if prefix == 0 { text } else { &text[1..] };
                let mut head = BytecodeExp::new();
                head.append_int(prefix);
                self.expr_list(spec, rest, vec![head]).map(Some)
            }
            ParamKind::Text => {
                let quoted = text
                    .strip_prefix('"')
                    .and_then(|t| t.strip_suffix('"'));
                let body = match quoted {
                    Some(body) => body,
                    None => self.lenient(CompileError::Missing("\"".to_string()), text)?,
                };
                let id = self.ctx.strings.intern(body);
                let mut code = BytecodeExp::new();
                code.append_op_i32(OpCode::Str, id);
                Ok(Some(vec![code]))
            }
            ParamKind::HitFlags | ParamKind::Attr => {
                let (mask, what) = match spec.kind {
                    ParamKind::Attr => (parse_attr(text), "hit attribute"),
                    _ => (parse_hit_flags(text), "hit flags"),
                };
                if let Some(invalid) = mask.invalid {
                    self.lenient(CompileError::InvalidLiteral { what, value: invalid }, ())?;
                }
                Ok(literal(mask.value))
            }
            ParamKind::StateType | ParamKind::MoveType | ParamKind::Physics => {
                let Some(letter) = self.type_letter(spec.kind, text)? else {
                    return Ok(None);
                };
                Ok(literal(letter as i32))
            }
            ParamKind::AssertFlags => {
                let mut mask = 0;
                for flag in text.split(',').map(str::trim) {
                    match assert_flag(flag) {
                        Some(bit) => mask |= 1 << bit,
                        None => self.lenient(
                            CompileError::InvalidLiteral {
                                what: "assert flag",
                                value: flag.to_string(),
                            },
                            (),
                        )?,
                    }
                }
                Ok(literal(mask))
            }
            ParamKind::Keyword(words) => match keyword(words, text, self.strict) {
                Some(index) => Ok(literal(index as i32)),
                None => self.lenient(
                    CompileError::InvalidLiteral {
                        what: "keyword",
                        value: text.to_string(),
                    },
                    None,
                ),
            },
        }
    }

    /// A state, move or physics type letter, upper-cased. Lenient mode reads the first
    /// letter of a longer word.
    pub(crate) fn type_letter(
        &mut self,
        kind: ParamKind,
        text: &str,
    ) -> Result<Option<char>, CompileError> {
        let text = text.trim();
        let mut chars = text.chars();
        let first = chars.next().map(|c| c.to_ascii_uppercase());
        let valid = first.filter(|c| match kind {
            ParamKind::StateType => StateType::from_letter(*c).is_some(),
            ParamKind::MoveType => MoveType::from_letter(*c).is_some(),
            _ => Physics::from_letter(*c).is_some(),
        });
        match valid {
            Some(c) if chars.next().is_none() || !self.strict => Ok(Some(c)),
            _ => self.lenient(
                CompileError::InvalidLiteral {
                    what: "type letter",
                    value: text.to_string(),
                },
                None,
            ),
        }
    }

    /// Comma separated expressions, after any `head` values, checked against the arity of
    /// `spec`.
    fn expr_list(
        &mut self,
        spec: &ParamSpec,
        text: &str,
        head: Vec<BytecodeExp>,
    ) -> Result<Vec<BytecodeExp>, CompileError> {
        let mut values = head;
        let skip = values.len();
        let mut input = text;
        self.advance(&mut input);
        loop {
            let (_, code) = self.value_exp(&mut input)?;
            values.push(code);
            if self.token != "," {
                break;
            }
            self.advance(&mut input);
        }
        self.expect_end()?;
        let (min, max) = spec.arity();
        let got = values.len() - skip;
        if got < min as usize || got > max as usize {
            return Err(CompileError::ParameterArity {
                name: spec.name.to_string(),
                min,
                max,
                got,
            });
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("trigger1", Some(1))]
    #[test_case("trigger12", Some(12))]
    #[test_case("trigger0", None)]
    #[test_case("triggerall", None)]
    #[test_case("trigger", None)]
    fn trigger_keys(key: &str, expected: Option<u32>) {
        assert_eq!(trigger_index(key), expected);
    }

    #[test]
    fn var_keys() {
        assert_eq!(var_key("var(3)"), Some(("v", "3")));
        assert_eq!(var_key("sysfvar( 2 )"), Some(("sysfvar", "2")));
        assert_eq!(var_key("value"), None);
        assert_eq!(var_key("pos(1)"), None);
    }
}
