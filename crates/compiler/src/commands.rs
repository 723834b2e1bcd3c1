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

use std::str::FromStr;

use cns_bytecode::{Button, Command, CommandElement, CommandStep, Direction, Key};

use crate::assemble::Entry;
use crate::errors::CompileError;
use crate::lexer::{is_number, next_token_cs};
use crate::session::CompileSession;

fn parse_key(token: &str) -> Option<Key> {
    if let Ok(direction) = Direction::from_str(token) {
        return Some(Key::Direction(direction));
    }
    Button::from_str(token).ok().map(Key::Button)
}

/// Modifiers read so far for the next key.
#[derive(Default)]
struct Pending {
    release: bool,
    charge: i32,
    hold: bool,
}

impl CompileSession<'_> {
    /// `[Defaults]`: session-wide command timing.
    pub(crate) fn command_defaults(&mut self, entries: &[Entry]) -> Result<(), CompileError> {
        for entry in entries {
            match entry.key.as_str() {
                "command.time" => self.commands.default_time = self.command_int(entry)?,
                "command.buffer.time" => {
                    self.commands.default_buffer_time = self.command_int(entry)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// `[Command]`: one named input sequence.
    pub(crate) fn command_section(&mut self, entries: &[Entry]) -> Result<(), CompileError> {
        let mut name = None;
        let mut steps = None;
        let mut time = self.commands.default_time;
        let mut buffer_time = self.commands.default_buffer_time;
        for entry in entries {
            self.line = entry.line;
            match entry.key.as_str() {
                "name" => name = Some(entry.value.trim_matches('"').to_string()),
                "command" => steps = Some(self.command_steps(&entry.value)?),
                "time" => time = self.command_int(entry)?,
                "buffer.time" => buffer_time = self.command_int(entry)?,
                _ => {}
            }
        }
        let name = name.ok_or_else(|| CompileError::Missing("name".to_string()))?;
        let steps = steps.ok_or_else(|| CompileError::Missing("command".to_string()))?;
        self.commands.commands.push(Command {
            name,
            steps,
            time,
            buffer_time,
        });
        Ok(())
    }

    fn command_int(&mut self, entry: &Entry) -> Result<i32, CompileError> {
        let (value, _) = self.entry_expr(entry)?;
        value.to_i32().ok_or(CompileError::NotConstant("command time"))
    }

    /// `~30$B, $F, x+y`: comma separated steps of `+` joined keys. `~` (with an optional
    /// charge time) waits for a release, `/` for a hold, `$` accepts any direction containing
    /// the given one and `>` forbids other input before the step.
    pub(crate) fn command_steps(&mut self, text: &str) -> Result<Vec<CommandStep>, CompileError> {
        let mut input = text;
        let mut steps = vec![];
        let mut step = CommandStep::default();
        let mut pending = Pending::default();
        loop {
            let token = next_token_cs(&mut input);
            match token {
                "" | "," => {
                    if step.keys.is_empty() {
                        return Err(CompileError::Missing("command key".to_string()));
                    }
                    steps.push(std::mem::take(&mut step));
                    if token.is_empty() {
                        break;
                    }
                }
                "+" => {}
                "~" => {
                    pending.release = true;
                    let mut look = input;
                    let charge = next_token_cs(&mut look);
                    if is_number(charge) {
                        pending.charge = match charge.parse() {
                            Ok(time) => time,
                            Err(_) => self.lenient(
                                CompileError::InvalidLiteral {
                                    what: "charge time",
                                    value: charge.to_string(),
                                },
                                0,
                            )?,
                        };
                        input = look;
                    }
                }
                "/" => pending.hold = true,
                ">" => step.strict = true,
                _ => {
                    let (four_way, name) = match token.strip_prefix('$') {
                        Some(name) => (true, name),
                        None => (false, token),
                    };
                    let Some(key) = parse_key(name) else {
                        self.lenient(
                            CompileError::InvalidLiteral {
                                what: "command key",
                                value: token.to_string(),
                            },
                            (),
                        )?;
                        pending = Pending::default();
                        continue;
                    };
                    let p = std::mem::take(&mut pending);
                    step.keys.push(CommandElement {
                        key,
                        release: p.release,
                        charge: p.charge,
                        hold: p.hold,
                        four_way,
                    });
                }
            }
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompilationContext, CompileOptions};
    use cns_bytecode::{Constants, StringPool};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("~30$B", Some(30); "integer")]
    #[test_case("~30.5$B", None; "decimal")]
    #[test_case("~99999999999$B", None; "out of range")]
    fn charge_times(text: &str, expected: Option<i32>) {
        let constants = Constants::new();
        let mut strings = StringPool::new();
        let mut session = CompileSession::new(
            CompileOptions::default(),
            CompilationContext::new("kfm", &constants, &mut strings),
        );
        let steps = session.command_steps(text).unwrap();
        assert_eq!(steps[0].keys[0].charge, expected.unwrap_or(0));
        assert_eq!(session.warnings().len(), usize::from(expected.is_none()));

        session.strict = true;
        let strict = session.command_steps(text);
        match expected {
            Some(_) => assert!(strict.is_ok()),
            None => assert_eq!(
                strict.unwrap_err(),
                CompileError::InvalidLiteral {
                    what: "charge time",
                    value: text[1..text.len() - 2].to_string(),
                }
            ),
        }
    }
}
