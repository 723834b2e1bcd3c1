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

//! The section syntax: `[Statedef N]`, `[State N, label]`, `[Command]` and `[Defaults]`
//! headers, each followed by `key = value` lines. `;` starts a comment.

use cns_bytecode::{
    BlockItem, ControllerKind, MoveType, ParamKind, Physics, StateBlock, StateType,
};
use tracing::debug;

use crate::assemble::Entry;
use crate::errors::{CompileError, SourceError};
use crate::lower::StateHeader;
use crate::session::CompileSession;
use crate::source::strip_comment;

/// A `[header]` and the lines under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Section {
    pub(crate) header: String,
    pub(crate) line: usize,
    pub(crate) entries: Vec<Entry>,
}

/// The state currently being filled by `[State]` sections.
struct OpenState {
    header: StateHeader,
    block: StateBlock,
}

impl CompileSession<'_> {
    /// Split a file into sections. Lines before the first header are ignored.
    pub(crate) fn sections(&mut self, text: &str) -> Result<Vec<Section>, CompileError> {
        let mut sections: Vec<Section> = vec![];
        for (index, raw) in text.lines().enumerate() {
            self.line = index + 1;
            let line = strip_comment(raw, ';').trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let header = rest
                    .split_once(']')
                    .map(|(h, _)| h)
                    .ok_or_else(|| CompileError::Missing("]".to_string()))?;
                sections.push(Section {
                    header: header.trim().to_string(),
                    line: self.line,
                    entries: vec![],
                });
                continue;
            }
            let Some(section) = sections.last_mut() else {
                continue;
            };
            match line.split_once('=') {
                Some((key, value)) => section.entries.push(Entry::new(key, value, self.line)),
                None => self.lenient(CompileError::Missing("=".to_string()), ())?,
            }
        }
        Ok(sections)
    }

    pub(crate) fn compile_classic(&mut self, text: &str) -> Result<(), SourceError> {
        let sections = self.sections(text).map_err(|e| self.source_error(e))?;
        let mut open: Option<OpenState> = None;
        let mut skipping = false;
        for section in &sections {
            self.line = section.line;
            let lowered = section.header.to_ascii_lowercase();
            let result = if let Some(rest) = lowered.strip_prefix("statedef") {
                if let Some(done) = open.take() {
                    self.finish_classic_state(done);
                }
                self.open_statedef(rest, section).map(|state| {
                    skipping = state.is_none();
                    open = state;
                })
            } else if lowered.starts_with("state ") || lowered == "state" {
                match open.as_mut() {
                    Some(state) => self
                        .assemble_controller(&section.entries)
                        .map(|block| state.block.items.push(BlockItem::Block(block))),
                    None if skipping => Ok(()),
                    None => Err(CompileError::InvalidSection(section.header.clone())),
                }
            } else if lowered == "command" {
                self.command_section(&section.entries)
            } else if lowered == "defaults" {
                self.command_defaults(&section.entries)
            } else {
                debug!(section = %section.header, file = %self.file, "skipping section");
                Ok(())
            };
            result.map_err(|e| self.source_error(e))?;
        }
        if let Some(done) = open {
            self.finish_classic_state(done);
        }
        Ok(())
    }

    /// Start a state, or `None` if the number is already taken.
    fn open_statedef(
        &mut self,
        number_text: &str,
        section: &Section,
    ) -> Result<Option<OpenState>, CompileError> {
        let number_text = number_text.split(',').next().unwrap_or_default().trim();
        let number: i32 = number_text
            .parse()
            .map_err(|_| CompileError::InvalidSection(section.header.clone()))?;
        if self.states.contains_key(&number) {
            debug!(state = number, file = %self.file, "state already defined; skipping");
            return Ok(None);
        }
        self.begin_state(number);
        let header = self.statedef(number, &section.entries)?;
        Ok(Some(OpenState {
            header,
            block: StateBlock::sequential(),
        }))
    }

    fn finish_classic_state(&mut self, state: OpenState) {
        let compiled = self.state_bytecode(state.header, state.block);
        self.insert_state(compiled);
    }

    /// The statedef properties: type letters, then everything else as `StateDef` parameters.
    pub(crate) fn statedef(
        &mut self,
        number: i32,
        entries: &[Entry],
    ) -> Result<StateHeader, CompileError> {
        let mut header = StateHeader::new(number);
        let mut rest = vec![];
        for entry in entries {
            self.line = entry.line;
            match entry.key.as_str() {
                "type" => {
                    if let Some(t) = self
                        .type_letter(ParamKind::StateType, &entry.value)?
                        .and_then(StateType::from_letter)
                    {
                        header.state_type = t;
                    }
                }
                "movetype" => {
                    if let Some(t) = self
                        .type_letter(ParamKind::MoveType, &entry.value)?
                        .and_then(MoveType::from_letter)
                    {
                        header.move_type = t;
                    }
                }
                "physics" => {
                    if let Some(p) = self
                        .type_letter(ParamKind::Physics, &entry.value)?
                        .and_then(Physics::from_letter)
                    {
                        header.physics = p;
                    }
                }
                _ => rest.push(entry.clone()),
            }
        }
        header.statedef = self.controller(ControllerKind::StateDef, &rest, false)?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{CompilationContext, CompileOptions};
    use cns_bytecode::{Constants, StringPool};
    use pretty_assertions::assert_eq;
    use unindent::unindent;

    #[test]
    fn sections_and_entries() {
        let constants = Constants::new();
        let mut strings = StringPool::new();
        let mut session = CompileSession::new(
            CompileOptions::default(),
            CompilationContext::new("kfm", &constants, &mut strings),
        );
        let text = unindent(
            r#"
            ; leading comment
            [Statedef 200]
            type = S ; standing

            [State 200, Hit]
            Type = HitDef
            attr = S, NA
            "#,
        );
        let sections = session.sections(&text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header, "Statedef 200");
        assert_eq!(sections[0].entries, vec![Entry::new("type", "S", 3)]);
        assert_eq!(sections[1].line, 5);
        assert_eq!(sections[1].entries[0].key, "type");
        assert_eq!(sections[1].entries[1], Entry::new("attr", "S, NA", 7));
    }
}
