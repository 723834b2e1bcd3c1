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

//! Input commands: named sequences of directions and buttons the runtime matches against the
//! player's input buffer.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

pub const DEFAULT_COMMAND_TIME: i32 = 15;
pub const DEFAULT_BUFFER_TIME: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
pub enum Direction {
    B,
    DB,
    D,
    DF,
    F,
    UF,
    U,
    UB,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum Button {
    A,
    B,
    C,
    X,
    Y,
    Z,
    S,
    D,
    W,
    M,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Key {
    Direction(Direction),
    Button(Button),
}

/// One key of a step together with its modifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CommandElement {
    pub key: Key,
    /// `~`: the key must be released, after being held for at least `charge` ticks.
    pub release: bool,
    pub charge: i32,
    /// `/`: the key must be held down.
    pub hold: bool,
    /// `$`: any direction containing this one matches.
    pub four_way: bool,
}

/// Keys that must be satisfied on the same tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CommandStep {
    pub keys: Vec<CommandElement>,
    /// `>`: no other input may occur between the previous step and this one.
    pub strict: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Command {
    pub name: String,
    pub steps: Vec<CommandStep>,
    pub time: i32,
    pub buffer_time: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandList {
    pub default_time: i32,
    pub default_buffer_time: i32,
    pub commands: Vec<Command>,
}

impl Default for CommandList {
    fn default() -> Self {
        Self {
            default_time: DEFAULT_COMMAND_TIME,
            default_buffer_time: DEFAULT_BUFFER_TIME,
            commands: vec![],
        }
    }
}

impl CommandList {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Several commands may share one name; any of them matching asserts the name.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.iter().any(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(move |c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn key_names_are_case_sensitive() {
        assert_eq!(Direction::from_str("DF"), Ok(Direction::DF));
        assert!(Direction::from_str("df").is_err());
        assert_eq!(Button::from_str("x"), Ok(Button::X));
        assert!(Button::from_str("X").is_err());
    }

    #[test]
    fn shared_names() {
        let mut list = CommandList::default();
        for _ in 0..2 {
            list.commands.push(Command {
                name: "QCF_x".into(),
                steps: vec![],
                time: 15,
                buffer_time: 1,
            });
        }
        assert!(list.contains("QCF_x"));
        assert!(!list.contains("qcf_x"));
        assert_eq!(list.get("QCF_x").count(), 2);
    }
}
