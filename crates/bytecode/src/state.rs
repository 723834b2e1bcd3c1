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

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::command::CommandList;
use crate::controller::StateController;
use crate::exp::BytecodeExp;

/// Bumped whenever the layout of compiled output changes incompatibly.
pub const BYTECODE_VERSION: u16 = 1;

macro_rules! letter_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $letter:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn from_letter(c: char) -> Option<Self> {
                match c.to_ascii_uppercase() {
                    $($letter => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn letter(self) -> char {
                match self {
                    $($name::$variant => $letter,)*
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.letter())
            }
        }
    };
}

letter_enum!(
    /// Posture of a character.
    StateType {
        Standing = 'S',
        Crouching = 'C',
        Air = 'A',
        Lying = 'L',
        Unchanged = 'U',
    }
);

letter_enum!(MoveType {
    Idle = 'I',
    Attack = 'A',
    Hit = 'H',
    Unchanged = 'U',
});

letter_enum!(Physics {
    Stand = 'S',
    Crouch = 'C',
    Air = 'A',
    None = 'N',
    Unchanged = 'U',
});

/// A persistent block runs once and then waits `count` activations before running again. The
/// runtime keeps the countdown in the state's persistent counter `slot`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Persistence {
    pub count: i32,
    pub slot: i32,
}

/// Header of a counted `for` loop. The counter lives in local `counter`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForHeader {
    pub counter: u8,
    pub init: BytecodeExp,
    pub end: BytecodeExp,
    pub step: BytecodeExp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum BlockKind {
    Sequential,
    If,
    While,
    /// `None` loops until a `break`.
    For(Option<ForHeader>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum BlockItem {
    Controller(StateController),
    Block(StateBlock),
    /// An expression evaluated for its side effects, its value discarded.
    Exec(BytecodeExp),
    Call {
        func: i32,
        name: String,
        args: Vec<BytecodeExp>,
        /// Destination slot of each return value; `None` discards it.
        returns: Vec<Option<u8>>,
    },
    Break,
    Continue,
}

/// A node of a state's statement tree.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateBlock {
    pub kind: BlockKind,
    /// Empty means unconditional.
    pub guard: BytecodeExp,
    pub items: Vec<BlockItem>,
    pub else_block: Option<Box<StateBlock>>,
    pub persistent: Option<Persistence>,
    pub ignore_hit_pause: bool,
    pub nested_in_loop: bool,
}

impl StateBlock {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            guard: BytecodeExp::new(),
            items: vec![],
            else_block: None,
            persistent: None,
            ignore_hit_pause: false,
            nested_in_loop: false,
        }
    }

    pub fn sequential() -> Self {
        Self::new(BlockKind::Sequential)
    }

    /// Every controller in the tree, in the pre-order the lowered code numbers them.
    pub fn controllers(&self) -> Vec<&StateController> {
        let mut out = vec![];
        self.collect_controllers(&mut out);
        out
    }

    fn collect_controllers<'a>(&'a self, out: &mut Vec<&'a StateController>) {
        for item in &self.items {
            match item {
                BlockItem::Controller(c) => out.push(c),
                BlockItem::Block(b) => b.collect_controllers(out),
                _ => {}
            }
        }
        if let Some(otherwise) = &self.else_block {
            otherwise.collect_controllers(out);
        }
    }
}

impl Default for StateBlock {
    fn default() -> Self {
        Self::sequential()
    }
}

/// Everything the runtime needs to run one state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateBytecode {
    pub number: i32,
    pub state_type: StateType,
    pub move_type: MoveType,
    pub physics: Physics,
    /// The remaining `[Statedef]` properties, applied on state entry.
    pub statedef: StateController,
    pub block: StateBlock,
    /// `block`, flattened.
    pub code: BytecodeExp,
    pub num_locals: u16,
    /// Activation count of every persistent block, indexed by counter slot.
    pub persistent: Vec<i32>,
}

/// A user function of the modern syntax.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Function {
    pub name: String,
    pub num_args: u8,
    pub num_rets: u8,
    pub num_locals: u16,
    pub block: StateBlock,
    pub code: BytecodeExp,
}

/// The output of one session: everything compiled for one character.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompiledCharacter {
    pub version: u16,
    pub states: BTreeMap<i32, StateBytecode>,
    /// Indexed by the function ids used in `call` instructions.
    pub functions: Vec<Function>,
    pub commands: CommandList,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerKind;

    #[test]
    fn letters() {
        assert_eq!(StateType::from_letter('c'), Some(StateType::Crouching));
        assert_eq!(MoveType::from_letter('H'), Some(MoveType::Hit));
        assert_eq!(Physics::from_letter('N'), Some(Physics::None));
        assert_eq!(StateType::from_letter('x'), None);
        assert_eq!(Physics::Air.to_string(), "A");
    }

    #[test]
    fn controllers_in_pre_order() {
        let mut inner = StateBlock::new(BlockKind::If);
        inner
            .items
            .push(BlockItem::Controller(StateController::inert(ControllerKind::Turn)));
        let mut otherwise = StateBlock::sequential();
        otherwise
            .items
            .push(BlockItem::Controller(StateController::inert(ControllerKind::Gravity)));
        inner.else_block = Some(Box::new(otherwise));

        let mut root = StateBlock::sequential();
        root.items
            .push(BlockItem::Controller(StateController::inert(ControllerKind::Null)));
        root.items.push(BlockItem::Block(inner));
        root.items
            .push(BlockItem::Controller(StateController::inert(ControllerKind::PosAdd)));

        let kinds: Vec<_> = root.controllers().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ControllerKind::Null,
                ControllerKind::Turn,
                ControllerKind::Gravity,
                ControllerKind::PosAdd
            ]
        );
    }
}
