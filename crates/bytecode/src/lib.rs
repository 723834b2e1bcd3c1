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

//! The contract between the character script compiler and the runtime that executes its
//! output.

mod command;
mod constants;
mod controller;
mod exp;
mod opcode;
mod state;
mod strings;
mod value;

pub use command::{
    Button, Command, CommandElement, CommandList, CommandStep, DEFAULT_BUFFER_TIME,
    DEFAULT_COMMAND_TIME, Direction, Key,
};
pub use constants::{Constant, Constants};
pub use controller::{
    ASSERT_FLAGS, ControllerKind, ParamKind, ParamSpec, StateController,
};
pub use exp::{BytecodeExp, COMPACT_JUMP_LIMIT, DecodeError, Instruction, Jump, Operand};
pub use opcode::{ConstOp, Ex2Op, ExOp, Op, OpCode, OperandLayout};
pub use state::{
    BYTECODE_VERSION, BlockItem, BlockKind, CompiledCharacter, ForHeader, Function, MoveType,
    Persistence, Physics, StateBlock, StateBytecode, StateType,
};
pub use strings::StringPool;
pub use value::CompileTimeValue;
