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
use thiserror::Error;

use crate::opcode::{ConstOp, Ex2Op, ExOp, Op, OpCode, OperandLayout};
use crate::value::CompileTimeValue;

/// Largest skip that still fits the single byte jump forms.
pub const COMPACT_JUMP_LIMIT: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {byte} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },
    #[error("unknown {tier} sub-opcode {byte} at offset {offset}")]
    UnknownSubOpcode {
        offset: usize,
        tier: OpCode,
        byte: u8,
    },
    #[error("truncated instruction at offset {offset}")]
    Truncated { offset: usize },
    #[error("jump at offset {offset} leaves the expression")]
    JumpOutOfRange { offset: usize },
    #[error("stack underflow at offset {offset}")]
    Underflow { offset: usize },
    #[error("stack depth mismatch at offset {offset}: {expected} vs {found}")]
    StackMismatch {
        offset: usize,
        expected: i32,
        found: i32,
    },
    #[error("unreachable instruction at offset {offset}")]
    Unreachable { offset: usize },
}

/// The kind of a forward jump. Conditional jumps test the top of the stack without popping it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Jump {
    Always,
    IfZero,
    IfNonZero,
}

impl Jump {
    fn opcode(self, compact: bool) -> OpCode {
        match (self, compact) {
            (Jump::Always, true) => OpCode::Jmp8,
            (Jump::Always, false) => OpCode::Jmp,
            (Jump::IfZero, true) => OpCode::Jz8,
            (Jump::IfZero, false) => OpCode::Jz,
            (Jump::IfNonZero, true) => OpCode::Jnz8,
            (Jump::IfNonZero, false) => OpCode::Jnz,
        }
    }

    /// Encoded size of a jump skipping `skip` bytes.
    pub fn encoded_len(skip: usize) -> usize {
        if skip <= COMPACT_JUMP_LIMIT { 2 } else { 5 }
    }
}

/// Decoded operand of one instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    None,
    I8(i8),
    U8(u8),
    I32(i32),
    F32(f32),
    SlotLen(u8, i32),
    CounterLen(i32, i32),
    Call { func: i32, args: u8, rets: u8 },
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::I8(v) => write!(f, " {v}"),
            Operand::U8(v) => write!(f, " {v}"),
            Operand::I32(v) => write!(f, " {v}"),
            Operand::F32(v) => write!(f, " {v:?}"),
            Operand::SlotLen(slot, len) => write!(f, " ${slot} {len}"),
            Operand::CounterLen(slot, len) => write!(f, " #{slot} {len}"),
            Operand::Call { func, args, rets } => write!(f, " {func} ({args} -> {rets})"),
        }
    }
}

/// One decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instruction {
    pub offset: usize,
    pub len: usize,
    pub op: Op,
    pub operand: Operand,
}

impl Instruction {
    pub fn next_offset(&self) -> usize {
        self.offset + self.len
    }

    /// Destination of a jump instruction.
    pub fn jump_target(&self) -> Option<usize> {
        let Op::Base(op) = self.op else {
            return None;
        };
        if !op.is_jump() {
            return None;
        }
        match self.operand {
            Operand::U8(skip) => Some(self.next_offset() + skip as usize),
            Operand::I32(skip) => Some(self.next_offset() + skip.max(0) as usize),
            _ => None,
        }
    }

    pub fn stack_effect(&self) -> (u8, u8) {
        match (self.op, self.operand) {
            (Op::Base(OpCode::Call), Operand::Call { args, rets, .. }) => (args, rets),
            (op, _) => op.stack_effect(),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>5}: {}{}", self.offset, self.op, self.operand)?;
        if let Some(target) = self.jump_target() {
            write!(f, " -> {target}")?;
        }
        Ok(())
    }
}

/// A compiled expression or statement: an append-only stream of opcodes and their operands.
/// Sub-expressions are combined by concatenation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BytecodeExp(Vec<u8>);

impl BytecodeExp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn append_op(&mut self, op: impl Into<Op>) {
        match op.into() {
            Op::Base(op) => self.0.push(op as u8),
            Op::Ex(op) => self.0.extend_from_slice(&[OpCode::Ex as u8, op as u8]),
            Op::Ex2(op) => self.0.extend_from_slice(&[OpCode::Ex2 as u8, op as u8]),
            Op::Const(op) => self.0.extend_from_slice(&[OpCode::Const as u8, op as u8]),
        }
    }

    pub fn append_op_u8(&mut self, op: OpCode, operand: u8) {
        self.0.push(op as u8);
        self.0.push(operand);
    }

    pub fn append_op_i32(&mut self, op: OpCode, operand: i32) {
        self.0.push(op as u8);
        self.0.extend_from_slice(&operand.to_le_bytes());
    }

    pub fn append_exp(&mut self, other: &BytecodeExp) {
        self.0.extend_from_slice(&other.0);
    }

    pub fn append_int(&mut self, value: i32) {
        match i8::try_from(value) {
            Ok(small) => self.append_op_u8(OpCode::Int8, small as u8),
            Err(_) => self.append_op_i32(OpCode::Int, value),
        }
    }

    pub fn append_float(&mut self, value: f32) {
        self.0.push(OpCode::Float as u8);
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    pub fn append_bool(&mut self, value: bool) {
        self.append_op_u8(OpCode::Bool, value as u8);
    }

    /// Materialize a folded value as a literal push. Emits nothing for an indeterminate value,
    /// whose code is already in the stream.
    pub fn append_value(&mut self, value: CompileTimeValue) {
        match value {
            CompileTimeValue::Int(i) => self.append_int(i),
            CompileTimeValue::Float(f) => self.append_float(f),
            CompileTimeValue::Bool(b) => self.append_bool(b),
            CompileTimeValue::Indeterminate => {}
        }
    }

    /// A forward jump over the next `skip` bytes, in the narrowest encoding that fits.
    pub fn append_jump(&mut self, kind: Jump, skip: usize) {
        if skip <= COMPACT_JUMP_LIMIT {
            self.append_op_u8(kind.opcode(true), skip as u8);
        } else {
            self.append_op_i32(kind.opcode(false), skip as i32);
        }
    }

    /// `op <len(region)>` followed by the region itself.
    pub fn append_region(&mut self, op: OpCode, region: &BytecodeExp) {
        self.append_op_i32(op, region.len() as i32);
        self.append_exp(region);
    }

    /// Run `inner` in an isolated context.
    pub fn append_run(&mut self, inner: &BytecodeExp) {
        self.append_region(OpCode::Run, inner);
    }

    /// Short-circuit tail with the left operand already on the stack: `j* ; pop ; rhs`.
    pub fn append_short_circuit(&mut self, kind: Jump, rhs: &BytecodeExp) {
        self.append_jump(kind, rhs.len() + 1);
        self.append_op(OpCode::Pop);
        self.append_exp(rhs);
    }

    /// Two-way branch with the condition already on the stack:
    /// `jz ; pop ; then ; jmp ; pop ; otherwise`.
    pub fn append_branch(&mut self, then: &BytecodeExp, otherwise: &BytecodeExp) {
        let mut tail = BytecodeExp::new();
        tail.append_op(OpCode::Pop);
        tail.append_exp(otherwise);

        let mut taken = BytecodeExp::new();
        taken.append_op(OpCode::Pop);
        taken.append_exp(then);
        taken.append_jump(Jump::Always, tail.len());

        self.append_jump(Jump::IfZero, taken.len());
        self.append_exp(&taken);
        self.append_exp(&tail);
    }

    pub fn append_call(&mut self, func: i32, args: u8, rets: u8) {
        self.append_op_i32(OpCode::Call, func);
        self.0.push(args);
        self.0.push(rets);
    }

    pub fn append_for(&mut self, slot: u8, body: &BytecodeExp) {
        self.0.push(OpCode::For as u8);
        self.0.push(slot);
        self.0.extend_from_slice(&(body.len() as i32).to_le_bytes());
        self.append_exp(body);
    }

    pub fn append_persist(&mut self, counter: i32, body: &BytecodeExp) {
        self.0.push(OpCode::Persist as u8);
        self.0.extend_from_slice(&counter.to_le_bytes());
        self.0.extend_from_slice(&(body.len() as i32).to_le_bytes());
        self.append_exp(body);
    }

    /// Decode the whole stream.
    pub fn instructions(&self) -> Result<Vec<Instruction>, DecodeError> {
        let mut out = vec![];
        let mut offset = 0;
        while offset < self.0.len() {
            let ins = self.decode_at(offset)?;
            offset = ins.next_offset();
            out.push(ins);
        }
        Ok(out)
    }

    fn decode_at(&self, offset: usize) -> Result<Instruction, DecodeError> {
        let bytes = &self.0;
        let byte = bytes[offset];
        let base = OpCode::from_repr(byte).ok_or(DecodeError::UnknownOpcode { offset, byte })?;
        let layout = base.operand_layout();
        let start = offset + 1;
        let operand_bytes = bytes
            .get(start..start + layout.width())
            .ok_or(DecodeError::Truncated { offset })?;
        let i32_at = |at: usize| {
            i32::from_le_bytes([
                operand_bytes[at],
                operand_bytes[at + 1],
                operand_bytes[at + 2],
                operand_bytes[at + 3],
            ])
        };
        let sub_op = |tier: OpCode| DecodeError::UnknownSubOpcode {
            offset,
            tier,
            byte: operand_bytes[0],
        };
        let (op, operand) = match layout {
            OperandLayout::None => (Op::Base(base), Operand::None),
            OperandLayout::I8 => (Op::Base(base), Operand::I8(operand_bytes[0] as i8)),
            OperandLayout::U8 => (Op::Base(base), Operand::U8(operand_bytes[0])),
            OperandLayout::I32 => (Op::Base(base), Operand::I32(i32_at(0))),
            OperandLayout::F32 => (
                Op::Base(base),
                Operand::F32(f32::from_bits(i32_at(0) as u32)),
            ),
            OperandLayout::U8I32 => (
                Op::Base(base),
                Operand::SlotLen(operand_bytes[0], i32_at(1)),
            ),
            OperandLayout::I32I32 => (
                Op::Base(base),
                Operand::CounterLen(i32_at(0), i32_at(4)),
            ),
            OperandLayout::Call => (
                Op::Base(base),
                Operand::Call {
                    func: i32_at(0),
                    args: operand_bytes[4],
                    rets: operand_bytes[5],
                },
            ),
            OperandLayout::SubOp => {
                let op = match base {
                    OpCode::Ex => Op::Ex(ExOp::from_repr(operand_bytes[0]).ok_or(sub_op(base))?),
                    OpCode::Ex2 => {
                        Op::Ex2(Ex2Op::from_repr(operand_bytes[0]).ok_or(sub_op(base))?)
                    }
                    _ => Op::Const(ConstOp::from_repr(operand_bytes[0]).ok_or(sub_op(base))?),
                };
                (op, Operand::None)
            }
        };
        Ok(Instruction {
            offset,
            len: 1 + layout.width(),
            op,
            operand,
        })
    }

    /// If this stream is nothing but a single literal push, the literal.
    pub fn constant(&self) -> Option<CompileTimeValue> {
        let instructions = self.instructions().ok()?;
        let [ins] = instructions.as_slice() else {
            return None;
        };
        match (ins.op, ins.operand) {
            (Op::Base(OpCode::Int8), Operand::I8(v)) => Some(CompileTimeValue::Int(v as i32)),
            (Op::Base(OpCode::Int), Operand::I32(v)) => Some(CompileTimeValue::Int(v)),
            (Op::Base(OpCode::Float), Operand::F32(v)) => Some(CompileTimeValue::Float(v)),
            (Op::Base(OpCode::Bool), Operand::U8(v)) => Some(CompileTimeValue::Bool(v != 0)),
            _ => None,
        }
    }

    /// Net stack effect of executing this stream: +1 for a value, 0 for a statement.
    ///
    /// All jumps are forward, so one pass suffices: the depth at every jump target is recorded
    /// and checked against the fall-through depth when the target is reached.
    pub fn stack_delta(&self) -> Result<i32, DecodeError> {
        let mut depth = Some(0i32);
        let mut targets: BTreeMap<usize, i32> = BTreeMap::new();
        for ins in self.instructions()? {
            merge_target(ins.offset, &mut depth, &mut targets)?;
            let Some(current) = depth else {
                return Err(DecodeError::Unreachable { offset: ins.offset });
            };
            let (pops, pushes) = ins.stack_effect();
            if current < pops as i32 {
                return Err(DecodeError::Underflow { offset: ins.offset });
            }
            let after = current - pops as i32 + pushes as i32;
            depth = Some(after);
            let Some(target) = ins.jump_target() else {
                continue;
            };
            if target > self.len() {
                return Err(DecodeError::JumpOutOfRange { offset: ins.offset });
            }
            if let Some(&existing) = targets.get(&target) {
                if existing != after {
                    return Err(DecodeError::StackMismatch {
                        offset: target,
                        expected: existing,
                        found: after,
                    });
                }
            }
            targets.insert(target, after);
            if matches!(ins.op, Op::Base(OpCode::Jmp | OpCode::Jmp8)) {
                depth = None;
            }
        }
        merge_target(self.len(), &mut depth, &mut targets)?;
        depth.ok_or(DecodeError::Unreachable { offset: self.len() })
    }
}

fn merge_target(
    offset: usize,
    depth: &mut Option<i32>,
    targets: &mut BTreeMap<usize, i32>,
) -> Result<(), DecodeError> {
    let Some(incoming) = targets.remove(&offset) else {
        return Ok(());
    };
    match *depth {
        None => *depth = Some(incoming),
        Some(found) if found != incoming => {
            return Err(DecodeError::StackMismatch {
                offset,
                expected: incoming,
                found,
            });
        }
        Some(_) => {}
    }
    Ok(())
}

impl From<Vec<u8>> for BytecodeExp {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Display for BytecodeExp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.instructions() {
            Ok(instructions) => {
                for ins in instructions {
                    writeln!(f, "{ins}")?;
                }
                Ok(())
            }
            Err(e) => writeln!(f, "<{e}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(v: i32) -> BytecodeExp {
        let mut e = BytecodeExp::new();
        e.append_int(v);
        e
    }

    #[test]
    fn int_literal_widths() {
        assert_eq!(lit(127).as_bytes(), &[OpCode::Int8 as u8, 127]);
        assert_eq!(lit(-128).len(), 2);
        assert_eq!(lit(128).len(), 5);
        assert_eq!(lit(128).constant(), Some(CompileTimeValue::Int(128)));
        assert_eq!(lit(-3).constant(), Some(CompileTimeValue::Int(-3)));
    }

    #[test]
    fn indeterminate_emits_nothing() {
        let mut e = BytecodeExp::new();
        e.append_value(CompileTimeValue::Indeterminate);
        assert!(e.is_empty());
        assert_eq!(e.constant(), None);
    }

    #[test]
    fn compact_and_wide_jumps() {
        let mut short = BytecodeExp::new();
        short.append_jump(Jump::IfZero, 254);
        assert_eq!(short.as_bytes(), &[OpCode::Jz8 as u8, 254]);

        let mut long = BytecodeExp::new();
        long.append_jump(Jump::IfZero, 255);
        assert_eq!(long.len(), 5);
        let ins = long.instructions().unwrap();
        assert_eq!(ins[0].op, Op::Base(OpCode::Jz));
        assert_eq!(ins[0].jump_target(), Some(260));
    }

    #[test]
    fn short_circuit_keeps_one_value() {
        let mut e = BytecodeExp::new();
        e.append_op(OpCode::Time);
        e.append_short_circuit(Jump::IfZero, &{
            let mut rhs = BytecodeExp::new();
            rhs.append_op(ExOp::PosZ);
            rhs
        });
        assert_eq!(e.stack_delta(), Ok(1));
    }

    #[test]
    fn branch_balances_both_arms() {
        let mut e = BytecodeExp::new();
        e.append_op(OpCode::Alive);
        e.append_branch(&lit(1), &lit(2));
        assert_eq!(e.stack_delta(), Ok(1));

        let mut stmt = BytecodeExp::new();
        stmt.append_op(OpCode::Alive);
        let mut then = BytecodeExp::new();
        then.append_op_i32(OpCode::Controller, 0);
        stmt.append_branch(&then, &BytecodeExp::new());
        assert_eq!(stmt.stack_delta(), Ok(0));
    }

    #[test]
    fn wide_branch_still_balances() {
        let mut big = BytecodeExp::new();
        for _ in 0..100 {
            big.append_int(1000);
            big.append_op(OpCode::Pop);
        }
        big.append_int(7);
        let mut e = BytecodeExp::new();
        e.append_op(OpCode::Alive);
        e.append_branch(&big, &lit(2));
        assert!(e.instructions().unwrap().iter().any(|i| i.op == Op::Base(OpCode::Jz)));
        assert_eq!(e.stack_delta(), Ok(1));
    }

    #[test]
    fn tiers_decode() {
        let mut e = BytecodeExp::new();
        e.append_op(ExOp::GetHitVar);
        e.append_op(ConstOp::DataLife);
        let ins = e.instructions().unwrap();
        assert_eq!(ins[0].op, Op::Ex(ExOp::GetHitVar));
        assert_eq!(ins[1].op, Op::Const(ConstOp::DataLife));
        assert_eq!(e.to_string(), "    0: ex.gethitvar\n    2: const(data.life)\n");
    }

    #[test]
    fn malformed_streams() {
        assert_eq!(
            BytecodeExp::from(vec![OpCode::Int as u8, 1]).instructions(),
            Err(DecodeError::Truncated { offset: 0 })
        );
        assert_eq!(
            BytecodeExp::from(vec![OpCode::Add as u8]).stack_delta(),
            Err(DecodeError::Underflow { offset: 0 })
        );
    }
}
