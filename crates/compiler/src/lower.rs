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

//! Flattening block trees into one instruction stream.
//!
//! Every fragment is lowered before the jump that skips it is emitted, so all jump distances
//! are known when written and no patching is needed. Controllers are referred to by their
//! pre-order index in the tree; a branch that can never run still consumes indices, so the
//! numbering always matches [`StateBlock::controllers`].

use cns_bytecode::{
    BlockItem, BlockKind, BytecodeExp, Function, MoveType, OpCode, Physics, StateBlock,
    StateBytecode, StateController, StateType,
};
use tracing::trace;

use crate::functions::Signature;
use crate::session::CompileSession;

/// The `[StateDef]` part of a state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StateHeader {
    pub(crate) number: i32,
    pub(crate) state_type: StateType,
    pub(crate) move_type: MoveType,
    pub(crate) physics: Physics,
    pub(crate) statedef: StateController,
}

impl StateHeader {
    pub(crate) fn new(number: i32) -> Self {
        Self {
            number,
            state_type: StateType::Standing,
            move_type: MoveType::Idle,
            physics: Physics::None,
            statedef: StateController::default(),
        }
    }
}

pub(crate) fn lower_block(block: &StateBlock, next: &mut i32) -> BytecodeExp {
    let mut body = BytecodeExp::new();
    for item in &block.items {
        lower_item(item, next, &mut body);
    }
    if let Some(persistence) = &block.persistent {
        let mut gated = BytecodeExp::new();
        gated.append_persist(persistence.slot, &body);
        body = gated;
    }
    let otherwise = block
        .else_block
        .as_ref()
        .map(|b| lower_block(b, next))
        .unwrap_or_default();

    let mut out = BytecodeExp::new();
    match &block.kind {
        BlockKind::Sequential => out = body,
        BlockKind::If => match block.guard.constant().and_then(|v| v.to_bool()) {
            _ if block.guard.is_empty() => out = body,
            Some(true) => out = body,
            Some(false) => out = otherwise,
            None => {
                out.append_exp(&block.guard);
                out.append_branch(&body, &otherwise);
            }
        },
        BlockKind::While => {
            let mut region = BytecodeExp::new();
            if !block.guard.is_empty() {
                region.append_exp(&block.guard);
                region.append_op(OpCode::LoopCond);
            }
            region.append_exp(&body);
            out.append_region(OpCode::Loop, &region);
        }
        BlockKind::For(Some(header)) => {
            out.append_exp(&header.init);
            out.append_exp(&header.end);
            out.append_exp(&header.step);
            out.append_for(header.counter, &body);
        }
        BlockKind::For(None) => out.append_region(OpCode::Loop, &body),
    }
    out
}

fn lower_item(item: &BlockItem, next: &mut i32, out: &mut BytecodeExp) {
    match item {
        BlockItem::Controller(_) => {
            out.append_op_i32(OpCode::Controller, *next);
            *next += 1;
        }
        BlockItem::Block(block) => out.append_exp(&lower_block(block, next)),
        BlockItem::Exec(code) => {
            out.append_exp(code);
            out.append_op(OpCode::Pop);
        }
        BlockItem::Call {
            func,
            args,
            returns,
            ..
        } => {
            for arg in args {
                out.append_exp(arg);
            }
            out.append_call(*func, args.len() as u8, returns.len() as u8);
            for slot in returns.iter().rev() {
                if let Some(slot) = slot {
                    out.append_op_u8(OpCode::SetLocal, *slot);
                }
                out.append_op(OpCode::Pop);
            }
        }
        BlockItem::Break => out.append_op(OpCode::Break),
        BlockItem::Continue => out.append_op(OpCode::Continue),
    }
}

impl CompileSession<'_> {
    /// Lower a finished state body and collect the per-state context into a state record.
    pub(crate) fn state_bytecode(&mut self, header: StateHeader, block: StateBlock) -> StateBytecode {
        let mut controllers = 0;
        let code = lower_block(&block, &mut controllers);
        trace!(
            state = header.number,
            controllers,
            bytes = code.len(),
            locals = self.scope.len(),
            "compiled state"
        );
        StateBytecode {
            number: header.number,
            state_type: header.state_type,
            move_type: header.move_type,
            physics: header.physics,
            statedef: header.statedef,
            block,
            code,
            num_locals: self.scope.len() as u16,
            persistent: std::mem::take(&mut self.persistent),
        }
    }

    pub(crate) fn function_body(&mut self, sig: &Signature, block: StateBlock) -> Function {
        let mut controllers = 0;
        let code = lower_block(&block, &mut controllers);
        trace!(function = %sig.name, controllers, bytes = code.len(), "compiled function");
        Function {
            name: sig.name.clone(),
            num_args: sig.num_args(),
            num_rets: sig.num_rets(),
            num_locals: self.scope.len() as u16,
            block,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cns_bytecode::{ControllerKind, ForHeader, Persistence};
    use pretty_assertions::assert_eq;

    fn controller() -> BlockItem {
        BlockItem::Controller(StateController::inert(ControllerKind::Null))
    }

    fn guard() -> BytecodeExp {
        let mut g = BytecodeExp::new();
        g.append_op(OpCode::Time);
        g
    }

    #[test]
    fn controllers_are_numbered_in_pre_order() {
        let mut otherwise = StateBlock::sequential();
        otherwise.items.push(controller());
        let mut branch = StateBlock::new(BlockKind::If);
        branch.guard = guard();
        branch.items.push(controller());
        branch.else_block = Some(Box::new(otherwise));
        let mut root = StateBlock::sequential();
        root.items.push(controller());
        root.items.push(BlockItem::Block(branch));
        root.items.push(controller());

        let mut next = 0;
        let code = lower_block(&root, &mut next);
        assert_eq!(next, 4);
        assert_eq!(root.controllers().len(), 4);
        let indices: Vec<_> = code
            .instructions()
            .unwrap()
            .into_iter()
            .filter(|i| i.op == OpCode::Controller.into())
            .map(|i| i.operand)
            .collect();
        assert_eq!(
            indices,
            (0..4).map(cns_bytecode::Operand::I32).collect::<Vec<_>>()
        );
        assert_eq!(code.stack_delta(), Ok(0));
    }

    #[test]
    fn dead_branches_still_consume_indices() {
        let mut dead = StateBlock::new(BlockKind::If);
        dead.guard.append_bool(false);
        dead.items.push(controller());
        let mut root = StateBlock::sequential();
        root.items.push(BlockItem::Block(dead));
        root.items.push(controller());

        let mut next = 0;
        let code = lower_block(&root, &mut next);
        assert_eq!(next, 2);
        let mut expected = BytecodeExp::new();
        expected.append_op_i32(OpCode::Controller, 1);
        assert_eq!(code, expected);
    }

    #[test]
    fn loops_and_persistence_balance() {
        let mut body = StateBlock::new(BlockKind::For(Some(ForHeader {
            counter: 0,
            init: {
                let mut e = BytecodeExp::new();
                e.append_int(0);
                e
            },
            end: {
                let mut e = BytecodeExp::new();
                e.append_int(3);
                e
            },
            step: {
                let mut e = BytecodeExp::new();
                e.append_int(1);
                e
            },
        })));
        body.items.push(controller());
        body.items.push(BlockItem::Break);
        let mut spin = StateBlock::new(BlockKind::While);
        spin.guard = guard();
        spin.persistent = Some(Persistence { count: 0, slot: 0 });
        spin.items.push(BlockItem::Block(body));
        spin.items.push(BlockItem::Continue);

        let mut next = 0;
        let code = lower_block(&spin, &mut next);
        assert_eq!(next, 1);
        assert_eq!(code.stack_delta(), Ok(0));
    }
}
