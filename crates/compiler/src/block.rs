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

//! The block syntax.
//!
//! ```text
//! [StateDef 200; type: S; anim: 200;]
//! {
//!     if time = 0 {
//!         PlaySnd { value: 5, 0; }
//!     }
//!     for $i = 1; 3 { call spark($i); }
//! }
//!
//! function spark(n) {
//!     persistent(0) Explod { anim: F100 + $n; }
//! }
//! ```
//!
//! Statements are compiled into a [`StateBlock`] tree; `switch` is rewritten into an `if`
//! chain on the way.

use cns_bytecode::{
    BlockItem, BlockKind, BytecodeExp, CompileTimeValue, ControllerKind, ForHeader, Jump, OpCode,
    StateBlock,
};
use tracing::debug;

use crate::assemble::Entry;
use crate::errors::{CompileError, SourceError};
use crate::expr::{BinOp, fold_or_emit};
use crate::lexer::{peek_token, read_raw_until, skip_braces};
use crate::session::CompileSession;
use crate::source::{SourceCursor, strip_block_comments};
use crate::var_scope::{DISCARD, DeclType, VarScope};

/// What a statement inherits from the blocks around it.
#[derive(Clone, Copy, Debug, Default)]
struct BlockContext {
    in_loop: bool,
    ignore_hit_pause: bool,
}

/// The guard of a conditional block: empty when it always holds.
fn guard(value: CompileTimeValue, code: BytecodeExp) -> BytecodeExp {
    match value.to_bool() {
        Some(true) => BytecodeExp::new(),
        Some(false) => {
            let mut never = BytecodeExp::new();
            never.append_bool(false);
            never
        }
        None => code,
    }
}

fn local_name(token: &str) -> Result<String, CompileError> {
    let name = token.strip_prefix('$').unwrap_or(token);
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(CompileError::InvalidData(format!("variable name '{token}'")));
    }
    Ok(name.to_string())
}

impl CompileSession<'_> {
    pub(crate) fn compile_modern(&mut self, text: &str) -> Result<(), SourceError> {
        let text = strip_block_comments(text);
        self.cursor = Some(SourceCursor::new(&text));
        let result = self.modern_items(&text);
        self.cursor = None;
        result.map_err(|e| self.source_error(e))
    }

    /// Top level items until the end of the text. On failure `self.line` holds the line of
    /// the innermost statement or entry that was being read.
    fn modern_items(&mut self, text: &str) -> Result<(), CompileError> {
        let mut input = text;
        self.advance(&mut input);
        loop {
            self.mark_line(input);
            match self.token.as_str() {
                "" => return Ok(()),
                "[" => self.modern_state(&mut input)?,
                "function" => self.modern_function(&mut input)?,
                token => return Err(CompileError::Unexpected(token.to_string())),
            }
        }
    }

    /// `[StateDef N; key: value; ...] { ... }`, with `[` current. Like every top level item,
    /// it leaves the first token after itself current.
    fn modern_state(&mut self, input: &mut &str) -> Result<(), CompileError> {
        let (header, close) = read_raw_until(input, &[']']);
        if close.is_none() {
            return Err(CompileError::Missing("]".to_string()));
        }
        let mut parts = header.split(';');
        let title = parts.next().unwrap_or_default().trim();
        let number_text = match title.split_once(char::is_whitespace) {
            Some((word, number)) if word.eq_ignore_ascii_case("statedef") => number,
            _ => return Err(CompileError::InvalidSection(title.to_string())),
        };
        let (value, _) = self.entry_expr(&Entry::new("statedef", number_text, self.line))?;
        let number = value
            .to_i32()
            .ok_or(CompileError::NotConstant("state number"))?;
        let mut entries = vec![];
        for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once(':')
                .ok_or_else(|| CompileError::Missing(":".to_string()))?;
            entries.push(Entry::new(key, value, self.line));
        }

        self.advance(input);
        if self.token != "{" {
            return Err(CompileError::Missing("{".to_string()));
        }
        if self.states.contains_key(&number) {
            debug!(state = number, file = %self.file, "state already defined; skipping");
            if !skip_braces(input) {
                return Err(CompileError::Missing("}".to_string()));
            }
            self.advance(input);
            return Ok(());
        }
        self.begin_state(number);
        let header = self.statedef(number, &entries)?;
        let block = self.block_body(input, BlockContext::default())?;
        let state = self.state_bytecode(header, block);
        self.insert_state(state);
        self.state_no = None;
        Ok(())
    }

    /// `function name(args)[rets] { ... }`, with `function` current.
    fn modern_function(&mut self, input: &mut &str) -> Result<(), CompileError> {
        let sig = self.signature(input)?;
        let id = match self.functions.lookup(&sig.name) {
            Some((id, declared)) if *declared == sig => id,
            Some(_) => {
                return Err(CompileError::Duplicate {
                    what: "function",
                    name: sig.name,
                });
            }
            None => self.functions.declare(sig.clone())?,
        };
        if self.token != "{" {
            return Err(CompileError::Missing("{".to_string()));
        }
        self.scope = VarScope::new();
        self.persistent.clear();
        self.state_no = None;
        self.in_function = true;
        for arg in &sig.args {
            self.scope.declare_or_use(arg, DeclType::Arg)?;
        }
        for ret in &sig.rets {
            self.scope.declare_or_use(ret, DeclType::Return)?;
        }
        let block = self.block_body(input, BlockContext::default())?;
        let function = self.function_body(&sig, block);
        self.in_function = false;
        self.functions.define(id, function)
    }

    /// `{ statements }`, with `{` current. Leaves the token after `}` current.
    fn block_body(
        &mut self,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<StateBlock, CompileError> {
        let mut block = StateBlock::sequential();
        block.ignore_hit_pause = ctx.ignore_hit_pause;
        block.nested_in_loop = ctx.in_loop;
        self.expect("{", input)?;
        while self.token != "}" {
            if self.token.is_empty() {
                return Err(CompileError::Missing("}".to_string()));
            }
            self.statement(&mut block.items, input, ctx)?;
        }
        self.advance(input);
        Ok(block)
    }

    /// One statement, entered with its first token current.
    fn statement(
        &mut self,
        items: &mut Vec<BlockItem>,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<(), CompileError> {
        self.mark_line(input);
        match self.token.as_str() {
            ";" => self.advance(input),
            "{" => {
                let block = self.block_body(input, ctx)?;
                items.push(BlockItem::Block(block));
            }
            "persistent" | "ignorehitpause" => {
                let block = self.attributed(input, ctx)?;
                items.push(BlockItem::Block(block));
            }
            "if" => {
                let block = self.if_statement(input, ctx)?;
                items.push(BlockItem::Block(block));
            }
            "while" => {
                self.advance(input);
                let (value, code) = self.value_exp(input)?;
                let mut block = self.block_body(input, BlockContext { in_loop: true, ..ctx })?;
                block.kind = BlockKind::While;
                block.guard = guard(value, code);
                items.push(BlockItem::Block(block));
            }
            "for" => {
                let block = self.for_statement(input, ctx)?;
                items.push(BlockItem::Block(block));
            }
            "switch" => {
                if let Some(block) = self.switch_statement(input, ctx)? {
                    items.push(BlockItem::Block(block));
                }
            }
            "let" => self.let_statement(items, input)?,
            "call" => {
                let (func, name, args, rets) = self.call_target(input)?;
                items.push(BlockItem::Call {
                    func,
                    name,
                    args,
                    returns: vec![None; rets],
                });
                self.expect(";", input)?;
            }
            "break" | "continue" => {
                let (item, word) = if self.token == "break" {
                    (BlockItem::Break, "break")
                } else {
                    (BlockItem::Continue, "continue")
                };
                if !ctx.in_loop {
                    return Err(CompileError::OutsideLoop(word));
                }
                self.advance(input);
                self.expect(";", input)?;
                items.push(item);
            }
            _ if peek_token(input) == "{" => {
                let controller = self.controller_statement(input, ctx)?;
                items.push(controller);
            }
            _ => {
                let (_, code) = self.value_exp(input)?;
                self.expect(";", input)?;
                items.push(BlockItem::Exec(code));
            }
        }
        Ok(())
    }

    /// `persistent(N)` and `ignorehitpause` in front of a statement.
    fn attributed(
        &mut self,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<StateBlock, CompileError> {
        let mut count = None;
        let mut inner = ctx;
        loop {
            match self.token.as_str() {
                "persistent" => {
                    if self.in_function {
                        return Err(CompileError::InvalidPersistent(
                            "persistent is not allowed in a function",
                        ));
                    }
                    if self.state_no.is_some_and(|n| n < 0) {
                        return Err(CompileError::InvalidPersistent(
                            "persistent is not allowed in a negative state",
                        ));
                    }
                    self.advance(input);
                    self.expect("(", input)?;
                    let (value, _) = self.value_exp(input)?;
                    let n = value
                        .to_i32()
                        .ok_or(CompileError::NotConstant("persistent"))?;
                    if n == 1 {
                        return Err(CompileError::InvalidPersistent(
                            "persistent(1) is the default",
                        ));
                    }
                    self.expect(")", input)?;
                    count = Some(n);
                }
                "ignorehitpause" => {
                    self.advance(input);
                    inner.ignore_hit_pause = true;
                }
                _ => break,
            }
        }
        let mut block = StateBlock::sequential();
        block.ignore_hit_pause = inner.ignore_hit_pause;
        block.nested_in_loop = inner.in_loop;
        block.persistent = count.map(|n| self.persistence(n));
        self.statement(&mut block.items, input, inner)?;
        Ok(block)
    }

    /// `if c { } else if d { } else { }`, with `if` current.
    fn if_statement(
        &mut self,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<StateBlock, CompileError> {
        self.advance(input);
        let (value, code) = self.value_exp(input)?;
        let mut block = self.block_body(input, ctx)?;
        block.kind = BlockKind::If;
        block.guard = guard(value, code);
        if self.token == "else" {
            self.advance(input);
            let otherwise = if self.token == "if" {
                self.if_statement(input, ctx)?
            } else {
                self.block_body(input, ctx)?
            };
            block.else_block = Some(Box::new(otherwise));
        }
        Ok(block)
    }

    /// `for { }` loops until `break`; `for [name =] init; end [; step] { }` counts.
    fn for_statement(
        &mut self,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<StateBlock, CompileError> {
        let inner = BlockContext {
            in_loop: true,
            ..ctx
        };
        self.advance(input);
        if self.token == "{" {
            let mut block = self.block_body(input, inner)?;
            block.kind = BlockKind::For(None);
            return Ok(block);
        }
        let name = if peek_token(input) == "=" {
            let name = local_name(&self.token)?;
            self.advance(input);
            self.advance(input);
            Some(name)
        } else {
            None
        };
        let (_, init) = self.value_exp(input)?;
        self.expect(";", input)?;
        let (_, end) = self.value_exp(input)?;
        let step = if self.token == ";" {
            self.advance(input);
            self.value_exp(input)?.1
        } else {
            let mut one = BytecodeExp::new();
            one.append_int(1);
            one
        };
        let counter = match &name {
            Some(name) => self.scope.declare_or_use(name, DeclType::For)?,
            None => self.scope.declare_hidden()?,
        };
        let mut block = self.block_body(input, inner)?;
        block.kind = BlockKind::For(Some(ForHeader {
            counter,
            init,
            end,
            step,
        }));
        Ok(block)
    }

    /// `switch v { case a; b: ... default: ... }`, rewritten as an `if` chain comparing `v`
    /// with each case value. `None` for a switch without arms.
    fn switch_statement(
        &mut self,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<Option<StateBlock>, CompileError> {
        self.advance(input);
        let mut subject_code = BytecodeExp::new();
        let subject = self.expr(&mut subject_code, input)?;
        self.expect("{", input)?;

        let mut arms: Vec<(BytecodeExp, StateBlock)> = vec![];
        let mut default = None;
        loop {
            match self.token.as_str() {
                "case" => {
                    let mut tests = vec![];
                    loop {
                        self.advance(input);
                        let mut case_code = BytecodeExp::new();
                        let case = self.expr(&mut case_code, input)?;
                        let mut test = subject_code.clone();
                        let value = fold_or_emit(&mut test, subject, &case_code, case, BinOp::Eq);
                        test.append_value(value);
                        tests.push((value, test));
                        match self.token.as_str() {
                            ";" => continue,
                            ":" => break,
                            _ => return Err(CompileError::Missing(":".to_string())),
                        }
                    }
                    self.advance(input);
                    let body = self.case_body(input, ctx)?;
                    arms.push((case_guard(tests), body));
                }
                "default" => {
                    self.advance(input);
                    self.expect(":", input)?;
                    let mut body = self.case_body(input, ctx)?;
                    body.kind = BlockKind::If;
                    default = Some(body);
                }
                "}" => {
                    self.advance(input);
                    break;
                }
                "" => return Err(CompileError::Missing("}".to_string())),
                token => return Err(CompileError::Unexpected(token.to_string())),
            }
        }

        let mut chain = default;
        for (test, mut body) in arms.into_iter().rev() {
            body.kind = BlockKind::If;
            body.guard = test;
            body.else_block = chain.map(Box::new);
            chain = Some(body);
        }
        Ok(chain)
    }

    /// Statements up to the next `case`, `default` or the closing brace.
    fn case_body(
        &mut self,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<StateBlock, CompileError> {
        let mut block = StateBlock::sequential();
        block.ignore_hit_pause = ctx.ignore_hit_pause;
        block.nested_in_loop = ctx.in_loop;
        while !matches!(self.token.as_str(), "case" | "default" | "}" | "") {
            self.statement(&mut block.items, input, ctx)?;
        }
        Ok(block)
    }

    /// `let a, b = x, y;` or `let a, b = call f(z);`. `_` discards.
    fn let_statement(
        &mut self,
        items: &mut Vec<BlockItem>,
        input: &mut &str,
    ) -> Result<(), CompileError> {
        let mut names = vec![];
        loop {
            self.advance(input);
            names.push(local_name(&self.token)?);
            self.advance(input);
            if self.token != "," {
                break;
            }
        }
        self.expect("=", input)?;

        if self.token == "call" {
            let (func, name, args, rets) = self.call_target(input)?;
            if rets != names.len() {
                return Err(CompileError::ReturnCount {
                    name,
                    expected: rets,
                    got: names.len(),
                });
            }
            let returns = names
                .iter()
                .map(|n| self.bind(n))
                .collect::<Result<Vec<_>, _>>()?;
            items.push(BlockItem::Call {
                func,
                name,
                args,
                returns,
            });
            return self.expect(";", input);
        }

        let mut values = vec![];
        loop {
            values.push(self.value_exp(input)?.1);
            if self.token != "," {
                break;
            }
            self.advance(input);
        }
        if values.len() != names.len() {
            return Err(CompileError::ArgumentCount {
                name: "let".to_string(),
                expected: names.len(),
                got: values.len(),
            });
        }
        // Every value is computed before any is stored, so `let a, b = $b, $a;` swaps.
        let mut code = BytecodeExp::new();
        for value in &values {
            code.append_exp(value);
        }
        for (i, name) in names.iter().enumerate().rev() {
            if let Some(slot) = self.bind(name)? {
                code.append_op_u8(OpCode::SetLocal, slot);
            }
            if i > 0 {
                code.append_op(OpCode::Pop);
            }
        }
        items.push(BlockItem::Exec(code));
        self.expect(";", input)
    }

    fn bind(&mut self, name: &str) -> Result<Option<u8>, CompileError> {
        if name == DISCARD {
            return Ok(None);
        }
        self.scope.declare_or_use(name, DeclType::Let).map(Some)
    }

    /// `call name(args)`, with `call` current: the callee id, its name, the argument code
    /// and the number of values it returns.
    fn call_target(
        &mut self,
        input: &mut &str,
    ) -> Result<(i32, String, Vec<BytecodeExp>, usize), CompileError> {
        self.advance(input);
        let name = std::mem::take(&mut self.token);
        self.advance(input);
        if self.token != "(" {
            return Err(CompileError::Missing("(".to_string()));
        }
        let args: Vec<BytecodeExp> = if peek_token(input) == ")" {
            self.advance(input);
            self.advance(input);
            vec![]
        } else {
            self.paren_args(input)?
                .into_iter()
                .map(|(value, mut code)| {
                    code.append_value(value);
                    code
                })
                .collect()
        };
        let (id, sig) = self
            .functions
            .lookup(&name)
            .ok_or_else(|| CompileError::UndefinedFunction(name.clone()))?;
        if args.len() != sig.args.len() {
            return Err(CompileError::ArgumentCount {
                name,
                expected: sig.args.len(),
                got: args.len(),
            });
        }
        Ok((id, name, args, sig.rets.len()))
    }

    /// `Name { key: value; ... }`, with the controller name current.
    fn controller_statement(
        &mut self,
        input: &mut &str,
        ctx: BlockContext,
    ) -> Result<BlockItem, CompileError> {
        let kind = ControllerKind::from_type_name(&self.token)
            .ok_or_else(|| CompileError::UnknownController(self.token.clone()))?;
        self.advance(input);
        let mut entries = vec![];
        loop {
            self.mark_line(input.trim_start());
            let (text, stop) = read_raw_until(input, &[';', '}']);
            let text = text.trim();
            if !text.is_empty() {
                let (key, value) = text
                    .split_once(':')
                    .ok_or_else(|| CompileError::Missing(":".to_string()))?;
                entries.push(Entry::new(key, value, self.line));
            }
            match stop {
                Some(';') => continue,
                Some(_) => break,
                None => return Err(CompileError::Missing("}".to_string())),
            }
        }
        self.advance(input);
        let controller = self.controller(kind, &entries, ctx.ignore_hit_pause)?;
        Ok(BlockItem::Controller(controller))
    }
}

/// OR of a case label's comparisons; empty when one of them always holds.
fn case_guard(tests: Vec<(CompileTimeValue, BytecodeExp)>) -> BytecodeExp {
    if tests.iter().any(|(v, _)| v.to_bool() == Some(true)) {
        return BytecodeExp::new();
    }
    let mut live = tests
        .into_iter()
        .filter(|(v, _)| !v.is_known())
        .map(|(_, code)| code);
    let Some(mut chain) = live.next() else {
        return guard(CompileTimeValue::Bool(false), BytecodeExp::new());
    };
    for test in live {
        chain.append_short_circuit(Jump::IfNonZero, &test);
    }
    chain
}
