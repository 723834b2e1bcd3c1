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

use std::collections::{BTreeMap, HashSet};

use cns_bytecode::{
    BYTECODE_VERSION, BytecodeExp, CommandList, CompileTimeValue, CompiledCharacter,
    StateBytecode,
};
use tracing::{debug, warn};

use crate::errors::{CompileError, CompileWarning, SourceError};
use crate::functions::FunctionTable;
use crate::lexer::next_token;
use crate::options::{CompilationContext, CompileOptions};
use crate::source::{SourceCursor, SourceFile, Syntax};
use crate::var_scope::VarScope;

/// Compiles the source files of one character. Create one per character and feed it every
/// file in load order: the function table, command list and string pool accumulate across
/// files, and the first definition of a state number wins.
pub struct CompileSession<'h> {
    pub(crate) options: CompileOptions,
    pub(crate) ctx: CompilationContext<'h>,
    /// The current token of the expression or statement being compiled.
    pub(crate) token: String,
    pub(crate) strict: bool,
    pub(crate) scope: VarScope,
    pub(crate) functions: FunctionTable,
    pub(crate) commands: CommandList,
    pub(crate) states: BTreeMap<i32, StateBytecode>,
    pub(crate) warnings: Vec<CompileWarning>,
    /// Number of the state being compiled, for diagnostics.
    pub(crate) state_no: Option<i32>,
    /// Activation counts of the persistent blocks of the state being compiled.
    pub(crate) persistent: Vec<i32>,
    pub(crate) in_function: bool,
    pub(crate) file: String,
    pub(crate) line: usize,
    /// Line positions of the block syntax file being compiled.
    pub(crate) cursor: Option<SourceCursor>,
    prescanned: HashSet<String>,
}

impl<'h> CompileSession<'h> {
    pub fn new(options: CompileOptions, ctx: CompilationContext<'h>) -> Self {
        let strict = options.strict_classic;
        Self {
            options,
            ctx,
            token: String::new(),
            strict,
            scope: VarScope::new(),
            functions: FunctionTable::default(),
            commands: CommandList::default(),
            states: BTreeMap::new(),
            warnings: vec![],
            state_no: None,
            persistent: vec![],
            in_function: false,
            file: String::new(),
            line: 0,
            cursor: None,
            prescanned: HashSet::new(),
        }
    }

    /// Compile several files, making every function declared in any of them callable from all
    /// of them.
    pub fn compile_files(&mut self, sources: &[SourceFile]) -> Result<(), SourceError> {
        for source in sources.iter().filter(|s| s.syntax == Syntax::Modern) {
            self.prescan(source)?;
        }
        for source in sources {
            self.compile_file(source)?;
        }
        Ok(())
    }

    /// Compile one file. On error, states completed before the failing one are kept.
    pub fn compile_file(&mut self, source: &SourceFile) -> Result<(), SourceError> {
        self.file = source.name.clone();
        self.line = 0;
        self.state_no = None;
        let result = match source.syntax {
            Syntax::Classic => {
                self.strict = self.options.strict_classic;
                self.compile_classic(&source.text)
            }
            Syntax::Modern => {
                self.prescan(source)?;
                self.strict = true;
                self.compile_modern(&source.text)
            }
        };
        self.state_no = None;
        self.in_function = false;
        result
    }

    fn prescan(&mut self, source: &SourceFile) -> Result<(), SourceError> {
        if !self.prescanned.insert(source.name.clone()) {
            return Ok(());
        }
        self.file = source.name.clone();
        self.declare_functions(&source.text)
    }

    /// Compile a single expression in the current (classic) strictness, for hosts that
    /// evaluate expressions outside of any state.
    pub fn compile_expression(
        &mut self,
        text: &str,
    ) -> Result<(CompileTimeValue, BytecodeExp), CompileError> {
        let mut input = text;
        let mut out = BytecodeExp::new();
        let value = self.full_expr(&mut out, &mut input)?;
        self.expect_end()?;
        Ok((value, out))
    }

    pub fn states(&self) -> &BTreeMap<i32, StateBytecode> {
        &self.states
    }

    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    pub fn finish(self) -> CompiledCharacter {
        CompiledCharacter {
            version: BYTECODE_VERSION,
            states: self.states,
            functions: self.functions.into_functions(),
            commands: self.commands,
        }
    }

    /// Either fail with `error` (strict) or record it as a warning and carry on with
    /// `fallback`.
    pub(crate) fn lenient<T>(&mut self, error: CompileError, fallback: T) -> Result<T, CompileError> {
        if self.strict {
            return Err(error);
        }
        warn!(
            actor = %self.ctx.actor,
            state = ?self.state_no,
            file = %self.file,
            line = self.line,
            "{error}"
        );
        self.warnings.push(CompileWarning {
            file: self.file.clone(),
            line: self.line,
            actor: self.ctx.actor.clone(),
            state: self.state_no,
            message: error.to_string(),
        });
        Ok(fallback)
    }

    /// Point diagnostics at the line where `rest` begins, when positions are tracked.
    pub(crate) fn mark_line(&mut self, rest: &str) {
        if let Some(cursor) = &self.cursor {
            self.line = cursor.line_at(rest);
        }
    }

    /// Advance to the next token.
    pub(crate) fn advance(&mut self, input: &mut &str) {
        self.token = next_token(input);
    }

    /// Require the current token to be `expected`, then advance past it.
    pub(crate) fn expect(&mut self, expected: &str, input: &mut &str) -> Result<(), CompileError> {
        if self.token != expected {
            return Err(CompileError::Missing(expected.to_string()));
        }
        self.advance(input);
        Ok(())
    }

    /// Require that nothing is left.
    pub(crate) fn expect_end(&self) -> Result<(), CompileError> {
        if self.token.is_empty() {
            Ok(())
        } else {
            Err(CompileError::Unexpected(self.token.clone()))
        }
    }

    /// Store a finished state, unless an earlier file already defined that number.
    pub(crate) fn insert_state(&mut self, state: StateBytecode) {
        if self.states.contains_key(&state.number) {
            debug!(state = state.number, file = %self.file, "state already defined; skipping");
            return;
        }
        self.states.insert(state.number, state);
    }

    /// Reset per-state context before compiling state `number`.
    pub(crate) fn begin_state(&mut self, number: i32) {
        self.state_no = Some(number);
        self.scope = VarScope::new();
        self.persistent.clear();
        self.in_function = false;
    }

    pub(crate) fn source_error(&self, error: CompileError) -> SourceError {
        SourceError {
            file: self.file.clone(),
            line: self.line,
            error,
        }
    }
}
