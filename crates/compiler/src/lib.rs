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

// Front end
mod lexer;
mod source;

// Expressions
mod expr;
mod flags;
mod primary;
mod redirect;
mod triggers;

// Statements and states
mod assemble;
mod block;
mod classic;
mod commands;
mod functions;
mod lower;
mod var_scope;

mod errors;
mod options;
mod session;

mod compile_tests;

pub use crate::errors::{CompileError, CompileWarning, SourceError};
pub use crate::lexer::{next_token, next_token_cs, parse_number};
pub use crate::options::{CompilationContext, CompileOptions};
pub use crate::session::CompileSession;
pub use crate::source::{SourceFile, Syntax};
pub use crate::var_scope::{DeclType, MAX_LOCALS, VarScope};
