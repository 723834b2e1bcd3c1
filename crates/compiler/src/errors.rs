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

use std::fmt::{Display, Formatter};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("missing '{0}'")]
    Missing(String),
    #[error("unexpected '{0}'")]
    Unexpected(String),
    #[error("value is missing")]
    MissingValue,
    #[error("operators are contiguous near '{0}'")]
    ContiguousOperator(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("undefined variable: ${0}")]
    UndefinedVariable(String),
    #[error("undefined function: {0}")]
    UndefinedFunction(String),
    #[error("{name}: expected {expected} argument(s), got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("{name}: expected {expected} return value(s), got {got}")]
    ReturnCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid {what}: {value}")]
    InvalidLiteral { what: &'static str, value: String },
    #[error("duplicate {what}: {name}")]
    Duplicate { what: &'static str, name: String },
    #[error("{0} outside of a loop")]
    OutsideLoop(&'static str),
    #[error("'{0}' cannot be used within a trigger redirection")]
    InRedirection(String),
    #[error("{0}")]
    InvalidPersistent(&'static str),
    #[error("too many local variables (at most {max})")]
    LocalLimit { max: usize },
    #[error("too many {what} (at most {max})")]
    ListLimit { what: &'static str, max: usize },
    #[error("missing trigger1")]
    MissingTrigger1,
    #[error("missing type")]
    MissingType,
    #[error("unknown state controller type: {0}")]
    UnknownController(String),
    #[error("{controller}: unknown parameter '{name}'")]
    UnknownParameter { controller: String, name: String },
    #[error("{controller}: missing required parameter '{name}'")]
    MissingParameter {
        controller: String,
        name: &'static str,
    },
    #[error("{name}: expected {min} to {max} value(s), got {got}")]
    ParameterArity {
        name: String,
        min: u8,
        max: u8,
        got: usize,
    },
    #[error("{0} must be a constant expression")]
    NotConstant(&'static str),
    #[error("invalid section: {0}")]
    InvalidSection(String),
}

/// A compile error pinned to the place it happened. Renders as `<file>:<line>:\n<message>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}:{line}:\n{error}")]
pub struct SourceError {
    pub file: String,
    pub line: usize,
    #[source]
    pub error: CompileError,
}

/// A legacy construct that was accepted with a substitute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
    pub file: String,
    pub line: usize,
    pub actor: String,
    pub state: Option<i32>,
    pub message: String,
}

impl Display for CompileWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.actor)?;
        if let Some(state) = self.state {
            write!(f, " state {state}")?;
        }
        write!(f, ": {}", self.message)
    }
}
