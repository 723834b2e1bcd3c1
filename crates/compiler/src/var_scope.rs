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

use std::collections::HashMap;

use crate::errors::CompileError;

/// Slots are addressed by one byte.
pub const MAX_LOCALS: usize = 256;

/// The name that may be bound any number of times and is never stored.
pub const DISCARD: &str = "_";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeclType {
    Arg,
    Return,
    Let,
    Assign,
    For,
    /// A counter with no name, only reachable through its slot.
    Hidden,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Decl {
    /// How was it declared?
    pub decl_type: DeclType,
    pub name: String,
    pub slot: u8,
}

/// Local variables of one state or function. The namespace is flat: a name keeps its slot
/// from first declaration to the end of the state or function.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct VarScope {
    decls: Vec<Decl>,
    by_name: HashMap<String, u8>,
}

impl VarScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    /// The slot of `name`, allocating one on first use.
    pub fn declare_or_use(&mut self, name: &str, decl_type: DeclType) -> Result<u8, CompileError> {
        if let Some(slot) = self.find(name) {
            return Ok(slot);
        }
        let slot = self.allocate(name, decl_type)?;
        self.by_name.insert(name.to_string(), slot);
        Ok(slot)
    }

    /// A slot no name refers to.
    pub fn declare_hidden(&mut self) -> Result<u8, CompileError> {
        self.allocate("", DeclType::Hidden)
    }

    fn allocate(&mut self, name: &str, decl_type: DeclType) -> Result<u8, CompileError> {
        if self.decls.len() >= MAX_LOCALS {
            return Err(CompileError::LocalLimit { max: MAX_LOCALS });
        }
        let slot = self.decls.len() as u8;
        self.decls.push(Decl {
            decl_type,
            name: name.to_string(),
            slot,
        });
        Ok(slot)
    }

    pub fn decls(&self) -> &[Decl] {
        &self.decls
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_reused_by_name() {
        let mut scope = VarScope::new();
        let a = scope.declare_or_use("a", DeclType::Let).unwrap();
        let b = scope.declare_or_use("b", DeclType::Assign).unwrap();
        assert_eq!(scope.declare_or_use("a", DeclType::Assign).unwrap(), a);
        assert_ne!(a, b);
        assert_eq!(scope.find("b"), Some(b));
        assert_eq!(scope.find("c"), None);
        assert_eq!(scope.decls()[1].decl_type, DeclType::Assign);
    }

    #[test]
    fn limit_is_256_slots() {
        let mut scope = VarScope::new();
        for i in 0..MAX_LOCALS - 1 {
            scope.declare_or_use(&format!("v{i}"), DeclType::Let).unwrap();
        }
        assert_eq!(scope.declare_hidden(), Ok(255));
        assert_eq!(
            scope.declare_or_use("one_too_many", DeclType::Let),
            Err(CompileError::LocalLimit { max: 256 })
        );
        assert_eq!(scope.declare_or_use("v0", DeclType::Let), Ok(0));
    }
}
