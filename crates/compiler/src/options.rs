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

use cns_bytecode::{Constants, StringPool};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Compile classic content with the rules of the block syntax: no downgraded errors, and
    /// keyword values must be spelled out in full.
    pub strict_classic: bool,
}

/// What the host lends a session for the duration of one character's compilation.
pub struct CompilationContext<'h> {
    /// Name used when reporting downgraded errors.
    pub actor: String,
    pub constants: &'h Constants,
    pub strings: &'h mut StringPool,
}

impl<'h> CompilationContext<'h> {
    pub fn new(actor: &str, constants: &'h Constants, strings: &'h mut StringPool) -> Self {
        Self {
            actor: actor.to_string(),
            constants,
            strings,
        }
    }
}
