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

use serde::Serialize;

/// Per-actor string interning. Compiled code refers to strings by index; indices are never
/// reused or invalidated.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StringPool {
    strings: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, i32>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> i32 {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = self.strings.len() as i32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), id);
        id
    }

    pub fn get(&self, id: i32) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut pool = StringPool::new();
        let a = pool.intern("hadouken");
        let b = pool.intern("shoryuken");
        assert_eq!(pool.intern("hadouken"), a);
        assert_ne!(a, b);
        assert_eq!(pool.get(b), Some("shoryuken"));
        assert_eq!(pool.get(-1), None);
        assert_eq!(pool.len(), 2);
    }
}
