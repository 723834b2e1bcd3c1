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

use serde::{Deserialize, Serialize};

use crate::value::CompileTimeValue;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Int(i32),
    Float(f32),
}

impl From<Constant> for CompileTimeValue {
    fn from(value: Constant) -> Self {
        match value {
            Constant::Int(i) => CompileTimeValue::Int(i),
            Constant::Float(f) => CompileTimeValue::Float(f),
        }
    }
}

/// Named numeric constants supplied by the host. Names are dotted and matched
/// case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constants(HashMap<String, Constant>);

impl Constants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: Constant) {
        self.0.insert(name.to_ascii_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<Constant> {
        self.0.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Constant)> for Constants {
    fn from_iter<T: IntoIterator<Item = (String, Constant)>>(iter: T) -> Self {
        let mut constants = Constants::new();
        for (name, value) in iter {
            constants.insert(&name, value);
        }
        constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let constants: Constants = [
            ("Default.Attack.LifeToPowerMul".to_string(), Constant::Float(0.7)),
            ("super.targetdefencemul".to_string(), Constant::Float(1.5)),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            constants.get("default.attack.lifetopowermul"),
            Some(Constant::Float(0.7))
        );
        assert_eq!(constants.get("nope"), None);
    }
}
