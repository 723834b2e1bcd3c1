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

//! Letter and keyword values: state and move type letters, hit attributes, hit flags and
//! assert flags, all compiled to integer masks.

use cns_bytecode::ASSERT_FLAGS;

/// Attack classes in bit order, starting at bit 3 of an attribute mask. Bits 0 to 2 hold the
/// state letters.
pub(crate) const ATTACK_TYPES: [&str; 9] = ["na", "nt", "np", "sa", "st", "sp", "ha", "ht", "hp"];

/// A mask parsed from letters. Parsing stops at the first invalid part, which is returned so
/// the caller can decide whether a truncated value is acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Mask {
    pub(crate) value: i32,
    pub(crate) invalid: Option<String>,
}

impl Mask {
    fn valid(value: i32) -> Self {
        Self {
            value,
            invalid: None,
        }
    }

    fn truncated(value: i32, at: &str) -> Self {
        Self {
            value,
            invalid: Some(at.to_string()),
        }
    }
}

pub(crate) fn state_type_bit(c: char) -> Option<i32> {
    match c.to_ascii_lowercase() {
        's' => Some(1),
        'c' => Some(2),
        'a' => Some(4),
        'l' => Some(8),
        _ => None,
    }
}

pub(crate) fn move_type_bit(c: char) -> Option<i32> {
    match c.to_ascii_lowercase() {
        'i' => Some(1),
        'a' => Some(2),
        'h' => Some(4),
        _ => None,
    }
}

fn attack_bits(class: &str) -> Option<i32> {
    let all = |kind: char| {
        ATTACK_TYPES
            .iter()
            .enumerate()
            .filter(|(_, t)| t.ends_with(kind))
            .fold(0, |m, (i, _)| m | 1 << (3 + i))
    };
    match class {
        "aa" => Some(all('a')),
        "at" => Some(all('t')),
        "ap" => Some(all('p')),
        _ => ATTACK_TYPES
            .iter()
            .position(|t| *t == class)
            .map(|i| 1 << (3 + i)),
    }
}

/// `SCA, NA, SP`: state letters, then attack classes.
pub(crate) fn parse_attr(text: &str) -> Mask {
    let mut parts = text.split(',').map(|p| p.trim().to_ascii_lowercase());
    let mut value = 0;
    let states = parts.next().unwrap_or_default();
    for c in states.chars() {
        match c {
            's' | 'c' | 'a' => value |= state_type_bit(c).unwrap_or(0),
            _ => return Mask::truncated(value, &states),
        }
    }
    for class in parts {
        match attack_bits(&class) {
            Some(bits) => value |= bits,
            None => return Mask::truncated(value, &class),
        }
    }
    Mask::valid(value)
}

/// `MAF`, `H+`, `-`: the situations a hit or guard applies to.
pub(crate) fn parse_hit_flags(text: &str) -> Mask {
    let mut value = 0;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        let bit = match c.to_ascii_lowercase() {
            'h' => 1,
            'l' => 2,
            'a' => 4,
            'f' => 8,
            'd' => 16,
            'p' => 32,
            'm' => 1 | 2,
            '+' => 64,
            '-' => 128,
            _ => return Mask::truncated(value, &c.to_ascii_lowercase().to_string()),
        };
        value |= bit;
    }
    Mask::valid(value)
}

pub(crate) fn assert_flag(name: &str) -> Option<i32> {
    ASSERT_FLAGS
        .iter()
        .position(|f| f.eq_ignore_ascii_case(name))
        .map(|i| i as i32)
}

/// Index of `word` in `words`. Lenient matching also accepts the first letter alone, as long
/// as exactly one word starts with it.
pub(crate) fn keyword(words: &[&str], word: &str, strict: bool) -> Option<usize> {
    let word = word.trim().to_ascii_lowercase();
    if let Some(i) = words.iter().position(|w| *w == word) {
        return Some(i);
    }
    if strict {
        return None;
    }
    let first = word.chars().next()?;
    let mut candidates = words
        .iter()
        .enumerate()
        .filter(|(_, w)| w.starts_with(first));
    match (candidates.next(), candidates.next()) {
        (Some((i, _)), None) => Some(i),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("S", 1; "standing")]
    #[test_case("SCA", 7; "any state")]
    #[test_case("A, NA", 4 | 8; "air normal")]
    #[test_case("SCA, AA", 7 | 8 | 64 | 512; "all attacks")]
    #[test_case("C, AT, HP", 2 | 16 | 128 | 1024 | 2048; "throws and hyper projectile")]
    fn attributes(text: &str, expected: i32) {
        assert_eq!(parse_attr(text), Mask::valid(expected));
    }

    #[test]
    fn invalid_attributes_truncate() {
        let mask = parse_attr("SC, NA, XX, SA");
        assert_eq!(mask.value, 3 | 8);
        assert_eq!(mask.invalid.as_deref(), Some("xx"));
        assert_eq!(parse_attr("Q").value, 0);
    }

    #[test]
    fn hit_flags() {
        assert_eq!(parse_hit_flags("MAF"), Mask::valid(1 | 2 | 4 | 8));
        assert_eq!(parse_hit_flags("H+"), Mask::valid(1 | 64));
        assert_eq!(parse_hit_flags("-").value, 128);
        assert_eq!(parse_hit_flags("HZ").invalid.as_deref(), Some("z"));
    }

    #[test]
    fn keywords() {
        let words = ["high", "low", "trip", "none"];
        assert_eq!(keyword(&words, "Trip", true), Some(2));
        assert_eq!(keyword(&words, "t", true), None);
        assert_eq!(keyword(&words, "t", false), Some(2));
        assert_eq!(keyword(&["add", "addalpha"], "a", false), None);
    }

    #[test]
    fn assert_flags_are_indexed() {
        assert_eq!(assert_flag("Intro"), Some(0));
        assert_eq!(assert_flag("nowalk"), Some(16));
        assert_eq!(assert_flag("fly"), None);
    }
}
