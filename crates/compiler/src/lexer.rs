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

//! Tokenizing. There are no token objects: every call takes the next token off the front of
//! the remaining input and advances the cursor past it. The empty token marks end of input.

use cns_bytecode::CompileTimeValue;

/// Characters that end an identifier run.
const SPECIAL: &str = "!=<>()|&+-*/%,[]^:;{}#\"~";

/// Operators that may be doubled, and their single character forms.
const DOUBLED: &[(char, char)] = &[
    (':', '='),
    ('!', '='),
    ('>', '='),
    ('<', '='),
    ('&', '&'),
    ('|', '|'),
    ('^', '^'),
    ('*', '*'),
];

fn is_special(c: char) -> bool {
    c.is_whitespace() || SPECIAL.contains(c)
}

/// Length in bytes of a numeric literal at the start of `s`, if there is one.
fn number_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let starts_number = match bytes.first() {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'.') => bytes.get(1).is_some_and(u8::is_ascii_digit),
        _ => false,
    };
    if !starts_number {
        return None;
    }
    let mut i = 0;
    let mut seen_dot = false;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => i += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                i += 1;
            }
            _ => break,
        }
    }
    if i > 0 && matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(u8::is_ascii_digit) {
            while bytes.get(j).is_some_and(u8::is_ascii_digit) {
                j += 1;
            }
            i = j;
        }
    }
    Some(i)
}

/// Next token, case preserved.
pub fn next_token_cs<'a>(input: &mut &'a str) -> &'a str {
    let s = input.trim_start();
    let Some(first) = s.chars().next() else {
        *input = s;
        return "";
    };
    let len = if first == '=' {
        if s[1..].starts_with('=') { 2 } else { 1 }
    } else if let Some((_, second)) = DOUBLED.iter().find(|(c, _)| *c == first) {
        if s[1..].starts_with(*second) { 2 } else { 1 }
    } else if "~+-/%,()[]{};#\"".contains(first) {
        1
    } else if let Some(len) = number_len(s) {
        len
    } else {
        s.find(is_special).unwrap_or(s.len())
    };
    let (token, rest) = s.split_at(len);
    *input = rest;
    if token == "==" { "=" } else { token }
}

/// Next token, folded to lower case.
pub fn next_token(input: &mut &str) -> String {
    next_token_cs(input).to_ascii_lowercase()
}

/// The token `next_token` would return, without consuming anything.
pub fn peek_token(input: &str) -> String {
    let mut look = input;
    next_token(&mut look)
}

/// Read the body of a string literal whose opening quote has already been consumed.
/// `None` if the closing quote is missing.
pub fn read_string(input: &mut &str) -> Option<String> {
    let end = input.find('"')?;
    let body = input[..end].to_string();
    *input = &input[end + 1..];
    Some(body)
}

pub fn is_number(token: &str) -> bool {
    number_len(token) == Some(token.len()) && !token.is_empty()
}

/// Parse a numeric literal token. Integer literals outside the signed 32-bit range saturate.
pub fn parse_number(token: &str, negative: bool) -> Option<CompileTimeValue> {
    if !is_number(token) {
        return None;
    }
    if token.contains(['.', 'e', 'E']) {
        let f: f32 = token.parse().ok()?;
        return Some(CompileTimeValue::Float(if negative { -f } else { f }));
    }
    let digits = token.trim_start_matches('0');
    let magnitude: i64 = if digits.len() > 18 {
        i64::MAX
    } else if digits.is_empty() {
        0
    } else {
        digits.parse().ok()?
    };
    let signed = if negative { -magnitude } else { magnitude };
    Some(CompileTimeValue::Int(
        signed.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
    ))
}

pub fn is_operator(token: &str) -> bool {
    matches!(
        token,
        "=" | "!="
            | ">"
            | ">="
            | "<"
            | "<="
            | "&&"
            | "||"
            | "^^"
            | "&"
            | "|"
            | "^"
            | "+"
            | "*"
            | "**"
            | "/"
            | "%"
            | ":="
            | ":"
    )
}

/// Read raw text up to the first of `stops` outside brackets and quotes. The stop character is
/// consumed and returned; `None` means the input ran out.
pub fn read_raw_until(input: &mut &str, stops: &[char]) -> (String, Option<char>) {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        if quoted {
            quoted = c != '"';
            continue;
        }
        match c {
            '"' => quoted = true,
            '(' | '[' => depth += 1,
            ')' | ']' if depth > 0 => depth -= 1,
            c if depth == 0 && stops.contains(&c) => {
                let text = input[..i].to_string();
                *input = &input[i + c.len_utf8()..];
                return (text, Some(c));
            }
            _ => {}
        }
    }
    let text = input.to_string();
    *input = "";
    (text, None)
}

/// Skip to just past the `}` matching an already consumed `{`.
pub fn skip_braces(input: &mut &str) -> bool {
    let mut depth = 1usize;
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        if quoted {
            quoted = c != '"';
            continue;
        }
        match c {
            '"' => quoted = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    *input = &input[i + 1..];
                    return true;
                }
            }
            _ => {}
        }
    }
    *input = "";
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn tokens(mut input: &str) -> Vec<String> {
        let mut out = vec![];
        loop {
            let t = next_token(&mut input);
            if t.is_empty() {
                return out;
            }
            out.push(t);
        }
    }

    #[test]
    fn operators() {
        assert_eq!(
            tokens("a==b != c>=d<=e&&f||g^^h:=i**j"),
            vec![
                "a", "=", "b", "!=", "c", ">=", "d", "<=", "e", "&&", "f", "||", "g", "^^", "h",
                ":=", "i", "**", "j"
            ]
        );
        assert_eq!(tokens("!~-+/%,()[]{};#"), "! ~ - + / % , ( ) [ ] { } ; #".split(' ').collect::<Vec<_>>());
    }

    #[test]
    fn identifiers_fold_case() {
        assert_eq!(tokens("  Parent,Pos X"), vec!["parent", ",", "pos", "x"]);
        assert_eq!(tokens("const(Data.Life)"), vec!["const", "(", "data.life", ")"]);
        let mut input = "Fwd_X";
        assert_eq!(next_token_cs(&mut input), "Fwd_X");
    }

    #[test_case("12", &["12"]; "integer")]
    #[test_case("1.5e-3+", &["1.5e-3", "+"]; "exponent")]
    #[test_case(".5", &[".5"]; "leading dot")]
    #[test_case("1.2.3", &["1.2", ".3"]; "second dot starts a new number")]
    #[test_case("2e", &["2", "e"]; "dangling exponent")]
    #[test_case("10E2", &["10e2"]; "upper case exponent")]
    fn numbers(input: &str, expected: &[&str]) {
        assert_eq!(tokens(input), expected);
    }

    #[test_case("7", false, CompileTimeValue::Int(7))]
    #[test_case("2147483648", false, CompileTimeValue::Int(i32::MAX))]
    #[test_case("99999999999999999999999", false, CompileTimeValue::Int(i32::MAX))]
    #[test_case("2147483648", true, CompileTimeValue::Int(i32::MIN))]
    #[test_case("2147483649", true, CompileTimeValue::Int(i32::MIN))]
    #[test_case("0.5", true, CompileTimeValue::Float(-0.5))]
    #[test_case("1e2", false, CompileTimeValue::Float(100.0))]
    fn number_values(token: &str, negative: bool, expected: CompileTimeValue) {
        assert_eq!(parse_number(token, negative), Some(expected));
    }

    #[test]
    fn strings_and_raw_text() {
        let mut input = r#""Kung Fu Man" , x"#;
        assert_eq!(next_token(&mut input), "\"");
        assert_eq!(read_string(&mut input), Some("Kung Fu Man".to_string()));
        assert_eq!(next_token(&mut input), ",");

        let mut input = "ifelse(a, b; c) ; rest";
        assert_eq!(
            read_raw_until(&mut input, &[';']),
            ("ifelse(a, b; c) ".to_string(), Some(';'))
        );
        assert_eq!(input, " rest");

        let mut input = "a { b } } after";
        assert!(skip_braces(&mut input));
        assert_eq!(input, " after");
    }

    #[test]
    fn end_of_input() {
        let mut input = "   ";
        assert_eq!(next_token(&mut input), "");
        assert_eq!(next_token(&mut input), "");
    }
}
