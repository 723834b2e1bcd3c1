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

use std::path::Path;

/// Which of the two concrete syntaxes a file is written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    /// `[Section]` headers and `key = value` lines.
    Classic,
    /// `{}` blocks, statements and functions.
    Modern,
}

impl Syntax {
    /// `.zss` files use the block syntax; everything else (`.cns`, `.cmd`, `.st`) is classic.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zss") => Syntax::Modern,
            _ => Syntax::Classic,
        }
    }
}

/// One source file, already read by the host.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
    pub syntax: Syntax,
}

impl SourceFile {
    pub fn new(name: &str, text: &str, syntax: Syntax) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            syntax,
        }
    }

    pub fn from_path(path: &Path, text: String) -> Self {
        Self {
            name: path.display().to_string(),
            text,
            syntax: Syntax::from_path(path),
        }
    }
}

/// Remove a comment introduced by `marker`, ignoring markers inside double quotes.
pub fn strip_comment(line: &str, marker: char) -> &str {
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            c if c == marker && !quoted => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Comment-free text of a block syntax file, with line breaks kept so positions still map to
/// source lines.
pub fn strip_block_comments(text: &str) -> String {
    text.lines()
        .map(|line| strip_comment(line, '#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Maps positions in a text back to 1-based line numbers. Positions are given as the suffix of
/// the text that has not been consumed yet.
#[derive(Debug, Clone, Default)]
pub struct SourceCursor {
    len: usize,
    breaks: Vec<usize>,
}

impl SourceCursor {
    pub fn new(text: &str) -> Self {
        Self {
            len: text.len(),
            breaks: text.match_indices('\n').map(|(i, _)| i).collect(),
        }
    }

    pub fn line_at(&self, rest: &str) -> usize {
        let consumed = self.len.saturating_sub(rest.len());
        1 + self.breaks.partition_point(|b| *b < consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_respect_quotes() {
        assert_eq!(strip_comment("value = 1 ; note", ';'), "value = 1 ");
        assert_eq!(strip_comment(r#"text = "a;b" ; c"#, ';'), r#"text = "a;b" "#);
        assert_eq!(strip_comment("# all comment", '#'), "");
    }

    #[test]
    fn lines_from_positions() {
        let text = "a\nb\nc d";
        let cursor = SourceCursor::new(text);
        assert_eq!(cursor.line_at(text), 1);
        assert_eq!(cursor.line_at(&text[2..]), 2);
        assert_eq!(cursor.line_at("d"), 3);
        assert_eq!(cursor.line_at(""), 3);
    }

    #[test]
    fn syntax_from_extension() {
        assert_eq!(Syntax::from_path(Path::new("kfm.ZSS")), Syntax::Modern);
        assert_eq!(Syntax::from_path(Path::new("kfm.cns")), Syntax::Classic);
        assert_eq!(Syntax::from_path(Path::new("common1")), Syntax::Classic);
    }
}
