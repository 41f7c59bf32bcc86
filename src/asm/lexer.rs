// Copyright (c) 2017, 2018, 2023 Marek Benc <benc.marek.elektro98@proton.me>
//
// Permission to use, copy, modify, and distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR DISCLAIMS ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
//

//! Line tokenising (spec section 4.7): comments, labels, EQU/`=`
//! definitions, directives, and comma-separated operand lists, all
//! quote-aware so that `DB "a, b", 0` splits on the right commas.

const DIRECTIVES: [&str; 8] = ["DB", "DEFB", "DM", "DEFM", "DW", "DEFW", "DS", "DEFS"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineBody {
    Blank,
    Org(String),
    Equ { name: String, expr: String },
    Data { directive: String, operands: Vec<String> },
    Instruction { mnemonic: String, operands: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub label: Option<String>,
    pub body: LineBody,
}

pub fn directive_name(word: &str) -> Option<&'static str> {
    let upper = word.to_uppercase();
    DIRECTIVES.iter().find(|d| **d == upper).copied()
}

/// Strip a `;`-introduced comment, honouring quoted strings.
fn strip_comment(line: &str) -> &str {
    let mut in_squote = false;
    let mut in_dquote = false;
    for (i, c) in line.char_indices() {
        match c {
            '\'' if !in_dquote => in_squote = !in_squote,
            '"' if !in_squote => in_dquote = !in_dquote,
            ';' if !in_squote && !in_dquote => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split `text` on top-level commas, leaving quoted sections intact.
pub fn split_operands(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut operands = Vec::new();
    let mut current = String::new();
    let mut in_squote = false;
    let mut in_dquote = false;
    let mut depth = 0i32;
    for c in trimmed.chars() {
        match c {
            '\'' if !in_dquote => {
                in_squote = !in_squote;
                current.push(c);
            }
            '"' if !in_squote => {
                in_dquote = !in_dquote;
                current.push(c);
            }
            '(' if !in_squote && !in_dquote => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_squote && !in_dquote => {
                depth -= 1;
                current.push(c);
            }
            ',' if !in_squote && !in_dquote && depth == 0 => {
                operands.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    operands.push(current.trim().to_string());
    operands
}

/// Split `name EQU expr` or `name = expr`, case-insensitively on `EQU`.
fn try_split_equ(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if let Some(eq_pos) = trimmed.find('=') {
        let (name, rest) = trimmed.split_at(eq_pos);
        let name = name.trim();
        let expr = rest[1..].trim();
        if !name.is_empty() && is_identifier(name) && !expr.is_empty() {
            return Some((name.to_string(), expr.to_string()));
        }
    }
    let mut words = trimmed.splitn(3, char::is_whitespace);
    let name = words.next()?;
    let rest = trimmed[name.len()..].trim_start();
    let mut rest_words = rest.splitn(2, char::is_whitespace);
    let keyword = rest_words.next()?;
    if keyword.eq_ignore_ascii_case("EQU") && is_identifier(name) {
        let expr = rest_words.next().unwrap_or("").trim();
        if !expr.is_empty() {
            return Some((name.to_string(), expr.to_string()));
        }
    }
    None
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Extract a leading `label:`, if the line starts with one.
fn split_label(line: &str) -> (Option<String>, &str) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i] as char).is_whitespace() {
        i += 1;
    }
    let start = i;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == ':' {
            let label = &line[start..i];
            if is_identifier(label) {
                return (Some(label.to_string()), line[i + 1..].trim_start());
            }
            return (None, line);
        }
        if c.is_whitespace() {
            break;
        }
        i += 1;
    }
    (None, line)
}

/// Tokenise one line of source (spec section 4.7). Returns `None` for a
/// blank or comment-only line; callers track their own line numbers.
pub fn tokenize_line(raw: &str) -> Line {
    let without_comment = strip_comment(raw);
    if let Some((name, expr)) = try_split_equ(without_comment) {
        return Line { label: None, body: LineBody::Equ { name, expr } };
    }

    let (label, remainder) = split_label(without_comment);
    let remainder = remainder.trim();
    if remainder.is_empty() {
        return Line { label, body: LineBody::Blank };
    }

    let mut parts = remainder.splitn(2, char::is_whitespace);
    let mnemonic = parts.next().unwrap_or("").to_string();
    let rest = parts.next().unwrap_or("").trim();

    if mnemonic.eq_ignore_ascii_case("ORG") {
        return Line { label, body: LineBody::Org(rest.to_string()) };
    }
    if let Some(directive) = directive_name(&mnemonic) {
        return Line { label, body: LineBody::Data { directive: directive.to_string(), operands: split_operands(rest) } };
    }
    Line { label, body: LineBody::Instruction { mnemonic: mnemonic.to_uppercase(), operands: split_operands(rest) } }
}
