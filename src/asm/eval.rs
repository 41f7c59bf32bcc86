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

//! Left-to-right, no-precedence expression evaluator (spec section
//! 4.7): the assembler's arithmetic is intentionally simpler than a
//! real-world expression grammar, matching the flat scan style already
//! used by this crate's own [`crate::decoder`].

use crate::error::AsmErrorKind;

/// Resolves the symbols an expression can refer to: the current
/// address (`$`) and named labels/EQUs. Implemented by the assembler's
/// symbol tables so this module stays free of any pass-tracking state.
pub trait SymbolLookup {
    fn current_address(&self) -> u16;
    fn resolve(&self, name: &str) -> Result<i64, AsmErrorKind>;
}

/// Evaluate `expr` left-to-right with no operator precedence: `2+3*4`
/// is `(2+3)*4`, matching simple line assemblers rather than a
/// calculator grammar.
pub fn evaluate(expr: &str, symbols: &dyn SymbolLookup) -> Result<i64, AsmErrorKind> {
    let collapsed = collapse_signs(expr.trim());
    let terms = split_into_terms(&collapsed);
    let mut acc: Option<i64> = None;
    let mut pending_op: Option<char> = None;
    for term in terms {
        let (op, atom_text) = split_leading_op(term);
        let value = eval_atom(atom_text.trim(), symbols)?;
        acc = Some(match (acc, pending_op.or(op)) {
            (None, Some('-')) => -value,
            (None, _) => value,
            (Some(a), Some('+')) | (Some(a), None) => a + value,
            (Some(a), Some('-')) => a - value,
            (Some(a), Some('*')) => a * value,
            (Some(a), Some('/')) => {
                if value == 0 {
                    return Err(AsmErrorKind::DivideByZero);
                }
                a / value
            }
            (Some(a), Some('%')) => {
                if value == 0 {
                    return Err(AsmErrorKind::DivideByZero);
                }
                a % value
            }
            (Some(a), Some('&')) => a & value,
            (Some(a), Some('|')) => a | value,
            (Some(a), Some('^')) => a ^ value,
            (Some(a), Some(_)) => a,
        });
        pending_op = None;
    }
    acc.ok_or_else(|| AsmErrorKind::UnresolvedOperand(expr.to_string()))
}

/// Collapse runs of consecutive unary `+`/`-` signs into one: `--`
/// becomes `+`, `+-`/`-+` become `-`. Operates only on sign runs that
/// are not already glued to a preceding operand digit/identifier, i.e.
/// appear at the start of the expression or right after another
/// operator.
fn collapse_signs(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '+' || c == '-' {
            let mut negatives = 0;
            let mut signs = 0;
            let mut j = i;
            while j < chars.len() && (chars[j] == '+' || chars[j] == '-' || chars[j].is_whitespace()) {
                if chars[j] == '-' {
                    negatives += 1;
                }
                if chars[j] == '+' || chars[j] == '-' {
                    signs += 1;
                }
                j += 1;
            }
            if signs >= 2 {
                out.push(if negatives % 2 == 0 { '+' } else { '-' });
            } else {
                out.push(c);
            }
            i = j;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Split `expr` into terms on top-level `+ - * / % & | ^`, each term
/// retaining its leading operator character (if any) so the caller can
/// recover which operation joins it to the running accumulator.
fn split_into_terms(expr: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let bytes = expr.as_bytes();
    let mut start = 0;
    let mut in_squote = false;
    let is_op = |c: u8| matches!(c, b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^');
    for i in 0..bytes.len() {
        let c = bytes[i];
        if c == b'\'' {
            in_squote = !in_squote;
            continue;
        }
        if in_squote {
            continue;
        }
        if is_op(c) && i > start {
            terms.push(&expr[start..i]);
            start = i;
        }
    }
    if start < expr.len() {
        terms.push(&expr[start..]);
    }
    terms
}

fn split_leading_op(term: &str) -> (Option<char>, &str) {
    let mut chars = term.chars();
    match chars.next() {
        Some(c) if "+-*/%&|^".contains(c) => (Some(c), &term[c.len_utf8()..]),
        _ => (None, term),
    }
}

/// Evaluate a single atom: a numeric literal in any supported radix, a
/// character constant, `$` for the current address, or a label/EQU name.
fn eval_atom(atom: &str, symbols: &dyn SymbolLookup) -> Result<i64, AsmErrorKind> {
    if atom.is_empty() {
        return Err(AsmErrorKind::UnresolvedOperand(atom.to_string()));
    }
    if atom == "$" {
        return Ok(symbols.current_address() as i64);
    }
    if atom.len() == 3 && atom.starts_with('\'') && atom.ends_with('\'') {
        return Ok(atom.as_bytes()[1] as i64);
    }
    if let Some(hex) = atom.strip_prefix('&') {
        return i64::from_str_radix(hex, 16).map_err(|_| AsmErrorKind::UnresolvedOperand(atom.to_string()));
    }
    if let Some(hex) = atom.strip_suffix('h').or_else(|| atom.strip_suffix('H')) {
        if hex.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            return i64::from_str_radix(hex, 16).map_err(|_| AsmErrorKind::UnresolvedOperand(atom.to_string()));
        }
    }
    if let Some(bin) = atom.strip_prefix('%') {
        return i64::from_str_radix(bin, 2).map_err(|_| AsmErrorKind::UnresolvedOperand(atom.to_string()));
    }
    if let Some(bin) = atom.strip_suffix('b').or_else(|| atom.strip_suffix('B')) {
        if !bin.is_empty() && bin.chars().all(|c| c == '0' || c == '1') {
            return i64::from_str_radix(bin, 2).map_err(|_| AsmErrorKind::UnresolvedOperand(atom.to_string()));
        }
    }
    if let Ok(n) = atom.parse::<i64>() {
        return Ok(n);
    }
    symbols.resolve(atom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestSymbols {
        pc: u16,
        table: HashMap<String, i64>,
    }

    impl SymbolLookup for TestSymbols {
        fn current_address(&self) -> u16 {
            self.pc
        }
        fn resolve(&self, name: &str) -> Result<i64, AsmErrorKind> {
            self.table.get(name).copied().ok_or_else(|| AsmErrorKind::UnresolvedOperand(name.to_string()))
        }
    }

    fn symbols(pc: u16) -> TestSymbols {
        TestSymbols { pc, table: HashMap::new() }
    }

    #[test]
    fn decimal_literal() {
        assert_eq!(evaluate("42", &symbols(0)).unwrap(), 42);
    }

    #[test]
    fn ampersand_hex_literal() {
        assert_eq!(evaluate("&FF", &symbols(0)).unwrap(), 255);
    }

    #[test]
    fn h_suffix_hex_literal() {
        assert_eq!(evaluate("8000h", &symbols(0)).unwrap(), 0x8000);
    }

    #[test]
    fn percent_binary_literal() {
        assert_eq!(evaluate("%1010", &symbols(0)).unwrap(), 10);
    }

    #[test]
    fn b_suffix_binary_literal() {
        assert_eq!(evaluate("1010b", &symbols(0)).unwrap(), 10);
    }

    #[test]
    fn char_constant() {
        assert_eq!(evaluate("'A'", &symbols(0)).unwrap(), 65);
    }

    #[test]
    fn current_address_token() {
        assert_eq!(evaluate("$", &symbols(0x8010)).unwrap(), 0x8010);
    }

    #[test]
    fn left_to_right_no_precedence() {
        assert_eq!(evaluate("2+3*4", &symbols(0)).unwrap(), 20);
    }

    #[test]
    fn double_minus_collapses_to_plus() {
        assert_eq!(evaluate("5--3", &symbols(0)).unwrap(), 8);
    }

    #[test]
    fn plus_minus_collapses_to_minus() {
        assert_eq!(evaluate("5+-3", &symbols(0)).unwrap(), 2);
    }

    #[test]
    fn leading_unary_minus() {
        assert_eq!(evaluate("-5+10", &symbols(0)).unwrap(), 5);
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        assert_eq!(evaluate("10/0", &symbols(0)).unwrap_err(), AsmErrorKind::DivideByZero);
    }

    #[test]
    fn modulo_by_zero_is_an_error() {
        assert_eq!(evaluate("10%0", &symbols(0)).unwrap_err(), AsmErrorKind::DivideByZero);
    }

    #[test]
    fn label_resolution() {
        let mut s = symbols(0);
        s.table.insert("LOOP".to_string(), 0x9000);
        assert_eq!(evaluate("LOOP+4", &s).unwrap(), 0x9004);
    }

    #[test]
    fn unresolved_label_is_an_error() {
        let err = evaluate("MISSING", &symbols(0)).unwrap_err();
        assert_eq!(err, AsmErrorKind::UnresolvedOperand("MISSING".to_string()));
    }
}
