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

//! Operand normalisation (spec section 4.7): turns one raw source
//! operand into the candidate mnemonic-text fragment(s) to look up in
//! [`crate::asm::table`], plus whatever raw expression text pass 2
//! needs to fill in the matched placeholder.
//!
//! A normalised operand never corresponds 1:1 with `AddrMode`: which
//! candidate string a lookup actually matches (`"n"`, `"nn"`, `"e"`,
//! `"(n)"`, `"(nn)"`, `"(IX+d)"`, `"(IY+d)"`) is what later decides how
//! pass 2 fills in bytes, since `InstructionDef::mode1`/`mode2` do not
//! always line up positionally with the source operand order (e.g.
//! `"JR {cc},e"` has `mode1 = Relative` even though `e` is the second
//! operand textually).

const REGISTERS8: [&str; 8] = ["A", "B", "C", "D", "E", "H", "L", "(HL)"];
const REGISTERS16: [&str; 4] = ["BC", "DE", "HL", "SP"];
const REGISTERS16_AF: [&str; 4] = ["BC", "DE", "HL", "AF"];
pub(crate) const FLAGS: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];

/// Plain register/index/special-register names a label or EQU name may
/// never collide with (spec section 4.7 reserved-word rule); flags and
/// the `(HL)`-style indirect forms are listed separately.
pub(crate) const RESERVED_REGISTER_NAMES: [&str; 13] = ["A", "B", "C", "D", "E", "H", "L", "F", "BC", "DE", "HL", "SP", "AF"];
pub(crate) const RESERVED_INDEX_NAMES: [&str; 4] = ["IX", "IY", "I", "R"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperandKind {
    Register,
    RegisterPair,
    Flag,
    Indexed,
    Indirect,
    Relative,
    Immediate,
    Implied,
    Unresolved,
    UnresolvedIndirect,
}

/// One normalised operand: the candidate lookup text(s), the operand's
/// broad classification, and (when pass 2 needs to fill a placeholder
/// byte) the raw expression to evaluate then.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedOperand {
    pub candidates: Vec<String>,
    pub kind: OperandKind,
    pub raw_expr: Option<String>,
}

fn fixed(text: &str, kind: OperandKind) -> NormalizedOperand {
    NormalizedOperand { candidates: vec![text.to_string()], kind, raw_expr: None }
}

/// Normalise one already-trimmed operand string.
pub fn normalize_operand(raw: &str) -> NormalizedOperand {
    let trimmed = raw.trim();
    let upper = trimmed.to_uppercase();

    if upper.is_empty() {
        return NormalizedOperand { candidates: vec![], kind: OperandKind::Implied, raw_expr: None };
    }
    if REGISTERS8.contains(&upper.as_str()) {
        return fixed(&upper, OperandKind::Register);
    }
    if REGISTERS16.contains(&upper.as_str()) || REGISTERS16_AF.contains(&upper.as_str()) {
        return fixed(&upper, OperandKind::RegisterPair);
    }
    if FLAGS.contains(&upper.as_str()) {
        return fixed(&upper, OperandKind::Flag);
    }
    if upper == "(BC)" || upper == "(DE)" || upper == "(SP)" || upper == "(HL)" || upper == "I" || upper == "R" || upper == "(C)" {
        return fixed(&upper, OperandKind::Indirect);
    }

    if let Some(indexed) = normalize_indexed(trimmed, &upper) {
        return indexed;
    }

    if let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        return NormalizedOperand {
            candidates: vec!["(n)".to_string(), "(nn)".to_string()],
            kind: OperandKind::UnresolvedIndirect,
            raw_expr: Some(inner.trim().to_string()),
        };
    }

    NormalizedOperand {
        candidates: vec!["n".to_string(), "nn".to_string(), "e".to_string()],
        kind: OperandKind::Unresolved,
        raw_expr: Some(trimmed.to_string()),
    }
}

/// Recognise `(IX+d)`, `(IX-d)`, `(IY+d)`, `(IY-d)`, and the
/// zero-displacement `(IX)`/`(IY)` forms.
fn normalize_indexed(trimmed: &str, upper: &str) -> Option<NormalizedOperand> {
    let (reg, body) = if let Some(rest) = upper.strip_prefix("(IX") {
        ("IX", rest)
    } else if let Some(rest) = upper.strip_prefix("(IY") {
        ("IY", rest)
    } else {
        return None;
    };
    let body = body.strip_suffix(')')?;
    let offset_in_source = &trimmed[trimmed.len() - body.len() - 1..trimmed.len() - 1];
    let expr = if body.is_empty() { "0".to_string() } else { offset_in_source.trim_start_matches('+').to_string() };
    Some(NormalizedOperand {
        candidates: vec![format!("({}+d)", reg)],
        kind: OperandKind::Indexed,
        raw_expr: Some(expr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_operand() {
        let op = normalize_operand("a");
        assert_eq!(op.candidates, vec!["A".to_string()]);
        assert_eq!(op.kind, OperandKind::Register);
    }

    #[test]
    fn register_pair_operand() {
        let op = normalize_operand("hl");
        assert_eq!(op.candidates, vec!["HL".to_string()]);
        assert_eq!(op.kind, OperandKind::RegisterPair);
    }

    #[test]
    fn flag_operand() {
        let op = normalize_operand("nz");
        assert_eq!(op.candidates, vec!["NZ".to_string()]);
        assert_eq!(op.kind, OperandKind::Flag);
    }

    #[test]
    fn fixed_indirect_operand() {
        let op = normalize_operand("(hl)");
        assert_eq!(op.candidates, vec!["(HL)".to_string()]);
        assert_eq!(op.kind, OperandKind::Indirect);
    }

    #[test]
    fn indexed_operand_with_positive_displacement() {
        let op = normalize_operand("(IX+5)");
        assert_eq!(op.candidates, vec!["(IX+d)".to_string()]);
        assert_eq!(op.raw_expr, Some("5".to_string()));
    }

    #[test]
    fn indexed_operand_with_negative_displacement() {
        let op = normalize_operand("(IY-3)");
        assert_eq!(op.candidates, vec!["(IY+d)".to_string()]);
        assert_eq!(op.raw_expr, Some("-3".to_string()));
    }

    #[test]
    fn indexed_operand_with_zero_displacement() {
        let op = normalize_operand("(IX)");
        assert_eq!(op.candidates, vec!["(IX+d)".to_string()]);
        assert_eq!(op.raw_expr, Some("0".to_string()));
    }

    #[test]
    fn bare_parenthesised_expression_is_an_unresolved_indirect() {
        let op = normalize_operand("(8000h)");
        assert_eq!(op.candidates, vec!["(n)".to_string(), "(nn)".to_string()]);
        assert_eq!(op.kind, OperandKind::UnresolvedIndirect);
        assert_eq!(op.raw_expr, Some("8000h".to_string()));
    }

    #[test]
    fn bare_expression_is_unresolved_with_all_placeholder_candidates() {
        let op = normalize_operand("LABEL+1");
        assert_eq!(op.candidates, vec!["n".to_string(), "nn".to_string(), "e".to_string()]);
        assert_eq!(op.kind, OperandKind::Unresolved);
        assert_eq!(op.raw_expr, Some("LABEL+1".to_string()));
    }

    #[test]
    fn empty_operand_is_implied() {
        let op = normalize_operand("");
        assert!(op.candidates.is_empty());
        assert_eq!(op.kind, OperandKind::Implied);
    }
}
