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

//! Two-pass assembler (spec section 4.7): pass 1 tokenises every line,
//! builds the label/EQU tables, and emits placeholder bytes; pass 2
//! re-evaluates expressions now that every symbol is known and fills
//! the placeholders in.

use std::collections::HashMap;

use log::{info, warn};

use crate::asm::eval::{evaluate, SymbolLookup};
use crate::asm::lexer::{directive_name, tokenize_line, Line, LineBody};
use crate::asm::operand::{normalize_operand, NormalizedOperand, OperandKind, FLAGS, RESERVED_INDEX_NAMES, RESERVED_REGISTER_NAMES};
use crate::asm::table::{instruction_index, AsmInstruction};
use crate::error::{AsmError, AsmErrorKind};
use crate::tables::Prefix;

/// What kind of placeholder byte(s) a matched operand still needs
/// filled in during pass 2; which category applies is decided by
/// which candidate token text the operand matched, not by its
/// position (spec section 4.7 notes `mode1`/`mode2` don't always line
/// up with source operand order).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FillKind {
    Imm8,
    Imm16,
    Relative,
    Displacement,
}

#[derive(Clone, Debug)]
struct Fill {
    kind: FillKind,
    raw_expr: String,
    /// Offset of the placeholder byte(s) within the instruction's
    /// emitted byte sequence.
    offset: usize,
}

#[derive(Clone, Debug)]
enum DataFill {
    Byte { offset: usize, raw_expr: String },
    Word { offset: usize, raw_expr: String },
}

enum Record {
    Instruction { line: usize, address: u16, bytes: Vec<u8>, fills: Vec<Fill> },
    Data { line: usize, address: u16, bytes: Vec<u8>, fills: Vec<DataFill> },
}

/// Resolves `$` and label/EQU names against the tables pass 1 built.
struct Symbols<'a> {
    address: u16,
    labels: &'a HashMap<String, u16>,
    equates: &'a HashMap<String, String>,
    resolving: Vec<String>,
}

impl<'a> Symbols<'a> {
    fn new(address: u16, labels: &'a HashMap<String, u16>, equates: &'a HashMap<String, String>) -> Symbols<'a> {
        Symbols { address, labels, equates, resolving: Vec::new() }
    }
}

impl<'a> SymbolLookup for Symbols<'a> {
    fn current_address(&self) -> u16 {
        self.address
    }

    fn resolve(&self, name: &str) -> Result<i64, AsmErrorKind> {
        let upper = name.to_uppercase();
        if let Some(addr) = self.labels.get(&upper) {
            return Ok(*addr as i64);
        }
        if let Some(expr) = self.equates.get(&upper) {
            if self.resolving.contains(&upper) {
                return Err(AsmErrorKind::UnresolvedOperand(name.to_string()));
            }
            let mut nested = Symbols { address: self.address, labels: self.labels, equates: self.equates, resolving: self.resolving.clone() };
            nested.resolving.push(upper);
            return evaluate(expr, &nested);
        }
        Err(AsmErrorKind::UnresolvedOperand(name.to_string()))
    }
}

fn is_reserved(name: &str) -> bool {
    let upper = name.to_uppercase();
    RESERVED_REGISTER_NAMES.contains(&upper.as_str())
        || RESERVED_INDEX_NAMES.contains(&upper.as_str())
        || FLAGS.contains(&upper.as_str())
        || directive_name(&upper).is_some()
        || upper == "ORG"
        || upper == "EQU"
        || instruction_index().is_mnemonic_keyword(&upper)
}

#[derive(Clone, Copy)]
enum LiteralRole {
    BitIndex,
    Rst,
    Im,
}

fn literal_role(mnemonic: &str, index: usize, operand_count: usize) -> Option<LiteralRole> {
    match mnemonic {
        "BIT" | "RES" | "SET" if index == 0 => Some(LiteralRole::BitIndex),
        "RST" if index == 0 && operand_count == 1 => Some(LiteralRole::Rst),
        "IM" if index == 0 && operand_count == 1 => Some(LiteralRole::Im),
        _ => None,
    }
}

/// Per-operand candidate lookup texts, with RST/BIT/RES/SET/IM's
/// literal numeric forms appended when they evaluate cleanly in pass 1
/// (these directives never support a forward reference).
fn candidate_lists(mnemonic: &str, operands: &[NormalizedOperand], symbols: &dyn SymbolLookup) -> Vec<Vec<String>> {
    operands
        .iter()
        .enumerate()
        .map(|(i, op)| {
            let mut list = op.candidates.clone();
            if let (Some(role), Some(raw)) = (literal_role(mnemonic, i, operands.len()), op.raw_expr.as_deref()) {
                if let Ok(n) = evaluate(raw, symbols) {
                    let literal = match role {
                        LiteralRole::BitIndex | LiteralRole::Im => format!("{}", n),
                        LiteralRole::Rst => format!("{:02X}h", n),
                    };
                    list.push(literal);
                }
            }
            list
        })
        .collect()
}

fn find_match(mnemonic: &str, lists: &[Vec<String>]) -> Option<(&'static AsmInstruction, Vec<String>)> {
    let index = instruction_index();
    match lists.len() {
        0 => index.lookup(mnemonic).map(|ins| (ins, Vec::new())),
        1 => lists[0].iter().find_map(|c0| {
            let text = format!("{} {}", mnemonic, c0);
            index.lookup(&text).map(|ins| (ins, vec![c0.clone()]))
        }),
        _ => {
            for c0 in &lists[0] {
                for c1 in &lists[1] {
                    let text = format!("{} {},{}", mnemonic, c0, c1);
                    if let Some(ins) = index.lookup(&text) {
                        return Some((ins, vec![c0.clone(), c1.clone()]));
                    }
                }
            }
            None
        }
    }
}

fn fill_kind_for(candidate: &str) -> Option<FillKind> {
    match candidate {
        "n" => Some(FillKind::Imm8),
        "(n)" => Some(FillKind::Imm8),
        "nn" => Some(FillKind::Imm16),
        "(nn)" => Some(FillKind::Imm16),
        "e" => Some(FillKind::Relative),
        "(IX+d)" | "(IY+d)" => Some(FillKind::Displacement),
        _ => None,
    }
}

fn prefix_bytes(prefix: Prefix) -> &'static [u8] {
    match prefix {
        Prefix::None => &[],
        Prefix::Cb => &[0xCB],
        Prefix::Ed => &[0xED],
        Prefix::Dd => &[0xDD],
        Prefix::Fd => &[0xFD],
        Prefix::DdCb => &[0xDD, 0xCB],
        Prefix::FdCb => &[0xFD, 0xCB],
    }
}

/// Assemble the matched instruction's byte layout with zeroed
/// placeholders, recording where pass 2 must write real values.
fn encode_instruction(matched: &AsmInstruction, operands: &[NormalizedOperand], chosen: &[String]) -> (Vec<u8>, Vec<Fill>) {
    let def = &matched.def;
    let mut fills = Vec::new();
    let operand_for = |kind: FillKind| chosen.iter().position(|c| fill_kind_for(c) == Some(kind));

    let mut bytes = Vec::new();
    bytes.extend_from_slice(prefix_bytes(matched.prefix));

    if matches!(matched.prefix, Prefix::DdCb | Prefix::FdCb) {
        let disp_offset = bytes.len();
        bytes.push(0);
        bytes.push(def.opcode);
        if let Some(idx) = operand_for(FillKind::Displacement) {
            fills.push(Fill { kind: FillKind::Displacement, raw_expr: operands[idx].raw_expr.clone().unwrap_or_default(), offset: disp_offset });
        }
        return (bytes, fills);
    }

    bytes.push(def.opcode);

    if let Some(idx) = operand_for(FillKind::Displacement) {
        let offset = bytes.len();
        bytes.push(0);
        fills.push(Fill { kind: FillKind::Displacement, raw_expr: operands[idx].raw_expr.clone().unwrap_or_default(), offset });
    } else if let Some(idx) = operand_for(FillKind::Relative) {
        let offset = bytes.len();
        bytes.push(0);
        fills.push(Fill { kind: FillKind::Relative, raw_expr: operands[idx].raw_expr.clone().unwrap_or_default(), offset });
    }

    if let Some(idx) = operand_for(FillKind::Imm8) {
        let offset = bytes.len();
        bytes.push(0);
        fills.push(Fill { kind: FillKind::Imm8, raw_expr: operands[idx].raw_expr.clone().unwrap_or_default(), offset });
    }

    if let Some(idx) = operand_for(FillKind::Imm16) {
        let offset = bytes.len();
        bytes.push(0);
        bytes.push(0);
        fills.push(Fill { kind: FillKind::Imm16, raw_expr: operands[idx].raw_expr.clone().unwrap_or_default(), offset });
    }

    (bytes, fills)
}

fn range_check_8bit(v: i64) -> bool {
    (-128..=255).contains(&v)
}

fn range_check_16bit(v: i64) -> bool {
    (-32768..=65535).contains(&v)
}

pub struct Assembler;

/// Result of [`Assembler::assemble`] (spec section 6).
pub struct AssembledProgram {
    pub success: bool,
    pub start_address: u16,
    pub bytes: Vec<u8>,
    pub errors: Vec<AsmError>,
    pub data_segments: Vec<(u16, usize)>,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler
    }

    pub fn assemble(&self, source_lines: &[String]) -> AssembledProgram {
        info!("Assembling {} source line(s).", source_lines.len());

        let mut labels: HashMap<String, u16> = HashMap::new();
        let mut equates: HashMap<String, String> = HashMap::new();
        let mut errors: Vec<AsmError> = Vec::new();
        let mut records: Vec<Record> = Vec::new();
        let mut data_segments: Vec<(u16, usize)> = Vec::new();

        let mut address: u32 = 0;
        let mut fatal = false;

        for (zero_based, raw) in source_lines.iter().enumerate() {
            if fatal {
                break;
            }
            let line_no = zero_based + 1;
            let tokenized = tokenize_line(raw);

            if let Some(label) = &tokenized.label {
                if let Err(kind) = self.define_label(label, address as u16, &labels, &equates) {
                    errors.push(AsmError::new(line_no, kind));
                } else {
                    labels.insert(label.to_uppercase(), address as u16);
                }
            }

            match &tokenized.body {
                LineBody::Blank => {}
                LineBody::Org(expr) => match self.eval_org(expr, address as u16, &labels, &equates) {
                    Ok(new_addr) => address = new_addr as u32,
                    Err(kind) => errors.push(AsmError::new(line_no, kind)),
                },
                LineBody::Equ { name, expr } => {
                    if let Err(kind) = self.define_equ(name, expr, &equates) {
                        errors.push(AsmError::new(line_no, kind));
                    } else {
                        equates.insert(name.to_uppercase(), expr.clone());
                    }
                }
                LineBody::Data { directive, operands } => {
                    match self.assemble_data(directive, operands, address as u16, &labels, &equates, line_no) {
                        Ok((bytes, fills)) => {
                            let len = bytes.len();
                            if address as usize + len > 0x1_0000 {
                                errors.push(AsmError::new(line_no, AsmErrorKind::AddressOutOfRange));
                                fatal = true;
                                break;
                            }
                            data_segments.push((address as u16, len));
                            records.push(Record::Data { line: line_no, address: address as u16, bytes, fills });
                            address += len as u32;
                        }
                        Err(kind) => {
                            let is_fatal = matches!(kind, AsmErrorKind::AddressOutOfRange);
                            errors.push(AsmError::new(line_no, kind));
                            if is_fatal {
                                fatal = true;
                                break;
                            }
                        }
                    }
                }
                LineBody::Instruction { mnemonic, operands } => {
                    let symbols = Symbols::new(address as u16, &labels, &equates);
                    let normalized: Vec<NormalizedOperand> = operands.iter().map(|o| normalize_operand(o)).collect();
                    let lists = candidate_lists(mnemonic, &normalized, &symbols);
                    match find_match(mnemonic, &lists) {
                        Some((matched, chosen)) => {
                            let (bytes, fills) = encode_instruction(matched, &normalized, &chosen);
                            let len = bytes.len();
                            if address as usize + len > 0x1_0000 {
                                errors.push(AsmError::new(line_no, AsmErrorKind::AddressOutOfRange));
                                fatal = true;
                                break;
                            }
                            records.push(Record::Instruction { line: line_no, address: address as u16, bytes, fills });
                            address += len as u32;
                        }
                        None => {
                            errors.push(AsmError::new(line_no, AsmErrorKind::UnrecognisedInstruction(format!("{} {}", mnemonic, operands.join(",")))));
                        }
                    }
                }
            }
        }

        if fatal {
            return AssembledProgram { success: false, start_address: 0, bytes: Vec::new(), errors, data_segments };
        }

        // Pass 2: re-evaluate every recorded fill now that all labels/EQUs exist.
        for record in &mut records {
            match record {
                Record::Instruction { line, address, bytes, fills } => {
                    for fill in fills.iter() {
                        let symbols = Symbols::new(*address, &labels, &equates);
                        match resolve_instruction_fill(fill, *address, bytes.len() as u16, &symbols) {
                            Ok(encoded) => {
                                for (i, b) in encoded.iter().enumerate() {
                                    bytes[fill.offset + i] = *b;
                                }
                            }
                            Err(kind) => errors.push(AsmError::new(*line, kind)),
                        }
                    }
                }
                Record::Data { line, address, bytes, fills } => {
                    let symbols = Symbols::new(*address, &labels, &equates);
                    for fill in fills.iter() {
                        match fill {
                            DataFill::Byte { offset, raw_expr } => match evaluate(raw_expr, &symbols) {
                                Ok(v) if range_check_8bit(v) => bytes[*offset] = v as u8,
                                Ok(v) => errors.push(AsmError::new(*line, AsmErrorKind::DataValueOutOfRange(v))),
                                Err(kind) => errors.push(AsmError::new(*line, kind)),
                            },
                            DataFill::Word { offset, raw_expr } => match evaluate(raw_expr, &symbols) {
                                Ok(v) if range_check_16bit(v) => {
                                    let word = v as u16;
                                    bytes[*offset] = (word & 0xFF) as u8;
                                    bytes[*offset + 1] = (word >> 8) as u8;
                                }
                                Ok(v) => errors.push(AsmError::new(*line, AsmErrorKind::DataValueOutOfRange(v))),
                                Err(kind) => errors.push(AsmError::new(*line, kind)),
                            },
                        }
                    }
                }
            }
        }

        if records.is_empty() {
            return AssembledProgram { success: errors.is_empty(), start_address: 0, bytes: Vec::new(), errors, data_segments };
        }

        let start_address = records.iter().map(|r| record_address(r)).min().unwrap();
        let end_address = records.iter().map(|r| record_address(r) as u32 + record_len(r) as u32).max().unwrap();
        let mut image = vec![0u8; (end_address - start_address as u32) as usize];
        for record in &records {
            let (addr, bytes) = match record {
                Record::Instruction { address, bytes, .. } => (*address, bytes),
                Record::Data { address, bytes, .. } => (*address, bytes),
            };
            let offset = (addr - start_address) as usize;
            image[offset..offset + bytes.len()].copy_from_slice(bytes);
        }

        if !errors.is_empty() {
            warn!("Assembly produced {} error(s).", errors.len());
        }
        AssembledProgram { success: errors.is_empty(), start_address, bytes: image, errors, data_segments }
    }

    fn define_label(&self, label: &str, _address: u16, labels: &HashMap<String, u16>, equates: &HashMap<String, String>) -> Result<(), AsmErrorKind> {
        let upper = label.to_uppercase();
        if is_reserved(&upper) {
            return Err(AsmErrorKind::ReservedWordCollision(label.to_string()));
        }
        if labels.contains_key(&upper) {
            return Err(AsmErrorKind::DuplicateLabel(label.to_string()));
        }
        if equates.contains_key(&upper) {
            return Err(AsmErrorKind::DuplicateLabel(label.to_string()));
        }
        Ok(())
    }

    fn define_equ(&self, name: &str, _expr: &str, equates: &HashMap<String, String>) -> Result<(), AsmErrorKind> {
        let upper = name.to_uppercase();
        if is_reserved(&upper) {
            return Err(AsmErrorKind::ReservedWordCollision(name.to_string()));
        }
        if equates.contains_key(&upper) {
            return Err(AsmErrorKind::EquRedefinition(name.to_string()));
        }
        Ok(())
    }

    fn eval_org(&self, expr: &str, address: u16, labels: &HashMap<String, u16>, equates: &HashMap<String, String>) -> Result<u16, AsmErrorKind> {
        let symbols = Symbols::new(address, labels, equates);
        let value = evaluate(expr, &symbols).map_err(|_| AsmErrorKind::InvalidOrg)?;
        if !(0..=0xFFFF).contains(&value) {
            return Err(AsmErrorKind::OrgOutOfRange);
        }
        Ok(value as u16)
    }

    fn assemble_data(
        &self,
        directive: &str,
        operands: &[String],
        address: u16,
        labels: &HashMap<String, u16>,
        equates: &HashMap<String, String>,
        line_no: usize,
    ) -> Result<(Vec<u8>, Vec<DataFill>), AsmErrorKind> {
        let _ = line_no;
        match directive {
            "DB" | "DEFB" | "DM" | "DEFM" => {
                let mut bytes = Vec::new();
                let mut fills = Vec::new();
                for operand in operands {
                    let trimmed = operand.trim();
                    if let Some(inner) = string_literal(trimmed) {
                        bytes.extend(inner.bytes());
                    } else {
                        fills.push(DataFill::Byte { offset: bytes.len(), raw_expr: trimmed.to_string() });
                        bytes.push(0);
                    }
                }
                Ok((bytes, fills))
            }
            "DW" | "DEFW" => {
                let mut bytes = Vec::new();
                let mut fills = Vec::new();
                for operand in operands {
                    fills.push(DataFill::Word { offset: bytes.len(), raw_expr: operand.trim().to_string() });
                    bytes.push(0);
                    bytes.push(0);
                }
                Ok((bytes, fills))
            }
            "DS" | "DEFS" => {
                let symbols = Symbols::new(address, labels, equates);
                let size_expr = operands.first().ok_or_else(|| AsmErrorKind::InvalidDataValue(String::new()))?;
                let size = evaluate(size_expr, &symbols).map_err(|_| AsmErrorKind::InvalidDataValue(size_expr.clone()))?;
                if size < 0 || size > 0xFFFF {
                    return Err(AsmErrorKind::DataValueOutOfRange(size));
                }
                let fill = match operands.get(1) {
                    Some(expr) => {
                        let v = evaluate(expr, &symbols)?;
                        if !range_check_8bit(v) {
                            return Err(AsmErrorKind::DataValueOutOfRange(v));
                        }
                        v as u8
                    }
                    None => 0,
                };
                Ok((vec![fill; size as usize], Vec::new()))
            }
            other => Err(AsmErrorKind::InvalidDataValue(other.to_string())),
        }
    }
}

impl Default for Assembler {
    fn default() -> Assembler {
        Assembler::new()
    }
}

fn string_literal(text: &str) -> Option<&str> {
    if text.len() >= 2 {
        let bytes = text.as_bytes();
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'' && text.len() != 3) {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}

fn record_address(record: &Record) -> u16 {
    match record {
        Record::Instruction { address, .. } => *address,
        Record::Data { address, .. } => *address,
    }
}

fn record_len(record: &Record) -> usize {
    match record {
        Record::Instruction { bytes, .. } => bytes.len(),
        Record::Data { bytes, .. } => bytes.len(),
    }
}

/// Evaluate one instruction fill and return its encoded bytes.
fn resolve_instruction_fill(fill: &Fill, instruction_address: u16, instruction_len: u16, symbols: &Symbols) -> Result<Vec<u8>, AsmErrorKind> {
    let value = evaluate(&fill.raw_expr, symbols)?;
    match fill.kind {
        FillKind::Imm8 => {
            if !range_check_8bit(value) {
                return Err(AsmErrorKind::OperandOutOfRange(value));
            }
            Ok(vec![value as u8])
        }
        FillKind::Imm16 => {
            if !range_check_16bit(value) {
                return Err(AsmErrorKind::OperandOutOfRange(value));
            }
            let word = value as u16;
            Ok(vec![(word & 0xFF) as u8, (word >> 8) as u8])
        }
        FillKind::Relative => {
            let rel = value - instruction_address as i64 - instruction_len as i64;
            if !(-128..=127).contains(&rel) {
                return Err(AsmErrorKind::DisplacementOutOfRange(rel));
            }
            Ok(vec![rel as i8 as u8])
        }
        FillKind::Displacement => {
            if !(-128..=127).contains(&value) {
                return Err(AsmErrorKind::DisplacementOutOfRange(value));
            }
            Ok(vec![value as i8 as u8])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<String> {
        src.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn simple_program_assembles_to_expected_bytes() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("ORG 8000h\nLD A,5\nADD A,B"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.start_address, 0x8000);
        assert_eq!(result.bytes, vec![0x3E, 0x05, 0x80]);
    }

    #[test]
    fn forward_reference_resolves_in_pass_two() {
        // Scenario F.
        let asm = Assembler::new();
        let result = asm.assemble(&lines("ORG 8000h\nLD HL,L1\nRET\nL1: DB 42h"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![0x21, 0x04, 0x80, 0xC9, 0x42]);
    }

    #[test]
    fn relative_jump_resolves_against_a_label() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("ORG 0200h\nLOOP: DJNZ LOOP"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![0x10, 0xFE]);
    }

    #[test]
    fn indexed_instruction_with_immediate_resolves_both_fills() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("LD (IX+5),99"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![0xDD, 0x36, 0x05, 0x63]);
    }

    #[test]
    fn bit_instruction_bakes_its_literal_into_the_opcode_selection() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("BIT 3,A"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![0xCB, 0x5F]);
    }

    #[test]
    fn rst_instruction_resolves_its_vector() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("RST 08h"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![0xCF]);
    }

    #[test]
    fn duplicate_label_is_reported() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("L1: NOP\nL1: NOP"));
        assert!(!result.success);
        assert!(matches!(result.errors[0].kind, AsmErrorKind::DuplicateLabel(_)));
    }

    #[test]
    fn reserved_word_label_is_reported() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("HL: NOP"));
        assert!(!result.success);
        assert!(matches!(result.errors[0].kind, AsmErrorKind::ReservedWordCollision(_)));
    }

    #[test]
    fn unresolved_instruction_is_reported() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("FROB A,B"));
        assert!(!result.success);
        assert!(matches!(result.errors[0].kind, AsmErrorKind::UnrecognisedInstruction(_)));
    }

    #[test]
    fn equ_value_is_usable_in_later_expressions() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("WIDTH EQU 10\nLD A,WIDTH"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![0x3E, 0x0A]);
    }

    #[test]
    fn db_directive_mixes_strings_and_numbers() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("DB \"AB\", 0"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![b'A', b'B', 0]);
    }

    #[test]
    fn ds_directive_reserves_filled_space() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("DS 4, 0FFh"));
        assert!(result.success, "errors: {:?}", result.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>());
        assert_eq!(result.bytes, vec![0xFF; 4]);
        assert_eq!(result.data_segments, vec![(0, 4)]);
    }

    #[test]
    fn out_of_range_immediate_is_reported() {
        let asm = Assembler::new();
        let result = asm.assemble(&lines("LD A,300"));
        assert!(!result.success);
        assert!(matches!(result.errors[0].kind, AsmErrorKind::OperandOutOfRange(_)));
    }
}
