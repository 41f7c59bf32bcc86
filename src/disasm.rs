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

//! Disassembler (spec section 4.6): walks a range of memory, skipping
//! declared data islands, formatting one line per instruction or data
//! run.

use crate::decoder::{DecodedInstruction, Decoder};
use crate::machine::Machine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Range {
    address: u16,
    length: usize,
}

impl Range {
    fn end(&self) -> u32 {
        self.address as u32 + self.length as u32
    }
    fn contains(&self, addr: u16) -> bool {
        let a = addr as u32;
        a >= self.address as u32 && a < self.end()
    }
}

pub struct Disassembler<'m> {
    machine: &'m Machine,
    start: u16,
    length: usize,
    non_executable: Vec<Range>,
}

impl<'m> Disassembler<'m> {
    pub fn new(machine: &'m Machine, start: u16, length: usize) -> Disassembler<'m> {
        Disassembler { machine, start, length, non_executable: Vec::new() }
    }

    pub fn add_non_executable_section(&mut self, address: u16, length: usize) {
        self.non_executable.push(Range { address, length });
    }

    /// Removes the non-executable section at `index`. `Ok(())` on
    /// success, `Err(())` if `index` is out of range.
    pub fn remove_non_executable_section(&mut self, index: usize) -> Result<(), ()> {
        if index < self.non_executable.len() {
            self.non_executable.remove(index);
            Ok(())
        } else {
            Err(())
        }
    }

    fn non_executable_range_at(&self, addr: u16) -> Option<Range> {
        self.non_executable.iter().find(|r| r.contains(addr)).copied()
    }

    /// Walk `[start, start + length)`, emitting one `(address, text)`
    /// tuple per instruction or per up-to-16-byte data-island line.
    pub fn disassemble(&self) -> Vec<(u16, String)> {
        let memory = self.machine.memory();
        let decoder = Decoder::new(memory, None);
        let end = self.start as u32 + self.length as u32;

        let mut lines = Vec::new();
        let mut addr = self.start;

        while (addr as u32) < end {
            if let Some(range) = self.non_executable_range_at(addr) {
                let chunk_end = (range.end().min(end)) as u16;
                let mut cursor = addr;
                while cursor < chunk_end {
                    let line_len = (chunk_end - cursor).min(16);
                    let bytes: Vec<u8> = (0..line_len).map(|i| memory.read(cursor + i)).collect();
                    let text = format!("DB {}", bytes.iter().map(|b| format!("{:02X}h", b)).collect::<Vec<_>>().join(", "));
                    lines.push((cursor, text));
                    cursor += line_len;
                }
                addr = chunk_end;
                continue;
            }

            match decoder.fetch(addr) {
                Ok(inst) => {
                    lines.push((addr, format_instruction(&inst)));
                    addr = inst.next_pc;
                }
                Err(_) => break,
            }
        }

        lines
    }
}

/// Substitute the instruction table's placeholder tokens with concrete
/// text (spec section 4.6).
fn format_instruction(inst: &DecodedInstruction) -> String {
    let mut text = inst.def.mnemonic.clone();

    if let Some(d) = inst.displacement {
        if text.contains("+d") {
            let replacement = if d >= 0 { format!("+{}", d) } else { format!("{}", d) };
            text = text.replace("+d", &replacement);
            // `(IX+0)`/`(IY+0)` collapse to `(IX)`/`(IY)`.
            text = text.replace("(IX+0)", "(IX)").replace("(IY+0)", "(IY)");
        } else if text.contains('e') {
            let target = inst.next_pc.wrapping_add(d as u16);
            text = replace_token(&text, 'e', &format!("{:04X}h", target));
        }
    }

    if let Some(n) = inst.imm8 {
        text = replace_token(&text, 'n', &format!("{:02X}h", n));
    }
    if let Some(nn) = inst.imm16 {
        text = text.replace("nn", &format!("{:04X}h", nn));
    }

    text
}

/// Replace a single-character placeholder token (`n` or `e`) that
/// appears as its own word, not as part of a register name like `n`
/// inside "IX" never occurs, but this guards against replacing inside
/// a longer identifier in general.
fn replace_token(text: &str, token: char, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let prev_is_word = i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '\'');
        let next_is_word = i + 1 < chars.len() && chars[i + 1].is_alphanumeric();
        if c == token && !prev_is_word && !next_is_word {
            out.push_str(replacement);
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with(bytes: &[u8], addr: u16) -> Machine {
        let mut m = Machine::new(None);
        m.load_executable(bytes, addr, true).unwrap();
        m
    }

    #[test]
    fn disassembles_a_simple_sequence() {
        let m = machine_with(&[0x3E, 0x05, 0x80], 0x8000);
        let lines = Disassembler::new(&m, 0x8000, 3).disassemble();
        assert_eq!(lines[0], (0x8000, "LD A,05h".to_string()));
        assert_eq!(lines[1], (0x8002, "ADD A,B".to_string()));
    }

    #[test]
    fn extended_immediate_formats_as_four_digit_hex() {
        let m = machine_with(&[0x21, 0x34, 0x12], 0x8000);
        let lines = Disassembler::new(&m, 0x8000, 3).disassemble();
        assert_eq!(lines[0], (0x8000, "LD HL,1234h".to_string()));
    }

    #[test]
    fn relative_jump_formats_as_absolute_target() {
        let m = machine_with(&[0x18, 0x02], 0x0200);
        let lines = Disassembler::new(&m, 0x0200, 2).disassemble();
        assert_eq!(lines[0], (0x0200, "JR 0204h".to_string()));
    }

    #[test]
    fn indexed_displacement_formats_signed() {
        let m = machine_with(&[0xDD, 0x7E, 0xFE], 0x8000); // LD A,(IX-2)
        let lines = Disassembler::new(&m, 0x8000, 3).disassemble();
        assert_eq!(lines[0], (0x8000, "LD A,(IX-2)".to_string()));
    }

    #[test]
    fn zero_displacement_collapses_parens() {
        let m = machine_with(&[0xDD, 0x7E, 0x00], 0x8000);
        let lines = Disassembler::new(&m, 0x8000, 3).disassemble();
        assert_eq!(lines[0], (0x8000, "LD A,(IX)".to_string()));
    }

    #[test]
    fn declared_data_island_emits_db_lines() {
        let m = machine_with(&[0x00, 0x01, 0x02, 0x03, 0x00], 0x8000);
        let mut disasm = Disassembler::new(&m, 0x8000, 5);
        disasm.add_non_executable_section(0x8001, 3);
        let lines = disasm.disassemble();
        assert_eq!(lines[0], (0x8000, "NOP".to_string()));
        assert_eq!(lines[1], (0x8001, "DB 01h, 02h, 03h".to_string()));
        assert_eq!(lines[2], (0x8004, "NOP".to_string()));
    }

    #[test]
    fn removing_out_of_range_section_is_an_error() {
        let m = machine_with(&[0x00], 0x8000);
        let mut disasm = Disassembler::new(&m, 0x8000, 1);
        assert!(disasm.remove_non_executable_section(0).is_err());
    }
}
