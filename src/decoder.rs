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

//! Instruction fetch (spec section 4.4): turns the byte stream at PC
//! into a [`DecodedInstruction`], consuming prefix, displacement, and
//! immediate bytes in the order the Z80 actually encodes them.

use log::warn;

use crate::error::RuntimeError;
use crate::memory::Memory;
use crate::tables::{tables, AddrMode, InstructionDef, Prefix};

/// One fully-fetched instruction, ready for the executor.
#[derive(Clone, Debug)]
pub struct DecodedInstruction {
    pub address: u16,
    pub prefix: Prefix,
    pub def: InstructionDef,
    /// Signed displacement for Relative/Indexed addressing.
    pub displacement: Option<i8>,
    pub imm8: Option<u8>,
    pub imm16: Option<u16>,
    /// Address immediately after the fully-fetched instruction.
    pub next_pc: u16,
}

impl DecodedInstruction {
    pub fn len(&self) -> u16 {
        self.next_pc.wrapping_sub(self.address)
    }
}

pub struct Decoder<'m> {
    memory: &'m Memory,
    /// Exclusive upper bound past which a fetch is out-of-data. `None`
    /// means unrestricted (used by the disassembler, which is allowed
    /// to read anywhere in the 64 KiB space).
    limit: Option<u16>,
}

impl<'m> Decoder<'m> {
    pub fn new(memory: &'m Memory, limit: Option<u16>) -> Decoder<'m> {
        Decoder { memory, limit }
    }

    fn in_range(&self, addr: u16) -> bool {
        match self.limit {
            Some(limit) => addr < limit,
            None => true,
        }
    }

    fn fetch_u8(&self, pc: &mut u16, start: u16) -> Result<u8, RuntimeError> {
        if !self.in_range(*pc) {
            warn!("fetch at {:#06x} ran past the end of the loaded region (instruction started at {:#06x})", pc, start);
            return Err(RuntimeError::OutOfData { pc: start });
        }
        let byte = self.memory.read(*pc);
        *pc = pc.wrapping_add(1);
        Ok(byte)
    }

    /// Fetch and decode the instruction at `pc`.
    pub fn fetch(&self, pc: u16) -> Result<DecodedInstruction, RuntimeError> {
        let start = pc;
        let mut cursor = pc;

        let first = self.fetch_u8(&mut cursor, start)?;
        let (prefix, opcode) = match first {
            0xCB => (Prefix::Cb, self.fetch_u8(&mut cursor, start)?),
            0xED => (Prefix::Ed, self.fetch_u8(&mut cursor, start)?),
            0xDD | 0xFD => {
                let base = if first == 0xDD { Prefix::Dd } else { Prefix::Fd };
                let second = self.fetch_u8(&mut cursor, start)?;
                if second == 0xCB {
                    // DD CB / FD CB: displacement precedes the opcode byte.
                    let displacement = self.fetch_u8(&mut cursor, start)? as i8;
                    let opcode = self.fetch_u8(&mut cursor, start)?;
                    let cb_prefix = if first == 0xDD { Prefix::DdCb } else { Prefix::FdCb };
                    let def = tables().table_for(cb_prefix)[opcode as usize].clone();
                    return Ok(DecodedInstruction {
                        address: start,
                        prefix: cb_prefix,
                        def,
                        displacement: Some(displacement),
                        imm8: None,
                        imm16: None,
                        next_pc: cursor,
                    });
                }
                (base, second)
            }
            other => (Prefix::None, other),
        };

        let def = tables().table_for(prefix)[opcode as usize].clone();

        let needs_displacement = def.mode1 == AddrMode::Relative
            || def.mode2 == AddrMode::Relative
            || def.mode1 == AddrMode::Indexed
            || def.mode2 == AddrMode::Indexed;
        let displacement = if needs_displacement { Some(self.fetch_u8(&mut cursor, start)? as i8) } else { None };

        let imm8 = if def.mode1 == AddrMode::Immediate || def.mode2 == AddrMode::Immediate {
            Some(self.fetch_u8(&mut cursor, start)?)
        } else {
            None
        };

        let imm16 = if def.mode1 == AddrMode::ExtendedImmediate
            || def.mode2 == AddrMode::ExtendedImmediate
            || def.mode1 == AddrMode::Extended
            || def.mode2 == AddrMode::Extended
        {
            let lo = self.fetch_u8(&mut cursor, start)?;
            let hi = self.fetch_u8(&mut cursor, start)?;
            Some(((hi as u16) << 8) | (lo as u16))
        } else {
            None
        };

        Ok(DecodedInstruction { address: start, prefix, def, displacement, imm8, imm16, next_pc: cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::HandlerId;

    fn mem_with(bytes: &[u8]) -> Memory {
        let mut m = Memory::new();
        m.load(bytes, 0, true).unwrap();
        m
    }

    #[test]
    fn decodes_simple_unprefixed_instruction() {
        let mem = mem_with(&[0x00]);
        let dec = Decoder::new(&mem, None).fetch(0).unwrap();
        assert_eq!(dec.def.handler, HandlerId::Nop);
        assert_eq!(dec.next_pc, 1);
    }

    #[test]
    fn decodes_extended_immediate_little_endian() {
        let mem = mem_with(&[0x21, 0x34, 0x12]); // LD HL,1234h
        let dec = Decoder::new(&mem, None).fetch(0).unwrap();
        assert_eq!(dec.imm16, Some(0x1234));
        assert_eq!(dec.next_pc, 3);
    }

    #[test]
    fn dd_cb_reads_displacement_before_opcode() {
        // DD CB d 46 = BIT 0,(IX+d)
        let mem = mem_with(&[0xDD, 0xCB, 0x05, 0x46]);
        let dec = Decoder::new(&mem, None).fetch(0).unwrap();
        assert_eq!(dec.prefix, Prefix::DdCb);
        assert_eq!(dec.displacement, Some(5));
        assert_eq!(dec.def.mnemonic, "BIT 0,(IX+d)");
        assert_eq!(dec.next_pc, 4);
    }

    #[test]
    fn dd_plain_indexed_instruction_reads_displacement_then_immediate() {
        // DD 36 d n = LD (IX+d),n
        let mem = mem_with(&[0xDD, 0x36, 0x05, 0x99]);
        let dec = Decoder::new(&mem, None).fetch(0).unwrap();
        assert_eq!(dec.displacement, Some(5));
        assert_eq!(dec.imm8, Some(0x99));
        assert_eq!(dec.next_pc, 4);
    }

    #[test]
    fn unimplemented_ed_opcode_decodes_as_two_byte_no_op() {
        let mem = mem_with(&[0xED, 0x00]);
        let dec = Decoder::new(&mem, None).fetch(0).unwrap();
        assert_eq!(dec.def.handler, HandlerId::Unimplemented);
        assert_eq!(dec.next_pc, 2);
    }

    #[test]
    fn fetch_past_loaded_region_is_an_error() {
        let mem = mem_with(&[0x21, 0x34]); // LD HL,nn missing its last byte
        let err = Decoder::new(&mem, Some(2)).fetch(0).unwrap_err();
        assert_eq!(err, RuntimeError::OutOfData { pc: 0 });
    }

    #[test]
    fn negative_displacement_round_trips() {
        let mem = mem_with(&[0x18, 0xFE]); // JR -2
        let dec = Decoder::new(&mem, None).fetch(0).unwrap();
        assert_eq!(dec.displacement, Some(-2));
    }
}
