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

//! Z80 register file, flags, and interrupt state (spec sections 3, 4.2).

// Flags register bit layout, high to low: S Z - H - P/V N C.
// Bits 3 and 5 are undocumented and are treated as always clear here
// (spec section 9, "Open question - undocumented bits 3 and 5 of F").
pub const FLAG_SIGN: u8 = 0b1000_0000;
pub const FLAG_ZERO: u8 = 0b0100_0000;
pub const FLAG_HALF_CARRY: u8 = 0b0001_0000;
pub const FLAG_PARITY_OVERFLOW: u8 = 0b0000_0100;
pub const FLAG_ADD_SUB: u8 = 0b0000_0010;
pub const FLAG_CARRY: u8 = 0b0000_0001;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    pub sign: bool,
    pub zero: bool,
    pub half_carry: bool,
    pub parity_overflow: bool,
    pub add_sub: bool,
    pub carry: bool,
}

impl Flags {
    pub fn to_byte(self) -> u8 {
        (if self.sign { FLAG_SIGN } else { 0 })
            | (if self.zero { FLAG_ZERO } else { 0 })
            | (if self.half_carry { FLAG_HALF_CARRY } else { 0 })
            | (if self.parity_overflow { FLAG_PARITY_OVERFLOW } else { 0 })
            | (if self.add_sub { FLAG_ADD_SUB } else { 0 })
            | (if self.carry { FLAG_CARRY } else { 0 })
    }

    pub fn from_byte(byte: u8) -> Flags {
        Flags {
            sign: (byte & FLAG_SIGN) != 0,
            zero: (byte & FLAG_ZERO) != 0,
            half_carry: (byte & FLAG_HALF_CARRY) != 0,
            parity_overflow: (byte & FLAG_PARITY_OVERFLOW) != 0,
            add_sub: (byte & FLAG_ADD_SUB) != 0,
            carry: (byte & FLAG_CARRY) != 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InterruptMode {
    #[default]
    Mode0,
    Mode1,
    Mode2,
}

/// The full, addressable Z80 register and interrupt-state file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cpu {
    pub a: u8,
    pub f: Flags,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    pub af_prime: u16,
    pub bc_prime: u16,
    pub de_prime: u16,
    pub hl_prime: u16,

    pub iff1: bool,
    pub iff2: bool,
    pub im: InterruptMode,
    pub halted: bool,
}

#[inline]
fn high(pair: u16) -> u8 {
    (pair >> 8) as u8
}
#[inline]
fn low(pair: u16) -> u8 {
    (pair & 0x00FF) as u8
}
#[inline]
fn with_high(pair: u16, byte: u8) -> u16 {
    (pair & 0x00FF) | ((byte as u16) << 8)
}
#[inline]
fn with_low(pair: u16, byte: u8) -> u16 {
    (pair & 0xFF00) | (byte as u16)
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu::default()
    }

    pub fn af(self) -> u16 {
        ((self.a as u16) << 8) | (self.f.to_byte() as u16)
    }

    pub fn set_af(&mut self, value: u16) {
        self.a = high(value);
        self.f = Flags::from_byte(low(value));
    }

    /// Read an 8-bit register by the Z80's 3-bit register code. Codes 6
    /// ("(HL)") and anything outside 0..=7 are not valid register-file
    /// addresses; memory operands are resolved through
    /// `decoder::indexed_address` instead (spec section 4.2).
    pub fn read_r8(&self, code: u8) -> u8 {
        match code {
            0 => high(self.bc),
            1 => low(self.bc),
            2 => high(self.de),
            3 => low(self.de),
            4 => high(self.hl),
            5 => low(self.hl),
            7 => self.a,
            _ => panic!("read_r8: register code {} has no direct register-file address", code),
        }
    }

    pub fn write_r8(&mut self, code: u8, value: u8) {
        match code {
            0 => self.bc = with_high(self.bc, value),
            1 => self.bc = with_low(self.bc, value),
            2 => self.de = with_high(self.de, value),
            3 => self.de = with_low(self.de, value),
            4 => self.hl = with_high(self.hl, value),
            5 => self.hl = with_low(self.hl, value),
            7 => self.a = value,
            _ => panic!("write_r8: register code {} has no direct register-file address", code),
        }
    }

    /// Read a 16-bit register pair by its 2-bit code: 0=BC, 1=DE, 2=HL,
    /// 3=SP or AF depending on `af_variant` (used by PUSH/POP).
    pub fn read_r16(&self, code: u8, af_variant: bool) -> u16 {
        match code {
            0 => self.bc,
            1 => self.de,
            2 => self.hl,
            3 => if af_variant { self.af() } else { self.sp },
            _ => panic!("read_r16: invalid register pair code {}", code),
        }
    }

    pub fn write_r16(&mut self, code: u8, value: u16, af_variant: bool) {
        match code {
            0 => self.bc = value,
            1 => self.de = value,
            2 => self.hl = value,
            3 => if af_variant { self.set_af(value) } else { self.sp = value },
            _ => panic!("write_r16: invalid register pair code {}", code),
        }
    }

    /// Swap BC/DE/HL with their shadow counterparts (EXX). AF is
    /// unaffected, matching the real instruction.
    pub fn exchange_main_with_shadow(&mut self) {
        std::mem::swap(&mut self.bc, &mut self.bc_prime);
        std::mem::swap(&mut self.de, &mut self.de_prime);
        std::mem::swap(&mut self.hl, &mut self.hl_prime);
    }

    /// Swap AF with AF' (EX AF,AF').
    pub fn exchange_af_with_af_shadow(&mut self) {
        let af = self.af();
        self.set_af(self.af_prime);
        self.af_prime = af;
    }

    /// Evaluate one of the eight 3-bit condition codes: 0=NZ, 1=Z,
    /// 2=NC, 3=C, 4=PO, 5=PE, 6=P, 7=M.
    pub fn evaluate_condition(&self, code: u8) -> bool {
        match code {
            0 => !self.f.zero,
            1 => self.f.zero,
            2 => !self.f.carry,
            3 => self.f.carry,
            4 => !self.f.parity_overflow,
            5 => self.f.parity_overflow,
            6 => !self.f.sign,
            7 => self.f.sign,
            _ => panic!("evaluate_condition: invalid condition code {}", code),
        }
    }

    /// The page-zero target of `RST n`: `n * 8` for n in 0..=7.
    pub fn page_zero_address(code: u8) -> u16 {
        (code as u16) * 8
    }

    /// A multi-line, human-readable register dump (spec section 6).
    pub fn dump(&self) -> String {
        format!(
            "PC={pc:04X} SP={sp:04X} IX={ix:04X} IY={iy:04X}\n\
             A ={a:02X} F ={f:02X} BC={bc:04X} DE={de:04X} HL={hl:04X}\n\
             A'={ap:02X} F'={fp:02X} BC'={bcp:04X} DE'={dep:04X} HL'={hlp:04X}\n\
             I ={i:02X} R ={r:02X} IM={im:?} IFF1={iff1} IFF2={iff2} HALT={halted}\n",
            pc = self.pc,
            sp = self.sp,
            ix = self.ix,
            iy = self.iy,
            a = self.a,
            f = self.f.to_byte(),
            bc = self.bc,
            de = self.de,
            hl = self.hl,
            ap = high(self.af_prime),
            fp = low(self.af_prime),
            bcp = self.bc_prime,
            dep = self.de_prime,
            hlp = self.hl_prime,
            i = self.i,
            r = self.r,
            im = self.im,
            iff1 = self.iff1,
            iff2 = self.iff2,
            halted = self.halted,
        )
    }
}

/// A "set CPU state" request in which every field is optional, so a
/// caller can update an arbitrary subset of the register file
/// (spec section 6, Design Note 4).
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuStatePatch {
    pub a: Option<u8>,
    pub f: Option<Flags>,
    pub bc: Option<u16>,
    pub de: Option<u16>,
    pub hl: Option<u16>,
    pub ix: Option<u16>,
    pub iy: Option<u16>,
    pub sp: Option<u16>,
    pub pc: Option<u16>,
    pub i: Option<u8>,
    pub r: Option<u8>,
    pub af_prime: Option<u16>,
    pub bc_prime: Option<u16>,
    pub de_prime: Option<u16>,
    pub hl_prime: Option<u16>,
    pub iff1: Option<bool>,
    pub iff2: Option<bool>,
    pub im: Option<InterruptMode>,
    pub halted: Option<bool>,
}

impl CpuStatePatch {
    pub fn apply(self, cpu: &mut Cpu) {
        macro_rules! apply_field {
            ($field:ident) => {
                if let Some(value) = self.$field {
                    cpu.$field = value;
                }
            };
        }
        apply_field!(a);
        apply_field!(f);
        apply_field!(bc);
        apply_field!(de);
        apply_field!(hl);
        apply_field!(ix);
        apply_field!(iy);
        apply_field!(sp);
        apply_field!(pc);
        apply_field!(i);
        apply_field!(r);
        apply_field!(af_prime);
        apply_field!(bc_prime);
        apply_field!(de_prime);
        apply_field!(hl_prime);
        apply_field!(iff1);
        apply_field!(iff2);
        apply_field!(im);
        apply_field!(halted);
    }
}

/// True iff `byte` has an even number of set bits (spec section 4.5).
pub fn parity(byte: u8) -> bool {
    byte.count_ones() % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_pair_reads_and_writes_are_atomic() {
        let mut cpu = Cpu::new();
        cpu.bc = 0x1234;
        assert_eq!(cpu.read_r8(0), 0x12);
        assert_eq!(cpu.read_r8(1), 0x34);

        cpu.write_r8(0, 0xAB);
        assert_eq!(cpu.bc, 0xAB34);
        cpu.write_r8(1, 0xCD);
        assert_eq!(cpu.bc, 0xABCD);
    }

    #[test]
    fn af_pair_round_trips_through_a_and_flags() {
        let mut cpu = Cpu::new();
        cpu.set_af(0x12C5);
        assert_eq!(cpu.a, 0x12);
        assert_eq!(cpu.f.to_byte(), 0xC5 & !0b0010_1000);
        assert_eq!(cpu.af() & 0xFF00, 0x1200);
    }

    #[test]
    fn flags_byte_pack_unpack_round_trips() {
        let flags = Flags { sign: true, zero: false, half_carry: true, parity_overflow: true, add_sub: false, carry: true };
        let byte = flags.to_byte();
        assert_eq!(Flags::from_byte(byte), flags);
        assert_eq!(byte & 0b0010_1000, 0);
    }

    #[test]
    fn exx_exchange_is_its_own_inverse() {
        let mut cpu = Cpu::new();
        cpu.bc = 1;
        cpu.de = 2;
        cpu.hl = 3;
        let before = cpu;
        cpu.exchange_main_with_shadow();
        cpu.exchange_main_with_shadow();
        assert_eq!(cpu, before);
    }

    #[test]
    fn ex_af_af_prime_is_its_own_inverse() {
        let mut cpu = Cpu::new();
        cpu.set_af(0xBEEF);
        let before = cpu;
        cpu.exchange_af_with_af_shadow();
        cpu.exchange_af_with_af_shadow();
        assert_eq!(cpu, before);
    }

    #[test]
    fn condition_codes_match_z80_numbering() {
        let mut cpu = Cpu::new();
        cpu.f.zero = true;
        cpu.f.carry = false;
        cpu.f.sign = true;
        cpu.f.parity_overflow = false;

        assert!(!cpu.evaluate_condition(0)); // NZ
        assert!(cpu.evaluate_condition(1)); // Z
        assert!(cpu.evaluate_condition(2)); // NC
        assert!(!cpu.evaluate_condition(3)); // C
        assert!(cpu.evaluate_condition(4)); // PO
        assert!(!cpu.evaluate_condition(5)); // PE
        assert!(!cpu.evaluate_condition(6)); // P
        assert!(cpu.evaluate_condition(7)); // M
    }

    #[test]
    fn page_zero_addresses_are_multiples_of_eight() {
        for code in 0..8u8 {
            assert_eq!(Cpu::page_zero_address(code), (code as u16) * 8);
        }
    }

    #[test]
    fn parity_matches_even_bit_count() {
        for b in 0..=255u8 {
            assert_eq!(parity(b), b.count_ones() % 2 == 0);
        }
    }

    #[test]
    fn cpu_state_patch_only_touches_provided_fields() {
        let mut cpu = Cpu::new();
        cpu.bc = 0x1111;
        cpu.de = 0x2222;

        let patch = CpuStatePatch { bc: Some(0x9999), ..Default::default() };
        patch.apply(&mut cpu);

        assert_eq!(cpu.bc, 0x9999);
        assert_eq!(cpu.de, 0x2222);
    }
}
