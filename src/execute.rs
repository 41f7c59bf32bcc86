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

//! Instruction execution (spec section 4.5): one routine per
//! [`HandlerId`], dispatched on the decoded instruction. Flag
//! arithmetic mirrors the teacher's `add_8bit!`/`sub_8bit!`/etc. macro
//! family, adapted to this crate's `Flags` field names.

use crate::cpu::{parity, Cpu};
use crate::decoder::DecodedInstruction;
use crate::memory::{Memory, Stack};
use crate::port::Port;
use crate::tables::{tables, HandlerId, Prefix};

/// Outcome of running one decoded instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub end_of_execution: bool,
}

/// Execute `inst`, mutating `cpu`/`memory`/`port` and `call_depth` (the
/// running CALL/RET depth counter behind the RET end-of-execution
/// heuristic, spec section 4.5).
pub fn execute(cpu: &mut Cpu, memory: &mut Memory, port: &mut dyn Port, call_depth: &mut i64, inst: &DecodedInstruction) -> ExecOutcome {
    let handler = resolve_handler(inst);
    let opcode = inst.def.opcode;

    match handler {
        HandlerId::Nop | HandlerId::Unimplemented => {}

        HandlerId::Halt => {
            cpu.halted = true;
            cpu.pc = cpu.pc.wrapping_sub(1);
        }

        HandlerId::LdR8R8 => {
            let dst = (opcode >> 3) & 7;
            let src = opcode & 7;
            let value = read_operand8(cpu, memory, inst, src);
            write_operand8(cpu, memory, inst, dst, value);
        }

        HandlerId::LdR8Imm8 => {
            let dst = (opcode >> 3) & 7;
            write_operand8(cpu, memory, inst, dst, inst.imm8.expect("Immediate operand"));
        }

        HandlerId::LdR16Imm16 => {
            let pair = (opcode >> 4) & 3;
            write_pair(cpu, inst, pair, false, inst.imm16.expect("ExtendedImmediate operand"));
        }

        HandlerId::LdMemBcA => memory.write(cpu.bc, cpu.a),
        HandlerId::LdMemDeA => memory.write(cpu.de, cpu.a),
        HandlerId::LdAMemBc => cpu.a = memory.read(cpu.bc),
        HandlerId::LdAMemDe => cpu.a = memory.read(cpu.de),

        HandlerId::LdMemImm16Hl => {
            let addr = inst.imm16.expect("Extended operand");
            memory.write16(addr, hl_like(cpu, inst));
        }
        HandlerId::LdHlMemImm16 => {
            let addr = inst.imm16.expect("Extended operand");
            let value = memory.read16(addr);
            set_hl_like(cpu, inst, value);
        }
        HandlerId::LdMemImm16A => memory.write(inst.imm16.expect("Extended operand"), cpu.a),
        HandlerId::LdAMemImm16 => cpu.a = memory.read(inst.imm16.expect("Extended operand")),

        HandlerId::IncR8 => {
            let r = (opcode >> 3) & 7;
            let v = read_operand8(cpu, memory, inst, r);
            let result = inc8(&mut cpu.f, v);
            write_operand8(cpu, memory, inst, r, result);
        }
        HandlerId::DecR8 => {
            let r = (opcode >> 3) & 7;
            let v = read_operand8(cpu, memory, inst, r);
            let result = dec8(&mut cpu.f, v);
            write_operand8(cpu, memory, inst, r, result);
        }
        HandlerId::IncR16 => {
            let pair = (opcode >> 4) & 3;
            let v = read_pair(cpu, inst, pair, false);
            write_pair(cpu, inst, pair, false, v.wrapping_add(1));
        }
        HandlerId::DecR16 => {
            let pair = (opcode >> 4) & 3;
            let v = read_pair(cpu, inst, pair, false);
            write_pair(cpu, inst, pair, false, v.wrapping_sub(1));
        }
        HandlerId::AddHlR16 => {
            let pair = (opcode >> 4) & 3;
            let addend = read_pair(cpu, inst, pair, false);
            let dest = hl_like(cpu, inst);
            let result = add16(&mut cpu.f, dest, addend);
            set_hl_like(cpu, inst, result);
        }

        HandlerId::Rlca => {
            let carry_out = (cpu.a & 0x80) != 0;
            cpu.a = cpu.a.rotate_left(1);
            cpu.f.carry = carry_out;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
        }
        HandlerId::Rrca => {
            let carry_out = (cpu.a & 0x01) != 0;
            cpu.a = cpu.a.rotate_right(1);
            cpu.f.carry = carry_out;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
        }
        HandlerId::Rla => {
            let carry_out = (cpu.a & 0x80) != 0;
            cpu.a = (cpu.a << 1) | (cpu.f.carry as u8);
            cpu.f.carry = carry_out;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
        }
        HandlerId::Rra => {
            let carry_out = (cpu.a & 0x01) != 0;
            cpu.a = (cpu.a >> 1) | ((cpu.f.carry as u8) << 7);
            cpu.f.carry = carry_out;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
        }
        HandlerId::Daa => daa(cpu),
        HandlerId::Cpl => {
            cpu.a = !cpu.a;
            cpu.f.half_carry = true;
            cpu.f.add_sub = true;
        }
        HandlerId::Scf => {
            cpu.f.carry = true;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
        }
        HandlerId::Ccf => {
            cpu.f.half_carry = cpu.f.carry;
            cpu.f.carry = !cpu.f.carry;
            cpu.f.add_sub = false;
        }

        HandlerId::ExAfAfPrime => cpu.exchange_af_with_af_shadow(),
        HandlerId::Exx => cpu.exchange_main_with_shadow(),
        HandlerId::ExDeHl => std::mem::swap(&mut cpu.de, &mut cpu.hl),
        HandlerId::ExMemSpHl => {
            let mem_val = memory.read16(cpu.sp);
            let reg_val = hl_like(cpu, inst);
            memory.write16(cpu.sp, reg_val);
            set_hl_like(cpu, inst, mem_val);
        }

        HandlerId::Djnz => {
            cpu.bc = with_high(cpu.bc, high(cpu.bc).wrapping_sub(1));
            if high(cpu.bc) != 0 {
                cpu.pc = relative_target(inst);
            }
        }
        HandlerId::Jr => cpu.pc = relative_target(inst),
        HandlerId::JrCond => {
            let cc = (opcode >> 3) & 3;
            if cpu.evaluate_condition(cc) {
                cpu.pc = relative_target(inst);
            }
        }
        HandlerId::JpNn => cpu.pc = inst.imm16.expect("Extended operand"),
        HandlerId::JpCondNn => {
            let cc = (opcode >> 3) & 7;
            if cpu.evaluate_condition(cc) {
                cpu.pc = inst.imm16.expect("Extended operand");
            }
        }
        HandlerId::CallNn => {
            Stack::push(memory, &mut cpu.sp, inst.next_pc);
            cpu.pc = inst.imm16.expect("Extended operand");
            *call_depth += 1;
        }
        HandlerId::CallCondNn => {
            let cc = (opcode >> 3) & 7;
            if cpu.evaluate_condition(cc) {
                Stack::push(memory, &mut cpu.sp, inst.next_pc);
                cpu.pc = inst.imm16.expect("Extended operand");
                *call_depth += 1;
            }
        }
        HandlerId::Ret => {
            cpu.pc = Stack::pop(memory, &mut cpu.sp);
            return finish_ret(call_depth);
        }
        HandlerId::RetCond => {
            let cc = (opcode >> 3) & 7;
            if cpu.evaluate_condition(cc) {
                cpu.pc = Stack::pop(memory, &mut cpu.sp);
                return finish_ret(call_depth);
            }
        }
        HandlerId::PushR16 => {
            let pair = (opcode >> 4) & 3;
            let value = read_pair(cpu, inst, pair, true);
            Stack::push(memory, &mut cpu.sp, value);
        }
        HandlerId::PopR16 => {
            let pair = (opcode >> 4) & 3;
            let value = Stack::pop(memory, &mut cpu.sp);
            write_pair(cpu, inst, pair, true, value);
        }
        HandlerId::Rst => {
            let code = (opcode >> 3) & 7;
            Stack::push(memory, &mut cpu.sp, inst.next_pc);
            cpu.pc = Cpu::page_zero_address(code);
        }

        HandlerId::AluR8 => {
            let alu = (opcode >> 3) & 7;
            let r = opcode & 7;
            let value = read_operand8(cpu, memory, inst, r);
            alu_op(cpu, alu, value);
        }
        HandlerId::AluImm8 => {
            let alu = (opcode >> 3) & 7;
            alu_op(cpu, alu, inst.imm8.expect("Immediate operand"));
        }

        HandlerId::InAPort => {
            let port_addr = ((cpu.a as u16) << 8) | (inst.imm8.expect("Immediate operand") as u16);
            cpu.a = port.read(port_addr);
        }
        HandlerId::OutPortA => {
            let port_addr = ((cpu.a as u16) << 8) | (inst.imm8.expect("Immediate operand") as u16);
            port.write(port_addr, cpu.a);
        }

        HandlerId::Di => {
            cpu.iff1 = false;
            cpu.iff2 = false;
        }
        HandlerId::Ei => {
            cpu.iff1 = true;
            cpu.iff2 = true;
        }
        HandlerId::JpHl => cpu.pc = hl_like(cpu, inst),
        HandlerId::LdSpHl => cpu.sp = hl_like(cpu, inst),

        HandlerId::InRC => {
            let r = (opcode >> 3) & 7;
            let value = port.read(cpu.bc);
            cpu.write_r8(r, value);
            cpu.f.sign = (value & 0x80) != 0;
            cpu.f.zero = value == 0;
            cpu.f.half_carry = false;
            cpu.f.parity_overflow = parity(value);
            cpu.f.add_sub = false;
        }
        HandlerId::OutCR => {
            let r = (opcode >> 3) & 7;
            port.write(cpu.bc, cpu.read_r8(r));
        }
        HandlerId::SbcHlR16 => {
            let pair = (opcode >> 4) & 3;
            let operand = cpu.read_r16(pair, false);
            let result = sbc16(&mut cpu.f, cpu.hl, operand);
            cpu.hl = result;
        }
        HandlerId::AdcHlR16 => {
            let pair = (opcode >> 4) & 3;
            let operand = cpu.read_r16(pair, false);
            let result = adc16(&mut cpu.f, cpu.hl, operand);
            cpu.hl = result;
        }
        HandlerId::LdMemImm16R16 => {
            let pair = (opcode >> 4) & 3;
            let value = cpu.read_r16(pair, false);
            memory.write16(inst.imm16.expect("Extended operand"), value);
        }
        HandlerId::LdR16MemImm16 => {
            let pair = (opcode >> 4) & 3;
            let value = memory.read16(inst.imm16.expect("Extended operand"));
            cpu.write_r16(pair, value, false);
        }
        HandlerId::Neg => {
            let result = sub8(&mut cpu.f, 0, cpu.a, false);
            cpu.a = result;
        }
        HandlerId::RetN => {
            cpu.pc = Stack::pop(memory, &mut cpu.sp);
            cpu.iff1 = cpu.iff2;
            return finish_ret(call_depth);
        }
        HandlerId::RetI => {
            cpu.pc = Stack::pop(memory, &mut cpu.sp);
            return finish_ret(call_depth);
        }
        HandlerId::Im0 => cpu.im = crate::cpu::InterruptMode::Mode0,
        HandlerId::Im1 => cpu.im = crate::cpu::InterruptMode::Mode1,
        HandlerId::Im2 => cpu.im = crate::cpu::InterruptMode::Mode2,
        HandlerId::LdAI => {
            cpu.a = cpu.i;
            cpu.f.sign = (cpu.a & 0x80) != 0;
            cpu.f.zero = cpu.a == 0;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
            cpu.f.parity_overflow = cpu.iff2;
        }
        HandlerId::LdAR => {
            cpu.a = cpu.r;
            cpu.f.sign = (cpu.a & 0x80) != 0;
            cpu.f.zero = cpu.a == 0;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
            cpu.f.parity_overflow = cpu.iff2;
        }
        HandlerId::LdIA => cpu.i = cpu.a,
        HandlerId::LdRA => cpu.r = cpu.a,
        HandlerId::Rrd => rrd(cpu, memory),
        HandlerId::Rld => rld(cpu, memory),

        HandlerId::Ldi => ldi_ldd(cpu, memory, 1),
        HandlerId::Ldd => ldi_ldd(cpu, memory, -1),
        HandlerId::Ldir => {
            while {
                ldi_ldd(cpu, memory, 1);
                cpu.bc != 0
            } {}
        }
        HandlerId::Lddr => {
            while {
                ldi_ldd(cpu, memory, -1);
                cpu.bc != 0
            } {}
        }
        HandlerId::Cpi => cpi_cpd(cpu, memory, 1),
        HandlerId::Cpd => cpi_cpd(cpu, memory, -1),
        HandlerId::Cpir => {
            while {
                cpi_cpd(cpu, memory, 1);
                cpu.bc != 0 && !cpu.f.zero
            } {}
        }
        HandlerId::Cpdr => {
            while {
                cpi_cpd(cpu, memory, -1);
                cpu.bc != 0 && !cpu.f.zero
            } {}
        }
        HandlerId::Ini => ini_ind(cpu, memory, port, 1),
        HandlerId::Ind => ini_ind(cpu, memory, port, -1),
        HandlerId::Inir => {
            while {
                ini_ind(cpu, memory, port, 1);
                !cpu.f.zero
            } {}
        }
        HandlerId::Indr => {
            while {
                ini_ind(cpu, memory, port, -1);
                !cpu.f.zero
            } {}
        }
        HandlerId::Outi => outi_outd(cpu, memory, port, 1),
        HandlerId::Outd => outi_outd(cpu, memory, port, -1),
        HandlerId::Otir => {
            while {
                outi_outd(cpu, memory, port, 1);
                !cpu.f.zero
            } {}
        }
        HandlerId::Otdr => {
            while {
                outi_outd(cpu, memory, port, -1);
                !cpu.f.zero
            } {}
        }

        HandlerId::RotShiftR8 => {
            let group = (opcode >> 3) & 7;
            let r = opcode & 7;
            let old = read_operand8(cpu, memory, inst, r);
            let new = rot_shift(&mut cpu.f, group, old);
            write_operand8(cpu, memory, inst, r, new);
        }
        HandlerId::BitNR8 => {
            let bit = (opcode >> 3) & 7;
            let r = opcode & 7;
            let value = read_operand8(cpu, memory, inst, r);
            cpu.f.zero = (value & (1 << bit)) == 0;
            cpu.f.half_carry = true;
            cpu.f.add_sub = false;
        }
        HandlerId::ResNR8 => {
            let bit = (opcode >> 3) & 7;
            let r = opcode & 7;
            let value = read_operand8(cpu, memory, inst, r);
            write_operand8(cpu, memory, inst, r, value & !(1 << bit));
        }
        HandlerId::SetNR8 => {
            let bit = (opcode >> 3) & 7;
            let r = opcode & 7;
            let value = read_operand8(cpu, memory, inst, r);
            write_operand8(cpu, memory, inst, r, value | (1 << bit));
        }

        HandlerId::IxIyIndirect => unreachable!("resolve_handler always substitutes this away"),
    }

    ExecOutcome::default()
}

fn finish_ret(call_depth: &mut i64) -> ExecOutcome {
    if *call_depth == 0 {
        ExecOutcome { end_of_execution: true }
    } else {
        *call_depth -= 1;
        ExecOutcome::default()
    }
}

/// Follow an `IxIyIndirect` stand-in back to the handler it redirects
/// to, in the opcode's home table (spec section 4.5).
fn resolve_handler(inst: &DecodedInstruction) -> HandlerId {
    if inst.def.handler != HandlerId::IxIyIndirect {
        return inst.def.handler;
    }
    let base_prefix = match inst.prefix {
        Prefix::Dd | Prefix::Fd => Prefix::None,
        Prefix::DdCb | Prefix::FdCb => Prefix::Cb,
        _ => unreachable!("only DD/FD forms carry IxIyIndirect"),
    };
    tables().table_for(base_prefix)[inst.def.opcode as usize].handler
}

/// Resolves the effective memory address for an `(HL)`/`(IX+d)`/`(IY+d)`
/// operand according to the instruction's prefix (spec section 4.5).
fn indexed_address(cpu: &Cpu, inst: &DecodedInstruction) -> u16 {
    match inst.prefix {
        Prefix::Dd | Prefix::DdCb => cpu.ix.wrapping_add(inst.displacement.unwrap_or(0) as i16 as u16),
        Prefix::Fd | Prefix::FdCb => cpu.iy.wrapping_add(inst.displacement.unwrap_or(0) as i16 as u16),
        _ => cpu.hl,
    }
}

/// The "active" 16-bit register a direct (non-memory) HL-pair
/// reference resolves to under the instruction's prefix.
fn hl_like(cpu: &Cpu, inst: &DecodedInstruction) -> u16 {
    match inst.prefix {
        Prefix::Dd => cpu.ix,
        Prefix::Fd => cpu.iy,
        _ => cpu.hl,
    }
}

fn set_hl_like(cpu: &mut Cpu, inst: &DecodedInstruction, value: u16) {
    match inst.prefix {
        Prefix::Dd => cpu.ix = value,
        Prefix::Fd => cpu.iy = value,
        _ => cpu.hl = value,
    }
}

fn read_operand8(cpu: &Cpu, memory: &Memory, inst: &DecodedInstruction, r8: u8) -> u8 {
    if r8 == 6 {
        memory.read(indexed_address(cpu, inst))
    } else {
        cpu.read_r8(r8)
    }
}

fn write_operand8(cpu: &mut Cpu, memory: &mut Memory, inst: &DecodedInstruction, r8: u8, value: u8) {
    if r8 == 6 {
        memory.write(indexed_address(cpu, inst), value);
    } else {
        cpu.write_r8(r8, value);
    }
}

/// 16-bit pair code 2 (HL) resolves through the active prefix; codes 0,
/// 1, 3 (BC/DE/SP-or-AF) are always the plain register file.
fn read_pair(cpu: &Cpu, inst: &DecodedInstruction, code: u8, af_variant: bool) -> u16 {
    if code == 2 {
        hl_like(cpu, inst)
    } else {
        cpu.read_r16(code, af_variant)
    }
}

fn write_pair(cpu: &mut Cpu, inst: &DecodedInstruction, code: u8, af_variant: bool, value: u16) {
    if code == 2 {
        set_hl_like(cpu, inst, value);
    } else {
        cpu.write_r16(code, value, af_variant);
    }
}

fn relative_target(inst: &DecodedInstruction) -> u16 {
    let d = inst.displacement.expect("Relative operand") as i16;
    inst.next_pc.wrapping_add(d as u16)
}

fn high(pair: u16) -> u8 {
    (pair >> 8) as u8
}
fn with_high(pair: u16, byte: u8) -> u16 {
    (pair & 0x00FF) | ((byte as u16) << 8)
}

// --- Flag arithmetic, ported from the teacher's `*_8bit!`/`*_16bit!` macros. ---

fn inc8(f: &mut crate::cpu::Flags, dest: u8) -> u8 {
    let result = dest.wrapping_add(1);
    f.zero = result == 0;
    f.sign = (result & 0x80) != 0;
    f.parity_overflow = dest == 0x7F;
    f.half_carry = (dest & 0x0F) == 0x0F;
    f.add_sub = false;
    result
}

fn dec8(f: &mut crate::cpu::Flags, dest: u8) -> u8 {
    let result = dest.wrapping_sub(1);
    f.zero = result == 0;
    f.sign = (result & 0x80) != 0;
    f.parity_overflow = dest == 0x80;
    f.half_carry = (dest & 0x0F) == 0;
    f.add_sub = true;
    result
}

fn add8(f: &mut crate::cpu::Flags, dest: u8, to_add: u8, carry_in: bool) -> u8 {
    let dest_i = dest as i32;
    let add_i = to_add as i32 + carry_in as i32;
    let mut result_i = dest_i + add_i;
    f.carry = result_i > 0xFF;
    if f.carry {
        result_i &= 0xFF;
    }
    f.zero = result_i == 0;
    f.sign = (result_i & 0x80) != 0;
    f.parity_overflow = ((dest_i ^ add_i ^ 0x80) & (dest_i ^ result_i) & 0x80) != 0;
    f.half_carry = ((dest_i & 0x0F) + (to_add as i32 & 0x0F) + carry_in as i32) > 0x0F;
    f.add_sub = false;
    result_i as u8
}

fn sub8(f: &mut crate::cpu::Flags, dest: u8, to_sub: u8, carry_in: bool) -> u8 {
    let dest_i = dest as i32;
    let sub_i = to_sub as i32 + carry_in as i32;
    let mut result_i = dest_i - sub_i;
    f.carry = result_i < 0;
    if f.carry {
        result_i &= 0xFF;
    }
    f.zero = result_i == 0;
    f.sign = (result_i & 0x80) != 0;
    f.parity_overflow = ((dest_i ^ sub_i) & (dest_i ^ result_i) & 0x80) != 0;
    f.half_carry = (dest_i & 0x0F) < ((to_sub as i32 & 0x0F) + carry_in as i32);
    f.add_sub = true;
    result_i as u8
}

fn add16(f: &mut crate::cpu::Flags, dest: u16, to_add: u16) -> u16 {
    let dest_i = dest as u32;
    let add_i = to_add as u32;
    let result_i = dest_i + add_i;
    f.carry = result_i > 0xFFFF;
    f.half_carry = ((dest_i & 0x0FFF) + (add_i & 0x0FFF)) > 0x0FFF;
    f.add_sub = false;
    result_i as u16
}

fn adc16(f: &mut crate::cpu::Flags, dest: u16, to_add: u16) -> u16 {
    let carry_in = f.carry as u32;
    let dest_i = dest as u32;
    let add_i = to_add as u32 + carry_in;
    let result_i = dest_i + add_i;
    f.carry = result_i > 0xFFFF;
    let result16 = (result_i & 0xFFFF) as u16;
    f.zero = result16 == 0;
    f.sign = (result16 & 0x8000) != 0;
    f.parity_overflow = ((dest_i ^ add_i ^ 0x8000) & (dest_i ^ result_i) & 0x8000) != 0;
    f.half_carry = ((dest_i & 0x0FFF) + (to_add as u32 & 0x0FFF) + carry_in) > 0x0FFF;
    f.add_sub = false;
    result16
}

fn sbc16(f: &mut crate::cpu::Flags, dest: u16, to_sub: u16) -> u16 {
    let carry_in = f.carry as i64;
    let dest_i = dest as i64;
    let sub_i = to_sub as i64 + carry_in;
    let mut result_i = dest_i - sub_i;
    f.carry = result_i < 0;
    if f.carry {
        result_i &= 0xFFFF;
    }
    let result16 = result_i as u16;
    f.zero = result16 == 0;
    f.sign = (result16 & 0x8000) != 0;
    f.parity_overflow = ((dest_i ^ sub_i) & (dest_i ^ result_i) & 0x8000) != 0;
    f.half_carry = (dest_i & 0x0FFF) < ((to_sub as i64 & 0x0FFF) + carry_in);
    f.add_sub = true;
    result16
}

fn alu_op(cpu: &mut Cpu, alu: u8, value: u8) {
    match alu {
        0 => cpu.a = add8(&mut cpu.f, cpu.a, value, false),
        1 => { let carry = cpu.f.carry; cpu.a = add8(&mut cpu.f, cpu.a, value, carry); }
        2 => cpu.a = sub8(&mut cpu.f, cpu.a, value, false),
        3 => { let carry = cpu.f.carry; cpu.a = sub8(&mut cpu.f, cpu.a, value, carry); }
        4 => {
            let result = cpu.a & value;
            cpu.f.half_carry = true;
            cpu.f.add_sub = false;
            cpu.f.carry = false;
            cpu.f.parity_overflow = parity(result);
            cpu.f.zero = result == 0;
            cpu.f.sign = (result & 0x80) != 0;
            cpu.a = result;
        }
        5 => {
            let result = cpu.a ^ value;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
            cpu.f.carry = false;
            cpu.f.parity_overflow = parity(result);
            cpu.f.zero = result == 0;
            cpu.f.sign = (result & 0x80) != 0;
            cpu.a = result;
        }
        6 => {
            let result = cpu.a | value;
            cpu.f.half_carry = false;
            cpu.f.add_sub = false;
            cpu.f.carry = false;
            cpu.f.parity_overflow = parity(result);
            cpu.f.zero = result == 0;
            cpu.f.sign = (result & 0x80) != 0;
            cpu.a = result;
        }
        _ => {
            sub8(&mut cpu.f, cpu.a, value, false); // CP: flags only
        }
    }
}

fn rot_shift(f: &mut crate::cpu::Flags, group: u8, old: u8) -> u8 {
    let (new, carry_out) = match group {
        0 => (old.rotate_left(1), (old & 0x80) != 0), // RLC
        1 => (old.rotate_right(1), (old & 0x01) != 0), // RRC
        2 => ((old << 1) | (f.carry as u8), (old & 0x80) != 0), // RL
        3 => ((old >> 1) | ((f.carry as u8) << 7), (old & 0x01) != 0), // RR
        4 => (old << 1, (old & 0x80) != 0), // SLA
        5 => ((old >> 1) | (old & 0x80), (old & 0x01) != 0), // SRA
        6 => (old, f.carry), // group 6 (undocumented SLL) never reaches here; the CB table routes it to Unimplemented
        _ => (old >> 1, (old & 0x01) != 0), // SRL
    };
    f.carry = carry_out;
    f.half_carry = false;
    f.add_sub = false;
    f.zero = new == 0;
    f.sign = (new & 0x80) != 0;
    f.parity_overflow = parity(new);
    new
}

fn daa(cpu: &mut Cpu) {
    let mut corr: u8 = 0;
    let prev_a = cpu.a;
    if (cpu.a & 0x0F) > 9 || cpu.f.half_carry {
        corr |= 0x06;
    }
    if cpu.a > 0x99 || cpu.f.carry {
        corr |= 0x60;
        cpu.f.carry = true;
    }
    if !cpu.f.add_sub {
        cpu.a = cpu.a.wrapping_add(corr);
    } else {
        cpu.a = cpu.a.wrapping_sub(corr);
    }
    cpu.f.sign = (cpu.a & 0x80) != 0;
    cpu.f.zero = cpu.a == 0;
    cpu.f.parity_overflow = parity(cpu.a);
    cpu.f.half_carry = ((prev_a ^ cpu.a) & 0x10) != 0;
}

fn rrd(cpu: &mut Cpu, memory: &mut Memory) {
    let mem_val = memory.read(cpu.hl);
    let new_mem = (cpu.a << 4) | (mem_val >> 4);
    let new_a = (cpu.a & 0xF0) | (mem_val & 0x0F);
    memory.write(cpu.hl, new_mem);
    cpu.a = new_a;
    cpu.f.sign = (cpu.a & 0x80) != 0;
    cpu.f.zero = cpu.a == 0;
    cpu.f.parity_overflow = parity(cpu.a);
    cpu.f.half_carry = false;
    cpu.f.add_sub = false;
}

fn rld(cpu: &mut Cpu, memory: &mut Memory) {
    let mem_val = memory.read(cpu.hl);
    let new_mem = (mem_val << 4) | (cpu.a & 0x0F);
    let new_a = (cpu.a & 0xF0) | (mem_val >> 4);
    memory.write(cpu.hl, new_mem);
    cpu.a = new_a;
    cpu.f.sign = (cpu.a & 0x80) != 0;
    cpu.f.zero = cpu.a == 0;
    cpu.f.parity_overflow = parity(cpu.a);
    cpu.f.half_carry = false;
    cpu.f.add_sub = false;
}

fn ldi_ldd(cpu: &mut Cpu, memory: &mut Memory, step: i16) {
    let value = memory.read(cpu.hl);
    memory.write(cpu.de, value);
    cpu.hl = cpu.hl.wrapping_add(step as u16);
    cpu.de = cpu.de.wrapping_add(step as u16);
    cpu.bc = cpu.bc.wrapping_sub(1);
    cpu.f.half_carry = false;
    cpu.f.add_sub = false;
    cpu.f.parity_overflow = cpu.bc != 0;
}

fn cpi_cpd(cpu: &mut Cpu, memory: &mut Memory, step: i16) {
    let value = memory.read(cpu.hl);
    let carry = cpu.f.carry;
    sub8(&mut cpu.f, cpu.a, value, false);
    cpu.f.carry = carry; // CPI/CPD leave carry untouched
    cpu.hl = cpu.hl.wrapping_add(step as u16);
    cpu.bc = cpu.bc.wrapping_sub(1);
    cpu.f.parity_overflow = cpu.bc != 0;
}

fn ini_ind(cpu: &mut Cpu, memory: &mut Memory, port: &mut dyn Port, step: i16) {
    let value = port.read(cpu.bc);
    memory.write(cpu.hl, value);
    cpu.hl = cpu.hl.wrapping_add(step as u16);
    cpu.bc = with_high(cpu.bc, high(cpu.bc).wrapping_sub(1));
    cpu.f.zero = high(cpu.bc) == 0;
    cpu.f.add_sub = true;
}

fn outi_outd(cpu: &mut Cpu, memory: &mut Memory, port: &mut dyn Port, step: i16) {
    let value = memory.read(cpu.hl);
    port.write(cpu.bc, value);
    cpu.hl = cpu.hl.wrapping_add(step as u16);
    cpu.bc = with_high(cpu.bc, high(cpu.bc).wrapping_sub(1));
    cpu.f.zero = high(cpu.bc) == 0;
    cpu.f.add_sub = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::port::NullPort;
    use crate::tables::Prefix;

    fn run(cpu: &mut Cpu, memory: &mut Memory, bytes: &[u8]) -> ExecOutcome {
        memory.load(bytes, cpu.pc, false).unwrap();
        let dec = Decoder::new(memory, None).fetch(cpu.pc).unwrap();
        cpu.pc = dec.next_pc;
        let mut call_depth = 0i64;
        execute(cpu, memory, &mut NullPort, &mut call_depth, &dec)
    }

    #[test]
    fn add_a_e_matches_spec_scenario_d() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.a = 0x12;
        cpu.write_r8(3, 0x70); // E
        run(&mut cpu, &mut mem, &[0x83]); // ADD A,E
        assert_eq!(cpu.a, 0x82);
        assert!(cpu.f.sign);
        assert!(!cpu.f.zero);
        assert!(!cpu.f.half_carry);
        assert!(!cpu.f.parity_overflow);
        assert!(!cpu.f.carry);
    }

    #[test]
    fn halt_loops_pc_in_place() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        run(&mut cpu, &mut mem, &[0x76]);
        assert!(cpu.halted);
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn ret_at_zero_call_depth_signals_end_of_execution() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.sp = 0x8000;
        mem.write16(0x8000, 0x1234);
        let outcome = run(&mut cpu, &mut mem, &[0xC9]);
        assert!(outcome.end_of_execution);
        assert_eq!(cpu.pc, 0x1234);
    }

    #[test]
    fn call_then_ret_does_not_end_execution() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.sp = 0x8000;
        mem.load(&[0xCD, 0x00, 0x90], 0, true).unwrap();
        let dec = Decoder::new(&mem, None).fetch(0).unwrap();
        cpu.pc = dec.next_pc;
        let mut call_depth = 0i64;
        let outcome = execute(&mut cpu, &mut mem, &mut NullPort, &mut call_depth, &dec);
        assert!(!outcome.end_of_execution);
        assert_eq!(call_depth, 1);

        mem.load(&[0xC9], 0x9000, false).unwrap();
        let dec2 = Decoder::new(&mem, None).fetch(0x9000).unwrap();
        cpu.pc = dec2.next_pc;
        let outcome2 = execute(&mut cpu, &mut mem, &mut NullPort, &mut call_depth, &dec2);
        assert!(outcome2.end_of_execution);
        assert_eq!(call_depth, 0);
    }

    #[test]
    fn ld_a_ix_plus_d_reads_through_indexed_address() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.ix = 0x3000;
        mem.write(0x3005, 0x42);
        run(&mut cpu, &mut mem, &[0xDD, 0x7E, 0x05]);
        assert_eq!(cpu.a, 0x42);
    }

    #[test]
    fn ld_ix_nn_does_not_touch_hl() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.hl = 0xBEEF;
        run(&mut cpu, &mut mem, &[0xDD, 0x21, 0x34, 0x12]);
        assert_eq!(cpu.ix, 0x1234);
        assert_eq!(cpu.hl, 0xBEEF);
    }

    #[test]
    fn bit_instruction_on_indexed_operand_reads_iy_plus_d() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.iy = 0x4000;
        mem.write(0x4003, 0b0000_0100); // bit 2 set
        run(&mut cpu, &mut mem, &[0xFD, 0xCB, 0x03, 0x56]); // BIT 2,(IY+3)
        assert!(!cpu.f.zero);
    }

    #[test]
    fn ldir_copies_a_block_and_clears_parity_overflow() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        mem.load(&[1, 2, 3], 0x2000, false).unwrap();
        cpu.hl = 0x2000;
        cpu.de = 0x3000;
        cpu.bc = 3;
        run(&mut cpu, &mut mem, &[0xED, 0xB0]);
        assert_eq!(mem.dump(0x3000, 3), [1, 2, 3]);
        assert_eq!(cpu.bc, 0);
        assert!(!cpu.f.parity_overflow);
    }

    #[test]
    fn daa_corrects_bcd_addition() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.a = 0x9A;
        cpu.f.add_sub = false;
        cpu.f.half_carry = false;
        cpu.f.carry = false;
        run(&mut cpu, &mut mem, &[0x27]);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.f.carry);
    }

    #[test]
    fn adc_a_n_carries_into_half_carry_from_incoming_carry() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.a = 0x00;
        cpu.f.carry = true;
        run(&mut cpu, &mut mem, &[0xCE, 0x0F]); // ADC A,0Fh
        assert_eq!(cpu.a, 0x10);
        assert!(cpu.f.half_carry, "0x0F + incoming carry must ripple into bit 4");
    }

    #[test]
    fn sbc_a_n_half_borrows_from_incoming_carry() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.a = 0x10;
        cpu.f.carry = true;
        run(&mut cpu, &mut mem, &[0xDE, 0x0F]); // SBC A,0Fh
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.f.half_carry, "0x0F + incoming carry must borrow out of the low nibble");
    }

    #[test]
    fn adc_hl_rr_carries_into_half_carry_from_incoming_carry() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.hl = 0x1000;
        cpu.bc = 0x0FFF;
        cpu.f.carry = true;
        run(&mut cpu, &mut mem, &[0xED, 0x4A]); // ADC HL,BC
        assert_eq!(cpu.hl, 0x2000);
        assert!(cpu.f.half_carry, "0x0FFF + incoming carry must ripple into bit 12");
    }

    #[test]
    fn sbc_hl_rr_half_borrows_from_incoming_carry() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new();
        cpu.hl = 0x1000;
        cpu.bc = 0x0FFF;
        cpu.f.carry = true;
        run(&mut cpu, &mut mem, &[0xED, 0x42]); // SBC HL,BC
        assert_eq!(cpu.hl, 0x0000);
        assert!(cpu.f.half_carry, "0x0FFF + incoming carry must borrow out of bit 12");
    }
}
