//! End-to-end scenarios exercising the interpreter, stack, and
//! disassembler together through the public `Machine`/`Disassembler`
//! API, rather than one opcode at a time.

use z80emu::memory::Stack;
use z80emu::{CpuStatePatch, Disassembler, Machine};

#[test]
fn block_copy_with_ldir_like_loop() {
    // LD A,(DE); CP C; RET Z; LD A,(DE); LD (HL),A; INC DE; INC HL; DEC BC; JP 0x1000
    let program = [0x78, 0xB1, 0xC8, 0x1A, 0x77, 0x13, 0x23, 0x0B, 0xC3, 0x00, 0x10];
    let source = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA];

    let mut machine = Machine::new(None);
    machine.load_data(&source, 0x2000, true).unwrap();
    machine.load_executable(&program, 0x1000, false).unwrap();
    machine.set_cpu_state(CpuStatePatch {
        de: Some(0x2000),
        hl: Some(0x3000),
        bc: Some(0x0010),
        sp: Some(0x4000),
        ..Default::default()
    });

    machine.execute().unwrap();

    assert_eq!(machine.dump_memory(0x3000, 10), machine.dump_memory(0x2000, 10));
}

#[test]
fn sixteen_bit_division_program() {
    let program = [
        0x21, 0x00, 0x00, 0x3E, 0x10, 0xCB, 0x21, 0xCB, 0x10, 0xED, 0x6A, 0xED, 0x52, 0x38, 0x03, 0x0C, 0x18, 0x01,
        0x19, 0x3D, 0x20, 0xEF, 0xC9,
    ];

    let mut machine = Machine::new(None);
    machine.load_executable(&program, 0x0000, true).unwrap();
    machine.set_cpu_state(CpuStatePatch { bc: Some(0x3264), de: Some(0x001B), sp: Some(0x4000), ..Default::default() });

    machine.execute().unwrap();

    let state = machine.get_cpu_state();
    assert_eq!(state.bc, 0x0753, "quotient");
    assert_eq!(state.hl, 0x0013, "remainder");
}

#[test]
fn push_pop_round_trip() {
    let mut memory = z80emu::memory::Memory::new();
    let mut sp = 0x2000u16;

    Stack::push(&mut memory, &mut sp, 0x4050);
    assert_eq!(sp, 0x1FFE);
    assert_eq!(memory.read(0x1FFF), 0x40);
    assert_eq!(memory.read(0x1FFE), 0x50);

    let popped = Stack::pop(&memory, &mut sp);
    assert_eq!(popped, 0x4050);
    assert_eq!(sp, 0x2000);
}

#[test]
fn add_a_e_flag_semantics() {
    // ADD A,E
    let mut machine = Machine::new(None);
    machine.load_executable(&[0x83], 0x8000, true).unwrap();
    machine.set_cpu_state(CpuStatePatch { a: Some(0x12), de: Some(0x0070), ..Default::default() });

    machine.execute_one().unwrap();

    let state = machine.get_cpu_state();
    assert_eq!(state.a, 0x82);
    assert!(state.f.sign);
    assert!(!state.f.zero);
    assert!(!state.f.half_carry);
    assert!(state.f.parity_overflow, "signed overflow: 0x12 + 0x70 crosses 0x7F");
    assert!(!state.f.add_sub);
    assert!(!state.f.carry);
}

#[test]
fn disassembler_skips_a_declared_data_island() {
    let bytes = [
        0x37, 0x3F, 0xDD, 0x7E, 0x00, 0xFD, 0x8E, 0x00, 0x77, 0xDD, 0x2B, 0xFD, 0x2B, 0x2B, 0x10, 0xF2, 0xC9, 0x11,
        0x22, 0x22, 0x33, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0x21, 0x00, 0x00, 0x3E, 0x10, 0xCB, 0x21, 0xCB, 0x10,
        0xED, 0x6A, 0xED, 0x52, 0x38, 0x03, 0x0C, 0x18, 0x01, 0x19, 0x3D, 0x20, 0xEF, 0xC9,
    ];

    let mut machine = Machine::new(None);
    machine.load_executable(&bytes, 0x1000, true).unwrap();

    let mut disasm = Disassembler::new(&machine, 0x1000, bytes.len());
    disasm.add_non_executable_section(0x1011, 0x000A);
    let lines = disasm.disassemble();

    // Per spec section 4.6, `(IX+0)`/`(IY+0)` collapse to `(IX)`/`(IY)`,
    // and DJNZ's target is `next_pc + signed displacement`; the DJNZ
    // opcode sits at 0x100E with next_pc 0x1010 and displacement 0xF2
    // (-14), landing on 0x1002 (see DESIGN.md).
    let texts: Vec<&str> = lines.iter().map(|(_, text)| text.as_str()).collect();
    assert_eq!(
        texts[..10],
        [
            "SCF",
            "CCF",
            "LD A,(IX)",
            "ADC A,(IY)",
            "LD (HL),A",
            "DEC IX",
            "DEC IY",
            "DEC HL",
            "DJNZ 1002h",
            "RET",
        ]
    );
    assert_eq!(texts[10], "DB 11h, 22h, 22h, 33h, 55h, 66h, 77h, 88h, 99h, AAh");
    assert_eq!(lines[10].0, 0x1011);
    assert!(texts.len() > 11, "disassembly must resume after the data island");
}
