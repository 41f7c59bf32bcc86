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

//! A Zilog Z80 toolchain: interpreter, disassembler, and two-pass
//! assembler over a flat 64 KiB address space.
//!
//! [`Machine`] is the entry point for interpretation; [`Disassembler`]
//! turns a range of memory back into text; [`asm::Assembler`] turns
//! text into bytes. None of the three depend on the others' internal
//! state beyond [`tables`], the shared opcode tables all three read.

pub mod asm;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod error;
pub mod execute;
pub mod machine;
pub mod memory;
pub mod port;
pub mod tables;

pub use asm::{AssembledProgram, Assembler};
pub use cpu::{Cpu, CpuStatePatch};
pub use disasm::Disassembler;
pub use error::{AsmError, AsmErrorKind, MemoryError, RuntimeError};
pub use machine::Machine;
pub use port::{NullPort, Port};
