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

//! The `Machine` facade (spec section 6): the single entry point a
//! caller drives — load code/data, poke at CPU state, and run it.

use log::info;

use crate::cpu::{Cpu, CpuStatePatch};
use crate::decoder::Decoder;
use crate::error::{MemoryError, RuntimeError};
use crate::execute::execute;
use crate::memory::Memory;
use crate::port::{NullPort, Port};

/// `[start, start + length)` of the most recently loaded executable
/// region; `execute()` runs until PC leaves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ExecRange {
    start: u16,
    end: u16,
}

impl ExecRange {
    fn contains(&self, pc: u16) -> bool {
        pc >= self.start && pc < self.end
    }
}

pub struct Machine {
    cpu: Cpu,
    memory: Memory,
    port: Box<dyn Port>,
    exec_range: Option<ExecRange>,
    call_depth: i64,
}

impl Machine {
    /// Construct a machine with a caller-supplied port, or the no-op
    /// [`NullPort`] if `port` is `None`.
    pub fn new(port: Option<Box<dyn Port>>) -> Machine {
        info!("Constructing a new machine.");
        Machine {
            cpu: Cpu::new(),
            memory: Memory::new(),
            port: port.unwrap_or_else(|| Box::new(NullPort)),
            exec_range: None,
            call_depth: 0,
        }
    }

    /// Load an executable image, set PC to its load address, and
    /// record `[load_address, load_address + bytes.len())` as the
    /// range `execute()` will run within.
    pub fn load_executable(&mut self, bytes: &[u8], load_address: u16, clear_first: bool) -> Result<(), MemoryError> {
        self.memory.load(bytes, load_address, clear_first)?;
        self.cpu.pc = load_address;
        self.exec_range = Some(ExecRange { start: load_address, end: load_address.wrapping_add(bytes.len() as u16).max(load_address) });
        info!("Loaded executable region [{:#06x}, {:#06x}).", load_address, load_address as usize + bytes.len());
        Ok(())
    }

    /// Load a data image without touching PC or the executable range.
    pub fn load_data(&mut self, bytes: &[u8], load_address: u16, clear_first: bool) -> Result<(), MemoryError> {
        self.memory.load(bytes, load_address, clear_first)
    }

    pub fn set_cpu_state(&mut self, patch: CpuStatePatch) {
        patch.apply(&mut self.cpu);
    }

    pub fn get_cpu_state(&self) -> Cpu {
        self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Run until PC leaves the loaded executable range, or a RET
    /// executes at call-depth zero (spec section 4.5/6).
    pub fn execute(&mut self) -> Result<(), RuntimeError> {
        loop {
            if let Some(range) = self.exec_range {
                if !range.contains(self.cpu.pc) {
                    return Ok(());
                }
            }
            if self.execute_one()? {
                return Ok(());
            }
        }
    }

    /// Fetch and execute exactly one instruction. Returns `true` if
    /// this instruction signalled end-of-execution.
    ///
    /// A fetch that would run past the end of the most recently loaded
    /// executable region fails with [`RuntimeError::OutOfData`] (spec
    /// section 7); there is no such bound if nothing has been loaded yet.
    pub fn execute_one(&mut self) -> Result<bool, RuntimeError> {
        let limit = self.exec_range.map(|r| r.end);
        let decoder = Decoder::new(&self.memory, limit);
        let inst = decoder.fetch(self.cpu.pc)?;
        self.cpu.pc = inst.next_pc;
        let outcome = execute(&mut self.cpu, &mut self.memory, self.port.as_mut(), &mut self.call_depth, &inst);
        Ok(outcome.end_of_execution)
    }

    pub fn dump(&self) -> String {
        self.cpu.dump()
    }

    pub fn dump_memory(&self, address: u16, length: usize) -> &[u8] {
        self.memory.dump(address, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_runs_until_the_end_of_the_loaded_region() {
        let mut machine = Machine::new(None);
        // LD A,5 ; LD B,3 ; ADD A,B
        machine.load_executable(&[0x3E, 0x05, 0x06, 0x03, 0x80], 0x8000, true).unwrap();
        machine.execute().unwrap();
        assert_eq!(machine.get_cpu_state().a, 0x08);
        assert_eq!(machine.get_cpu_state().pc, 0x8005);
    }

    #[test]
    fn execute_stops_early_on_ret_at_zero_call_depth() {
        let mut machine = Machine::new(None);
        machine.load_executable(&[0x3E, 0x07, 0xC9, 0x3E, 0xFF], 0x8000, true).unwrap();
        machine.set_cpu_state(CpuStatePatch { sp: Some(0x9000), ..Default::default() });
        machine.execute().unwrap();
        assert_eq!(machine.get_cpu_state().a, 0x07); // never reaches the second LD A,n
    }

    #[test]
    fn set_cpu_state_only_touches_provided_fields() {
        let mut machine = Machine::new(None);
        let before = machine.get_cpu_state();
        machine.set_cpu_state(CpuStatePatch { a: Some(0x42), ..Default::default() });
        let after = machine.get_cpu_state();
        assert_eq!(after.a, 0x42);
        assert_eq!(after.bc, before.bc);
    }

    #[test]
    fn load_executable_overflow_is_reported() {
        let mut machine = Machine::new(None);
        let err = machine.load_executable(&[0u8; 8], 0xFFFE, true).unwrap_err();
        assert_eq!(err, MemoryError::Overflow { address: 0xFFFE, length: 8 });
    }

    #[test]
    fn fetch_running_past_the_loaded_region_is_a_runtime_error() {
        let mut machine = Machine::new(None);
        // LD HL,nn truncated: only the opcode and low byte were loaded.
        machine.load_executable(&[0x21, 0x34], 0x8000, true).unwrap();
        let err = machine.execute_one().unwrap_err();
        assert_eq!(err, RuntimeError::OutOfData { pc: 0x8000 });
    }
}
