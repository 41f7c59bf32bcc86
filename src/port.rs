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

//! The Z80's 16-bit addressed I/O port space.
//!
//! A peripheral device is accessed very similarly to memory, except
//! through a separate address space, driven only by the `IN`/`OUT`
//! family of instructions (spec section 4.5).

/// A device living on the Z80's I/O bus.
///
/// Unlike memory, the Z80 only ever addresses a port with `IN`/`OUT`;
/// there is no notion of a 16-bit port access, so this trait exposes a
/// single byte-wide read and write.
pub trait Port {
    fn read(&mut self, port: u16) -> u8;
    fn write(&mut self, port: u16, value: u8);
}

/// The "dummy" port used when a `Machine` is constructed without one.
///
/// Reads return `0xFF` (an unconnected bus floats high, the same
/// convention the teacher's memory map uses for unmapped addresses),
/// writes are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPort;

impl Port for NullPort {
    fn read(&mut self, _port: u16) -> u8 {
        0xFF
    }
    fn write(&mut self, _port: u16, _value: u8) {}
}
