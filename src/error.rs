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

//! Error types shared by the memory, execution, and assembler layers.

use thiserror::Error;

/// Failure of a bulk load into [`crate::memory::Memory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("load of {length} byte(s) at address {address:#06x} overflows the 64 KiB address space")]
    Overflow { address: u16, length: usize },
}

/// Failure while running the instruction fetch/execute loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("instruction fetch at {pc:#06x} ran past the end of the loaded region")]
    OutOfData { pc: u16 },
}

/// One kind of assembler error, per spec section 7.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AsmErrorKind {
    #[error("label `{0}' is already defined")]
    DuplicateLabel(String),
    #[error("ORG value is out of the 16-bit address range")]
    OrgOutOfRange,
    #[error("invalid ORG expression")]
    InvalidOrg,
    #[error("unrecognised instruction `{0}'")]
    UnrecognisedInstruction(String),
    #[error("operand `{0}' could not be resolved")]
    UnresolvedOperand(String),
    #[error("`{0}' is already defined as an EQU")]
    EquRedefinition(String),
    #[error("current address overflowed past 0xFFFF")]
    AddressOutOfRange,
    #[error("invalid value for DB/DW/DS: `{0}'")]
    InvalidDataValue(String),
    #[error("value {0} is out of range for the data directive")]
    DataValueOutOfRange(i64),
    #[error("displacement {0} is out of the signed 8-bit range")]
    DisplacementOutOfRange(i64),
    #[error("operand value {0} is out of range")]
    OperandOutOfRange(i64),
    #[error("division or modulo by zero")]
    DivideByZero,
    #[error("`{0}' collides with a reserved word")]
    ReservedWordCollision(String),
}

/// An assembler error tied to the source line that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct AsmError {
    pub line: usize,
    pub kind: AsmErrorKind,
}

impl AsmError {
    pub fn new(line: usize, kind: AsmErrorKind) -> AsmError {
        AsmError { line, kind }
    }

    /// Fatal errors halt pass 1 outright (spec section 7).
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, AsmErrorKind::AddressOutOfRange)
    }
}
