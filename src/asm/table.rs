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

//! The assembler's union instruction index (spec section 4.7): all
//! seven decode tables from [`crate::tables`] flattened into one list,
//! sorted by mnemonic text and looked up by binary search, the way the
//! spec calls out explicitly rather than a hash map.

use std::sync::OnceLock;

use crate::tables::{tables, HandlerId, InstructionDef, Prefix};

#[derive(Clone, Debug)]
pub struct AsmInstruction {
    pub text: String,
    pub prefix: Prefix,
    pub def: InstructionDef,
}

pub struct InstructionIndex {
    entries: Vec<AsmInstruction>,
}

impl InstructionIndex {
    fn build() -> InstructionIndex {
        let t = tables();
        let mut entries = Vec::new();
        for (prefix, table) in [
            (Prefix::None, t.main.as_ref()),
            (Prefix::Cb, t.cb.as_ref()),
            (Prefix::Ed, t.ed.as_ref()),
            (Prefix::Dd, t.dd.as_ref()),
            (Prefix::Fd, t.fd.as_ref()),
            (Prefix::DdCb, t.dd_cb.as_ref()),
            (Prefix::FdCb, t.fd_cb.as_ref()),
        ] {
            for def in table.iter() {
                if def.handler == HandlerId::Unimplemented {
                    continue;
                }
                entries.push(AsmInstruction { text: def.mnemonic.clone(), prefix, def: def.clone() });
            }
        }
        entries.sort_by(|a, b| a.text.cmp(&b.text).then(prefix_rank(a.prefix).cmp(&prefix_rank(b.prefix))));
        InstructionIndex { entries }
    }

    /// Find an entry whose mnemonic text matches `text` exactly. When
    /// more than one prefix table shares the same text (shouldn't
    /// normally happen since DD/FD substitute IX/IY into the text),
    /// the first in table order wins.
    pub fn lookup(&self, text: &str) -> Option<&AsmInstruction> {
        let idx = self.entries.partition_point(|e| e.text.as_str() < text);
        self.entries.get(idx).filter(|e| e.text == text)
    }

    /// `true` if `word` is the first word of some instruction's
    /// mnemonic text (spec section 4.7 reserved-word rule: a label or
    /// EQU name may not collide with an instruction mnemonic).
    pub fn is_mnemonic_keyword(&self, word: &str) -> bool {
        self.entries.iter().any(|e| e.text.split_whitespace().next() == Some(word))
    }
}

fn prefix_rank(prefix: Prefix) -> u8 {
    match prefix {
        Prefix::None => 0,
        Prefix::Cb => 1,
        Prefix::Ed => 2,
        Prefix::Dd => 3,
        Prefix::Fd => 4,
        Prefix::DdCb => 5,
        Prefix::FdCb => 6,
    }
}

static INDEX: OnceLock<InstructionIndex> = OnceLock::new();

pub fn instruction_index() -> &'static InstructionIndex {
    INDEX.get_or_init(InstructionIndex::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_a_simple_instruction() {
        let idx = instruction_index();
        let found = idx.lookup("NOP").unwrap();
        assert_eq!(found.def.opcode, 0x00);
        assert_eq!(found.prefix, Prefix::None);
    }

    #[test]
    fn looks_up_an_instruction_with_an_immediate_placeholder() {
        let idx = instruction_index();
        let found = idx.lookup("LD A,n").unwrap();
        assert_eq!(found.prefix, Prefix::None);
    }

    #[test]
    fn looks_up_an_indexed_instruction() {
        let idx = instruction_index();
        let found = idx.lookup("LD A,(IX+d)").unwrap();
        assert_eq!(found.prefix, Prefix::Dd);
    }

    #[test]
    fn unrecognised_text_is_not_found() {
        let idx = instruction_index();
        assert!(idx.lookup("NOT AN INSTRUCTION").is_none());
    }

    #[test]
    fn undocumented_opcodes_are_not_indexed() {
        let idx = instruction_index();
        assert!(idx.lookup("NOP").is_some());
        // SLL has no canonical mnemonic text and must never be reachable
        // from source text since it was routed to Unimplemented.
        for text in ["SLL A", "SLL B", "SLS A"] {
            assert!(idx.lookup(text).is_none());
        }
    }
}
