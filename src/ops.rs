//! Static operation table.
//!
//! Sixteen operations, indexed by opcode, each carrying the set of
//! addressing modes its source and destination positions accept. The mode
//! bits double as the 1-hot nibble values packed into the first word of an
//! encoded instruction.

use bitflags::bitflags;

bitflags! {
    /// Addressing-mode set for one operand position.
    ///
    /// The bit values are the encoding used in the first instruction word:
    /// each mode occupies one bit of a 4-bit nibble.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AddrModes: u16 {
        /// `#n` literal operand.
        const IMMEDIATE = 1;
        /// Symbol reference.
        const DIRECT = 2;
        /// `*rX` register-indirect.
        const INDIRECT = 4;
        /// `rX` register.
        const REGISTER = 8;
    }
}

const NONE: AddrModes = AddrModes::empty();
const IDXR: AddrModes = AddrModes::from_bits_retain(0b1111);
const DXR: AddrModes = AddrModes::from_bits_retain(0b1110);
const DX: AddrModes = AddrModes::from_bits_retain(0b0110);
const D: AddrModes = AddrModes::DIRECT;

/// One entry of the operation table.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    /// Opcode, 0..=15; equals the table index.
    pub opcode: u8,
    /// Mnemonic as written in source.
    pub mnemonic: &'static str,
    /// Modes the source position accepts; empty means no source operand.
    pub src: AddrModes,
    /// Modes the destination position accepts; empty means no destination.
    pub dst: AddrModes,
}

impl Operation {
    /// Number of operands this operation takes (0, 1, or 2).
    pub fn operand_count(&self) -> usize {
        usize::from(!self.src.is_empty()) + usize::from(!self.dst.is_empty())
    }
}

/// The full operation table, ordered by opcode.
pub const OPERATIONS: [Operation; 16] = [
    Operation { opcode: 0, mnemonic: "mov", src: IDXR, dst: DXR },
    Operation { opcode: 1, mnemonic: "cmp", src: IDXR, dst: IDXR },
    Operation { opcode: 2, mnemonic: "add", src: IDXR, dst: DXR },
    Operation { opcode: 3, mnemonic: "sub", src: IDXR, dst: DXR },
    Operation { opcode: 4, mnemonic: "lea", src: D, dst: DXR },
    Operation { opcode: 5, mnemonic: "clr", src: NONE, dst: DXR },
    Operation { opcode: 6, mnemonic: "not", src: NONE, dst: DXR },
    Operation { opcode: 7, mnemonic: "inc", src: NONE, dst: DXR },
    Operation { opcode: 8, mnemonic: "dec", src: NONE, dst: DXR },
    Operation { opcode: 9, mnemonic: "jmp", src: NONE, dst: DX },
    Operation { opcode: 10, mnemonic: "bne", src: NONE, dst: DX },
    Operation { opcode: 11, mnemonic: "red", src: NONE, dst: DXR },
    Operation { opcode: 12, mnemonic: "prn", src: NONE, dst: IDXR },
    Operation { opcode: 13, mnemonic: "jsr", src: NONE, dst: DX },
    Operation { opcode: 14, mnemonic: "rts", src: NONE, dst: NONE },
    Operation { opcode: 15, mnemonic: "stop", src: NONE, dst: NONE },
];

/// Look up an operation by its exact mnemonic.
pub fn by_name(s: &str) -> Option<&'static Operation> {
    OPERATIONS.iter().find(|op| op.mnemonic == s)
}

/// True if `s` is exactly an operation mnemonic.
pub fn is_operation(s: &str) -> bool {
    by_name(s).is_some()
}

/// True if `s` occurs inside any mnemonic (used to diagnose fused tokens).
pub fn is_operation_loose(s: &str) -> bool {
    !s.is_empty() && OPERATIONS.iter().any(|op| op.mnemonic.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_opcode_ordered() {
        for (i, op) in OPERATIONS.iter().enumerate() {
            assert_eq!(op.opcode as usize, i);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(by_name("mov").unwrap().opcode, 0);
        assert_eq!(by_name("jsr").unwrap().opcode, 13);
        assert!(by_name("move").is_none());
        assert!(by_name("").is_none());
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(by_name("mov").unwrap().operand_count(), 2);
        assert_eq!(by_name("clr").unwrap().operand_count(), 1);
        assert_eq!(by_name("stop").unwrap().operand_count(), 0);
    }

    #[test]
    fn test_mode_masks() {
        let lea = by_name("lea").unwrap();
        assert_eq!(lea.src, AddrModes::DIRECT);
        assert!(lea.dst.contains(AddrModes::REGISTER));
        let jmp = by_name("jmp").unwrap();
        assert!(!jmp.dst.contains(AddrModes::REGISTER));
        assert!(!jmp.dst.contains(AddrModes::IMMEDIATE));
        let prn = by_name("prn").unwrap();
        assert!(prn.dst.contains(AddrModes::IMMEDIATE));
    }

    #[test]
    fn test_loose_match() {
        assert!(is_operation_loose("mo"));
        assert!(is_operation_loose("top"));
        assert!(!is_operation_loose("xyz"));
        assert!(!is_operation_loose(""));
    }
}
