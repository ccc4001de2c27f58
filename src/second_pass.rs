//! Second pass: word emission.
//!
//! Re-parses the expanded source and writes the encoded words into the
//! memory image. The symbol table is complete by now, so direct operands
//! resolve to addresses and references to external symbols are recorded
//! as use sites for the `.ext` file.
//!
//! Tokenization here splits on whitespace *and* commas, unlike the first
//! pass.

use crate::diagnostics::{ErrorKind, Reporter};
use crate::image::{Are, MemoryImage, Segment};
use crate::lexer::{self, Directive};
use crate::ops::{self, AddrModes, Operation};
use crate::syntax;
use crate::tables::{ExternalList, SymbolTable};

/// One detected operand, ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Immediate(i32),
    Register(u8),
    Indirect(u8),
    Direct(String),
}

impl Operand {
    fn mode(&self) -> AddrModes {
        match self {
            Operand::Immediate(_) => AddrModes::IMMEDIATE,
            Operand::Register(_) => AddrModes::REGISTER,
            Operand::Indirect(_) => AddrModes::INDIRECT,
            Operand::Direct(_) => AddrModes::DIRECT,
        }
    }

    fn register(&self) -> Option<u8> {
        match self {
            Operand::Register(r) | Operand::Indirect(r) => Some(*r),
            _ => None,
        }
    }
}

/// Second-pass walker over one expanded source file.
pub struct SecondPass<'a> {
    symbols: &'a SymbolTable,
    externals: &'a mut ExternalList,
    image: &'a mut MemoryImage,
    reporter: &'a mut Reporter,
}

/// Run the second pass. Returns `true` when the file is still valid.
pub fn run(
    expanded: &str,
    symbols: &SymbolTable,
    externals: &mut ExternalList,
    image: &mut MemoryImage,
    reporter: &mut Reporter,
) -> bool {
    let mut pass = SecondPass {
        symbols,
        externals,
        image,
        reporter,
    };
    for (index, line) in expanded.lines().enumerate() {
        pass.reporter.set_line(index as u32 + 1);
        pass.emit_line(line);
    }
    pass.reporter.is_valid()
}

fn split_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

impl SecondPass<'_> {
    fn emit_line(&mut self, line: &str) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || lexer::is_comment(trimmed) {
            return;
        }
        let Some(first) = split_tokens(trimmed).next() else {
            return;
        };

        if lexer::is_label_decl_strict(first) {
            // The label was bound in pass 1; only the statement matters.
            self.emit_line(&trimmed[first.len()..]);
            return;
        }
        if let Some(d) = lexer::directive(first) {
            let args = &trimmed[first.len()..];
            match d {
                Directive::Data => {
                    for value in syntax::parse_data_values(args) {
                        self.image.add_word(value, Segment::Data);
                    }
                }
                Directive::String => {
                    if let Some(content) = syntax::extract_string(args) {
                        for c in content.chars() {
                            self.image.add_word(c as i32, Segment::Data);
                        }
                        self.image.add_word(0, Segment::Data);
                    }
                }
                // Declarations contribute no words.
                Directive::Entry | Directive::Extern => {}
            }
            return;
        }
        if let Some(op) = ops::by_name(first) {
            self.emit_operation(op, &trimmed[first.len()..]);
        }
        // Anything else was already rejected by pass 1.
    }

    fn emit_operation(&mut self, op: &'static Operation, args: &str) {
        let operands: Vec<&str> = split_tokens(args).collect();

        let (src_tok, dst_tok) = match (op.operand_count(), operands.len()) {
            (2, _) => (operands.first().copied(), operands.get(1).copied()),
            (1, _) => (None, operands.last().copied()),
            _ => (None, None),
        };

        let src = src_tok.and_then(|t| self.detect_operand(t));
        let dst = dst_tok.and_then(|t| self.detect_operand(t));

        self.write_first_word(op, src.as_ref(), dst.as_ref());
        self.write_operand_words(src.as_ref(), dst.as_ref());
    }

    /// Detect the addressing mode of an operand token. Reports when a
    /// direct operand cannot be resolved.
    fn detect_operand(&mut self, token: &str) -> Option<Operand> {
        if let Some(value) = lexer::immediate_value(token) {
            return Some(Operand::Immediate(value));
        }
        if let Some(r) = lexer::register_number(token) {
            return Some(Operand::Register(r));
        }
        if let Some(r) = lexer::indirect_register(token) {
            return Some(Operand::Indirect(r));
        }
        let Some(symbol) = self.symbols.lookup(token) else {
            self.reporter.error(ErrorKind::LabelNotDefined);
            return None;
        };
        if self.symbols.is_entry(token)
            && !self.symbols.is_defined(token)
            && !self.symbols.is_external(token)
        {
            self.reporter.error(ErrorKind::EntryDeclaredButNotDefined);
            return None;
        }
        Some(Operand::Direct(symbol.name.clone()))
    }

    /// First word of an instruction: `ARE | dst<<3 | src<<7 | opcode<<11`,
    /// with 1-hot mode nibbles and ARE = A.
    fn write_first_word(&mut self, op: &Operation, src: Option<&Operand>, dst: Option<&Operand>) {
        let src_bits = src.map(|o| o.mode().bits()).unwrap_or(0);
        let dst_bits = dst.map(|o| o.mode().bits()).unwrap_or(0);
        let word = Are::A.bits()
            | (dst_bits << 3)
            | (src_bits << 7)
            | (u16::from(op.opcode) << 11);
        self.image.add_word(i32::from(word), Segment::Code);
    }

    fn write_operand_words(&mut self, src: Option<&Operand>, dst: Option<&Operand>) {
        // Two register-class operands share one word.
        if let (Some(rs), Some(rd)) = (
            src.and_then(Operand::register),
            dst.and_then(Operand::register),
        ) {
            let word = (u16::from(rs) << 6) | (u16::from(rd) << 3) | Are::A.bits();
            self.image.add_word(i32::from(word), Segment::Code);
            return;
        }

        if let Some(operand) = src {
            match operand {
                Operand::Register(r) | Operand::Indirect(r) => {
                    let word = (u16::from(*r) << 6) | Are::A.bits();
                    self.image.add_word(i32::from(word), Segment::Code);
                }
                Operand::Direct(name) => self.write_direct_word(name),
                Operand::Immediate(v) => self.write_immediate_word(*v),
            }
        }
        if let Some(operand) = dst {
            match operand {
                Operand::Register(r) | Operand::Indirect(r) => {
                    let word = (u16::from(*r) << 3) | Are::A.bits();
                    self.image.add_word(i32::from(word), Segment::Code);
                }
                Operand::Direct(name) => self.write_direct_word(name),
                Operand::Immediate(v) => self.write_immediate_word(*v),
            }
        }
    }

    /// Word for a direct operand. Internal symbols relocate; externals
    /// emit a bare E word and record the use site.
    fn write_direct_word(&mut self, name: &str) {
        if self.symbols.is_external(name) {
            let base = self.image.ic();
            self.image.add_word(i32::from(Are::E.bits()), Segment::Code);
            self.externals.add_site(name, base, base + 1);
        } else {
            let value = self.symbols.lookup(name).map(|s| s.value).unwrap_or(0);
            let word = ((value as i32) << 3) | i32::from(Are::R.bits());
            self.image.add_word(word, Segment::Code);
        }
    }

    fn write_immediate_word(&mut self, value: i32) {
        let word = (value << 3) | i32::from(Are::A.bits());
        self.image.add_word(word, Segment::Code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::first_pass;
    use crate::tables::MacroTable;
    use pretty_assertions::assert_eq;

    struct Fixture {
        symbols: SymbolTable,
        externals: ExternalList,
        image: MemoryImage,
        reporter: Reporter,
    }

    /// Run pass 1, finalize, then pass 2, the way the driver does.
    fn assemble(src: &str) -> Fixture {
        let mut f = Fixture {
            symbols: SymbolTable::new(),
            externals: ExternalList::new(),
            image: MemoryImage::new(),
            reporter: Reporter::new("t.am"),
        };
        let macros = MacroTable::new();
        assert!(
            first_pass::run(src, &mut f.symbols, &macros, &mut f.image, &mut f.reporter),
            "pass 1 failed: {:?}",
            f.reporter.diagnostics()
        );
        f.image.finalize_counters();
        f.symbols.finalize(f.image.icf(), &mut f.externals);
        f.image.alloc();
        run(
            src,
            &f.symbols,
            &mut f.externals,
            &mut f.image,
            &mut f.reporter,
        );
        f
    }

    #[test]
    fn test_register_pair_packs() {
        // mov r3, r5 → opcode word, then the packed register word.
        let f = assemble("mov r3, r5\n");
        assert!(f.reporter.is_valid());
        assert_eq!(f.image.words().len(), 2);
        let first = f.image.word_at(100).unwrap().bits();
        assert_eq!(first, (8 << 7) | (8 << 3) | 4);
        assert_eq!(f.image.word_at(101).unwrap().bits(), (3 << 6) | (5 << 3) | 4);
    }

    #[test]
    fn test_scenario_one_register_op() {
        // add r1, r2 → opcode 2, register mode in both nibbles, ARE = A,
        // then the packed register word.
        let f = assemble("MAIN: add r1, r2\n");
        assert_eq!(f.image.icf(), 102);
        assert_eq!(
            f.image.word_at(100).unwrap().bits(),
            (2 << 11) | (8 << 7) | (8 << 3) | 4
        );
        assert_eq!(
            f.image.word_at(101).unwrap().bits(),
            (1 << 6) | (2 << 3) | 4
        );
        assert_eq!(f.symbols.lookup("MAIN").unwrap().value, 100);
    }

    #[test]
    fn test_external_reference() {
        let f = assemble(".extern K\n  jmp K\n");
        assert!(f.reporter.is_valid());
        assert_eq!(f.image.words().len(), 2);
        // The operand word is exactly E.
        assert_eq!(f.image.word_at(101).unwrap().bits(), 1);
        let refs: Vec<_> = f.externals.iter().collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0, "K");
        assert_eq!(refs[0].1[0].base, 101);
        assert_eq!(refs[0].1[0].offset, 102);
    }

    #[test]
    fn test_internal_direct_operand_relocates() {
        let f = assemble("jmp L\nL: stop\n");
        // jmp first word at 100, operand at 101 → (102<<3)|R.
        assert_eq!(f.image.word_at(101).unwrap().bits(), (102 << 3) | 2);
        assert_eq!(f.image.word_at(102).unwrap().bits(), (15 << 11) | 4);
    }

    #[test]
    fn test_negative_immediate() {
        // prn #-1 → operand word is 15-bit -1 shifted over ARE, OR A.
        let f = assemble("prn #-1\n");
        let w = f.image.word_at(101).unwrap().bits();
        assert_eq!(w, ((0x7FFF << 3) | 0x4) & 0x7FFF);
        assert_eq!(w, 0x7FFC);
    }

    #[test]
    fn test_data_and_string_emission() {
        let f = assemble("X: .data 7, -1, 9\nS: .string \"ab\"\n");
        assert!(f.reporter.is_valid());
        // No code: data starts at 100.
        assert_eq!(f.image.word_at(100).unwrap().bits(), 7);
        assert_eq!(f.image.word_at(101).unwrap().bits(), 0x7FFF);
        assert_eq!(f.image.word_at(102).unwrap().bits(), 9);
        assert_eq!(f.image.word_at(103).unwrap().bits(), u16::from(b'a'));
        assert_eq!(f.image.word_at(104).unwrap().bits(), u16::from(b'b'));
        assert_eq!(f.image.word_at(105).unwrap().bits(), 0);
    }

    #[test]
    fn test_data_follows_code() {
        let f = assemble("mov r1, r2\nX: .data 5\n");
        assert_eq!(f.image.icf(), 102);
        assert_eq!(f.image.dcf(), 103);
        assert_eq!(f.image.word_at(102).unwrap().bits(), 5);
        // X was moved past the code segment.
        assert_eq!(f.symbols.lookup("X").unwrap().value, 102);
    }

    #[test]
    fn test_single_register_source_with_direct_dest() {
        // mov r1, X → three words: first, (1<<6)|A, then X's address word.
        let f = assemble("mov r1, X\nX: .data 1\n");
        assert_eq!(f.image.icf(), 103);
        assert_eq!(f.image.word_at(101).unwrap().bits(), (1 << 6) | 4);
        assert_eq!(f.image.word_at(102).unwrap().bits(), (103 << 3) | 2);
    }

    #[test]
    fn test_indirect_operands_pack_like_registers() {
        let f = assemble("mov *r2, *r6\n");
        assert_eq!(f.image.words().len(), 2);
        assert_eq!(f.image.word_at(100).unwrap().bits(), (4 << 7) | (4 << 3) | 4);
        assert_eq!(f.image.word_at(101).unwrap().bits(), (2 << 6) | (6 << 3) | 4);
    }

    #[test]
    fn test_undefined_operand_label_fails_pass_two() {
        let mut f = Fixture {
            symbols: SymbolTable::new(),
            externals: ExternalList::new(),
            image: MemoryImage::new(),
            reporter: Reporter::new("t.am"),
        };
        let macros = MacroTable::new();
        let src = "jmp NOWHERE\n";
        assert!(first_pass::run(
            src,
            &mut f.symbols,
            &macros,
            &mut f.image,
            &mut f.reporter
        ));
        f.image.finalize_counters();
        f.symbols.finalize(f.image.icf(), &mut f.externals);
        f.image.alloc();
        assert!(!run(
            src,
            &f.symbols,
            &mut f.externals,
            &mut f.image,
            &mut f.reporter
        ));
        assert!(f.reporter.has(ErrorKind::LabelNotDefined));
    }

    #[test]
    fn test_image_length_matches_counters() {
        let f = assemble("MAIN: mov r1, r2\nprn #5\nX: .data 1, 2\nstop\n");
        assert_eq!(
            f.image.words().len() as u32,
            f.image.code_len() + f.image.data_len()
        );
        // mov:2 + prn:2 + stop:1 = 5 code words, 2 data words.
        assert_eq!(f.image.code_len(), 5);
        assert_eq!(f.image.data_len(), 2);
    }
}
