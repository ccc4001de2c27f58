//! First pass: validation, counters, symbol collection.
//!
//! Reads the expanded source line by line, validates every statement,
//! grows the instruction and data counters, and populates the symbol
//! table so that by the end of the pass every label has a resolvable
//! address. No words are emitted here; sizing is all that matters.
//!
//! Tokenization in this pass splits on whitespace only. The second pass
//! splits on whitespace *and* commas; keeping the two apart preserves the
//! operand-detection behavior the passes were written against.

use crate::diagnostics::{ErrorKind, Reporter};
use crate::image::MemoryImage;
use crate::lexer::{self, Directive, NameIssue};
use crate::ops::{self, AddrModes, Operation};
use crate::syntax;
use crate::tables::{MacroTable, SymbolAttrs, SymbolTable};

/// First-pass walker over one expanded source file.
pub struct FirstPass<'a> {
    symbols: &'a mut SymbolTable,
    macros: &'a MacroTable,
    image: &'a mut MemoryImage,
    reporter: &'a mut Reporter,
}

/// Run the first pass. Returns `true` when the file is still valid.
pub fn run(
    expanded: &str,
    symbols: &mut SymbolTable,
    macros: &MacroTable,
    image: &mut MemoryImage,
    reporter: &mut Reporter,
) -> bool {
    let mut pass = FirstPass {
        symbols,
        macros,
        image,
        reporter,
    };
    for (index, line) in expanded.lines().enumerate() {
        pass.reporter.set_line(index as u32 + 1);
        if line.chars().count() > lexer::MAX_LINE_LEN {
            pass.reporter.error(ErrorKind::LineTooLong);
            continue;
        }
        pass.parse_line(line, None);
    }
    pass.reporter.is_valid()
}

impl FirstPass<'_> {
    fn parse_line(&mut self, line: &str, pending_label: Option<&str>) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || lexer::is_comment(trimmed) {
            return;
        }
        let Some(first) = trimmed.split_whitespace().next() else {
            return;
        };
        let rest = &trimmed[first.len()..];

        if lexer::is_label_decl_strict(first) {
            self.handle_label_decl(&first[..first.len() - 1], rest, pending_label);
        } else if lexer::is_label_decl_loose(first) {
            // `NAME:stmt` with the space dropped; diagnose and re-split.
            self.reporter.error(ErrorKind::MissingSpaceAfterLabel);
            if let Some(colon) = trimmed.find(':') {
                let (name, fused) = trimmed.split_at(colon);
                self.handle_label_decl(name, &fused[1..], pending_label);
            }
        } else if let Some(d) = lexer::directive(first) {
            self.handle_directive(d, rest, pending_label);
        } else if let Some(d) = lexer::directive_loose(first) {
            self.reporter.error(ErrorKind::MissingSpaceAfterInstruction);
            if let Some(idx) = trimmed.find(d.name()) {
                self.handle_directive(d, &trimmed[idx + d.name().len()..], pending_label);
            }
        } else if let Some(op) = ops::by_name(first) {
            self.handle_operation(op, rest, pending_label);
        } else if first.starts_with('.') {
            self.reporter.error(ErrorKind::UndefinedInstruction);
        } else if pending_label.is_some() {
            // A label must introduce a directive or an operation.
            self.reporter.error(ErrorKind::UndefinedOperation);
        } else if first.chars().count() > 1 {
            self.reporter.error(ErrorKind::UndefinedToken);
        } else {
            self.reporter.error(ErrorKind::IllegalCharAtLineStart);
        }
    }

    fn handle_label_decl(&mut self, name: &str, rest: &str, pending: Option<&str>) {
        if pending.is_some() {
            // A label cannot label another label.
            self.reporter.error(ErrorKind::IllegalLabelUse);
        }
        let name_ok = self.check_label_name(name);
        if rest.trim().is_empty() {
            self.reporter.error(ErrorKind::IllegalLabelUse);
            return;
        }
        // Parse the statement even when the label itself is bad, so the
        // counters and any further diagnostics stay accurate.
        self.parse_line(rest, name_ok.then_some(name));
    }

    fn check_label_name(&mut self, name: &str) -> bool {
        if let Err(issue) = lexer::check_name(name) {
            self.reporter.error(name_issue_kind(issue));
            return false;
        }
        if self.macros.contains(name) || self.symbols.is_defined(name) {
            self.reporter.error(ErrorKind::NameAlreadyInUse);
            return false;
        }
        true
    }

    fn define(&mut self, name: &str, value: Option<u32>, attrs: SymbolAttrs) {
        if let Err(kind) = self.symbols.add_symbol(name, value, attrs) {
            self.reporter.error(kind);
        }
    }

    fn handle_directive(&mut self, d: Directive, args: &str, pending: Option<&str>) {
        match d {
            Directive::Data => {
                let dc_before = self.image.dc();
                if let Some(count) = syntax::count_data_arguments(args, self.reporter) {
                    if let Some(label) = pending {
                        self.define(label, Some(dc_before), SymbolAttrs::DATA);
                    }
                    self.image.inc_dc(count);
                }
            }
            Directive::String => {
                let dc_before = self.image.dc();
                if let Some(len) = syntax::check_string_argument(args, self.reporter) {
                    if let Some(label) = pending {
                        self.define(label, Some(dc_before), SymbolAttrs::DATA);
                    }
                    // One word per character plus the terminator.
                    self.image.inc_dc(len + 1);
                }
            }
            Directive::Entry | Directive::Extern => {
                // A label in front of `.entry`/`.extern` binds nothing.
                self.handle_symbol_directive(d, args);
            }
        }
    }

    fn handle_symbol_directive(&mut self, d: Directive, args: &str) {
        let mut tokens = args.split_whitespace();
        let Some(name) = tokens.next() else {
            self.reporter.warning(match d {
                Directive::Entry => ErrorKind::EmptyEntryDeclaration,
                _ => ErrorKind::EmptyExternalDeclaration,
            });
            return;
        };
        if tokens.next().is_some() {
            self.reporter.error(ErrorKind::IllegalCharsAtLineEnd);
            return;
        }
        if let Err(issue) = lexer::check_name(name) {
            self.reporter.error(name_issue_kind(issue));
            return;
        }
        if self.macros.contains(name) {
            self.reporter.error(ErrorKind::NameAlreadyInUse);
            return;
        }
        let attrs = match d {
            Directive::Entry => SymbolAttrs::ENTRY,
            _ => SymbolAttrs::EXTERNAL,
        };
        self.define(name, None, attrs);
    }

    fn handle_operation(&mut self, op: &'static Operation, args: &str, pending: Option<&str>) {
        let ic_before = self.image.ic();
        let (operands, mut valid) = syntax::split_operands(args, self.reporter);
        let expected = op.operand_count();
        if operands.len() > expected {
            self.reporter.error(ErrorKind::ExtraOperands);
            valid = false;
        }

        // A single provided operand fills the destination slot when the
        // operation takes exactly one.
        let (src_tok, dst_tok) = match (expected, operands.len()) {
            (2, _) => (operands.first().copied(), operands.get(1).copied()),
            (1, _) => (None, operands.last().copied()),
            _ => (None, None),
        };

        let mut src_mode = None;
        let mut dst_mode = None;

        if expected == 2 {
            match src_tok {
                Some(t) => {
                    src_mode = self.classify_operand(t, op.src, true);
                    valid &= src_mode.is_some();
                }
                None => {
                    self.reporter.error(ErrorKind::RequiredSourceMissing);
                    valid = false;
                }
            }
        }
        if expected >= 1 {
            match dst_tok {
                Some(t) => {
                    dst_mode = self.classify_operand(t, op.dst, false);
                    valid &= dst_mode.is_some();
                }
                None => {
                    self.reporter.error(ErrorKind::RequiredDestMissing);
                    valid = false;
                }
            }
        }

        if valid {
            let size = instruction_size(src_mode, dst_mode);
            if let Some(label) = pending {
                self.define(label, Some(ic_before), SymbolAttrs::CODE);
            }
            self.image.inc_ic(size);
            tracing::trace!(mnemonic = op.mnemonic, size, ic = ic_before, "sized operation");
        }
    }

    /// Classify one operand and check it against the allowed mode mask.
    /// Reports and returns `None` on any mismatch.
    fn classify_operand(
        &mut self,
        token: &str,
        allowed: AddrModes,
        is_src: bool,
    ) -> Option<AddrModes> {
        let mode = if lexer::is_immediate(token) {
            AddrModes::IMMEDIATE
        } else if lexer::is_register(token) {
            AddrModes::REGISTER
        } else if lexer::is_indirect(token) {
            AddrModes::INDIRECT
        } else if lexer::is_label_ref(token) {
            AddrModes::DIRECT
        } else {
            self.reporter.error(if is_src {
                ErrorKind::IllegalSrcOperandKind
            } else {
                ErrorKind::IllegalDstOperandKind
            });
            return None;
        };
        if !allowed.contains(mode) {
            self.reporter.error(if is_src {
                ErrorKind::SrcOperandKindNotAllowed
            } else {
                ErrorKind::DstOperandKindNotAllowed
            });
            return None;
        }
        Some(mode)
    }
}

fn name_issue_kind(issue: NameIssue) -> ErrorKind {
    match issue {
        NameIssue::TooLong => ErrorKind::IllegalLabelLength,
        NameIssue::BadChars => ErrorKind::IllegalLabelCharacters,
        NameIssue::ReservedRegister => ErrorKind::LabelUsesReservedRegisterName,
        NameIssue::ReservedOperation => ErrorKind::LabelUsesReservedOperationName,
        NameIssue::ReservedKeyword => ErrorKind::LabelUsesReservedKeyword,
    }
}

/// Size of an instruction in words, from the operand modes in use.
pub fn instruction_size(src: Option<AddrModes>, dst: Option<AddrModes>) -> u32 {
    const PACKABLE: AddrModes = AddrModes::REGISTER.union(AddrModes::INDIRECT);
    match (src, dst) {
        (None, None) => 1,
        (Some(s), Some(d)) if PACKABLE.contains(s) && PACKABLE.contains(d) => 2,
        (Some(_), Some(_)) => 3,
        _ => 2,
    }
}
