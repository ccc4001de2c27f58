//! ASM15 - Two-Pass Assembler for a 15-bit Word-Addressed Machine
//!
//! This library translates line-oriented assembly source into a packed
//! machine-code object image, together with the entry and external symbol
//! artifacts a linker would consume.
//!
//! # Pipeline
//!
//! - **Preprocessing**: user-defined macros (`macr NAME` … `endmacr`) are
//!   expanded by verbatim textual substitution into the `.am` intermediate
//! - **First pass**: every line is validated, the instruction and data
//!   counters grow, and the symbol table fills so each label resolves
//! - **Second pass**: the source is re-parsed and bit-packed words are
//!   emitted into the memory image, recording external use sites
//!
//! The three stages share a per-file context (symbol table, macro table,
//! memory image, counters, reference list, diagnostic sink) that is reset
//! between files.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use asm15::{assemble_stem, AssemblerOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = assemble_stem("path/to/prog", &AssemblerOptions::new())?;
//!     if report.succeeded {
//!         println!("{} code words, {} data words", report.code_words, report.data_words);
//!     }
//!     for d in &report.diagnostics {
//!         eprintln!("{d}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Machine model
//!
//! Words are 15 bits; the low three bits are the ARE relocation field
//! (absolute / relocatable / external). Code loads at address 100, data
//! follows code. Operands come in four addressing modes: immediate
//! (`#n`), direct (symbol), indirect (`*rX`), and register (`rX`).
//!
//! Diagnostics are collected, not thrown: a bad line produces every
//! diagnostic it deserves, the file is marked failed, and the run moves
//! on to the next file.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod first_pass;
pub mod image;
pub mod lexer;
pub mod ops;
pub mod output;
pub mod preprocessor;
pub mod second_pass;
pub mod syntax;
pub mod tables;

pub use diagnostics::{Diagnostic, ErrorKind, Reporter, Severity};
pub use driver::{
    assemble_source, assemble_stem, assemble_stems, AssemblerOptions, FileReport, Stage,
};
pub use error::{AssemblerError, Result};
pub use image::{Are, MemoryImage, Segment, Word, MEMORY_START};
pub use ops::{AddrModes, Operation, OPERATIONS};
pub use tables::{
    ExternalList, Macro, MacroTable, Symbol, SymbolAttrs, SymbolSummary, SymbolTable,
};

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(src: &str) -> FileReport {
        assemble_source("test.as", src, &AssemblerOptions::new())
    }

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_scenario_data_labeling_and_finalization() {
        // X: .data 7, -1, 9 with .entry X: finalization rewrites X from
        // 0 to 100 and the object header shows no code, three data words.
        let report = assemble("X:   .data 7, -1, 9\n.entry X\n");
        assert!(report.succeeded);
        assert_eq!(report.code_words, 0);
        assert_eq!(report.data_words, 3);
        let x = report.symbols.iter().find(|s| s.name == "X").unwrap();
        assert_eq!(x.value, 100);
        assert!(x.attrs.contains(&"data"));
        assert!(x.attrs.contains(&"entry"));
    }

    #[test]
    fn test_scenario_error_recovery() {
        // .data 1,, 2: the extra comma is diagnosed and the file fails,
        // but parsing continued past the first error.
        let report = assemble(".data 1,, 2\n");
        assert!(!report.succeeded);
        assert_eq!(report.stage, Stage::Failed);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.kind == ErrorKind::ExtraCommas));
    }

    #[test]
    fn test_every_code_symbol_sits_inside_the_code_segment() {
        let report = assemble(
            "A: mov r1, r2\nB: prn #3\nC: stop\nD: .data 1, 2\nE: .string \"hi\"\n",
        );
        assert!(report.succeeded);
        let code_end = MEMORY_START + report.code_words;
        for s in &report.symbols {
            if s.attrs.contains(&"code") {
                assert!(s.value >= MEMORY_START && s.value < code_end, "{}", s.name);
            }
            if s.attrs.contains(&"data") {
                assert!(s.value >= code_end, "{}", s.name);
            }
        }
    }

    #[test]
    fn test_attribute_exclusivity() {
        let report = assemble(
            ".extern K\nX: .data 3\n.entry X\nM: stop\n",
        );
        assert!(report.succeeded);
        for s in &report.symbols {
            assert!(!(s.attrs.contains(&"code") && s.attrs.contains(&"data")));
            if s.attrs.contains(&"external") {
                assert_eq!(s.attrs.len(), 1);
            }
        }
    }

    #[test]
    fn test_word_count_identity() {
        // code_words + data_words equals the image length exactly.
        let report = assemble("mov r1, K\n.extern K\nX: .data 4\n");
        assert!(report.succeeded);
        assert_eq!(report.code_words, 3);
        assert_eq!(report.data_words, 1);
    }

    #[test]
    fn test_empty_string_emits_single_terminator() {
        let report = assemble("S: .string \"\"\n");
        assert!(report.succeeded);
        assert_eq!(report.data_words, 1);
    }

    #[test]
    fn test_warnings_do_not_fail_the_file() {
        let report = assemble(".entry\nstop\n");
        assert!(report.succeeded);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn test_report_serializes() {
        let report = assemble("stop\n");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"succeeded\":true"));
        assert!(json.contains("\"code_words\":1"));
    }
}
