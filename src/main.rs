//! ASM15 CLI
//!
//! Command-line front end: assembles each source stem in order, printing
//! diagnostics to stderr and a per-file summary to stdout.

use asm15::{assemble_stem, AssemblerError, AssemblerOptions, FileReport};
use clap::{Parser, ValueEnum};
use std::process::ExitCode;

/// Two-pass assembler for a 15-bit word-addressed machine.
///
/// Each argument names a source stem: `prog` reads `prog.as`, writes the
/// macro-expanded `prog.am`, and on success `prog.ob` plus `prog.ent` /
/// `prog.ext` when entries or external references exist.
#[derive(Parser, Debug)]
#[command(name = "asm15")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source file stems (without the .as extension)
    files: Vec<String>,

    /// Output format for the per-file summary
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Skip writing the per-file diagnostic log
    #[arg(long)]
    no_log: bool,

    /// Dump the symbol table through the tracing subscriber
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (only output essential info)
    #[arg(short, long)]
    quiet: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("asm15=debug")
            .init();
    }

    // Only an empty invocation is a hard failure; per-file problems are
    // reported and the run keeps going.
    if args.files.is_empty() {
        eprintln!("{}", AssemblerError::NoSourceFiles);
        return ExitCode::FAILURE;
    }

    let options = AssemblerOptions {
        write_log: !args.no_log,
        dump_symbols: args.verbose,
    };

    for stem in &args.files {
        match assemble_stem(stem, &options) {
            Ok(report) => {
                for d in &report.diagnostics {
                    eprintln!("{d}");
                }
                match args.format {
                    OutputFormat::Human => print_human(&report, &args),
                    OutputFormat::Json => print_json(&report),
                }
            }
            Err(e) => {
                if !args.quiet {
                    eprintln!("Error assembling {stem}: {e}");
                }
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_human(report: &FileReport, args: &Args) {
    if args.quiet {
        println!(
            "{}: {}",
            report.stem,
            if report.succeeded { "ok" } else { "failed" }
        );
        return;
    }

    println!("File: {}.as", report.stem);
    println!(
        "  Status:     {}",
        if report.succeeded { "ok" } else { "failed" }
    );
    if report.succeeded {
        println!("  Code words: {}", report.code_words);
        println!("  Data words: {}", report.data_words);
    }
    if !report.symbols.is_empty() && args.verbose {
        println!("  Symbols:");
        for s in &report.symbols {
            println!("    {:<31} {:04}  {}", s.name, s.value, s.attrs.join(","));
        }
    }
    if !report.diagnostics.is_empty() {
        println!("  Diagnostics: {}", report.diagnostics.len());
    }
    println!();
}

fn print_json(report: &FileReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing report: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["asm15", "prog"]).unwrap();
        assert_eq!(args.files.len(), 1);
        assert!(!args.verbose);
    }

    #[test]
    fn test_multiple_files() {
        let args = Args::try_parse_from(["asm15", "a", "b"]).unwrap();
        assert_eq!(args.files.len(), 2);
    }

    #[test]
    fn test_format_options() {
        let args = Args::try_parse_from(["asm15", "-f", "json", "prog"]).unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
    }

    #[test]
    fn test_empty_invocation_parses() {
        // Zero stems is valid for the parser; main turns it into exit 1.
        let args = Args::try_parse_from(["asm15"]).unwrap();
        assert!(args.files.is_empty());
    }
}
