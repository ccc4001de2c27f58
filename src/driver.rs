//! Per-file driver.
//!
//! Owns the per-file context (symbol and macro tables, memory image,
//! external-reference list, diagnostic reporter) and walks the stage
//! machine:
//!
//! ```text
//! start → parsing_macros → first_run → second_run → create_outputs
//!                    ↓           ↓           ↓
//!                  failed      failed      failed
//! ```
//!
//! A failed file writes no artifacts but never stops the run; the next
//! file starts from a fresh context.

use crate::diagnostics::{Diagnostic, ErrorKind, Reporter};
use crate::error::{AssemblerError, Result};
use crate::image::MemoryImage;
use crate::tables::{ExternalList, MacroTable, SymbolTable, SymbolSummary};
use crate::{first_pass, output, preprocessor, second_pass};
use serde::Serialize;
use std::fs;

/// Stage of the per-file state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing has run yet.
    Start,
    /// Macro preprocessing.
    ParsingMacros,
    /// First pass.
    FirstRun,
    /// Second pass.
    SecondRun,
    /// Artifact creation.
    CreateOutputs,
    /// A stage reported errors; later stages were skipped.
    Failed,
}

/// Knobs for a single assembly run.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    /// Write the per-file `<stem>.log` when diagnostics were collected.
    pub write_log: bool,
    /// Dump the symbol table through `tracing` after pass 1.
    pub dump_symbols: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        AssemblerOptions {
            write_log: true,
            dump_symbols: false,
        }
    }
}

impl AssemblerOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Outcome of assembling one source file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// Source stem (path without the `.as` suffix).
    pub stem: String,
    /// True when every stage completed and artifacts were written (or
    /// would be written, for in-memory runs).
    pub succeeded: bool,
    /// Last stage reached.
    pub stage: Stage,
    /// Number of code words, when the file assembled.
    pub code_words: u32,
    /// Number of data words, when the file assembled.
    pub data_words: u32,
    /// Symbol summaries in table-iteration order.
    pub symbols: Vec<SymbolSummary>,
    /// Every diagnostic collected for this file.
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-file mutable context threaded through the stages.
struct FileContext {
    symbols: SymbolTable,
    macros: MacroTable,
    image: MemoryImage,
    externals: ExternalList,
    reporter: Reporter,
    stage: Stage,
}

impl FileContext {
    fn new(file_name: String) -> Self {
        FileContext {
            symbols: SymbolTable::new(),
            macros: MacroTable::new(),
            image: MemoryImage::new(),
            externals: ExternalList::new(),
            reporter: Reporter::new(file_name),
            stage: Stage::Start,
        }
    }
}

/// Result of the in-memory pipeline, before any artifact is written.
struct PipelineOutcome {
    ctx: FileContext,
    expanded: String,
}

/// Run preprocess → pass 1 → finalize → pass 2 over in-memory source.
fn run_pipeline(file_name: &str, source: &str) -> PipelineOutcome {
    let mut ctx = FileContext::new(file_name.to_string());

    ctx.stage = Stage::ParsingMacros;
    let span = tracing::debug_span!("preprocess", file = file_name);
    let expanded = span.in_scope(|| {
        preprocessor::expand(source, &mut ctx.macros, &mut ctx.reporter)
    });
    if !ctx.reporter.is_valid() {
        ctx.stage = Stage::Failed;
        return PipelineOutcome { ctx, expanded };
    }

    ctx.stage = Stage::FirstRun;
    let span = tracing::debug_span!("first_pass", file = file_name);
    let ok = span.in_scope(|| {
        first_pass::run(
            &expanded,
            &mut ctx.symbols,
            &ctx.macros,
            &mut ctx.image,
            &mut ctx.reporter,
        )
    });
    if !ok {
        ctx.stage = Stage::Failed;
        return PipelineOutcome { ctx, expanded };
    }

    ctx.image.finalize_counters();
    ctx.symbols
        .finalize(ctx.image.icf(), &mut ctx.externals);
    ctx.image.alloc();

    ctx.stage = Stage::SecondRun;
    let span = tracing::debug_span!("second_pass", file = file_name);
    let ok = span.in_scope(|| {
        second_pass::run(
            &expanded,
            &ctx.symbols,
            &mut ctx.externals,
            &mut ctx.image,
            &mut ctx.reporter,
        )
    });
    ctx.stage = if ok { Stage::CreateOutputs } else { Stage::Failed };
    if ok {
        tracing::trace!("memory image:\n{}", ctx.image.dump_binary());
    }

    PipelineOutcome { ctx, expanded }
}

fn dump_symbols(symbols: &SymbolTable) {
    for line in symbols.to_string().lines() {
        tracing::debug!("{line}");
    }
}

fn build_report(stem: &str, ctx: FileContext) -> FileReport {
    let succeeded = ctx.stage == Stage::CreateOutputs;
    FileReport {
        stem: stem.to_string(),
        succeeded,
        stage: ctx.stage,
        code_words: if succeeded { ctx.image.code_len() } else { 0 },
        data_words: if succeeded { ctx.image.data_len() } else { 0 },
        symbols: ctx.symbols.summaries(),
        diagnostics: ctx.reporter.into_diagnostics(),
    }
}

/// Assemble in-memory source without touching the filesystem. `name` only
/// labels the diagnostics.
pub fn assemble_source(name: &str, source: &str, options: &AssemblerOptions) -> FileReport {
    let outcome = run_pipeline(name, source);
    if options.dump_symbols {
        dump_symbols(&outcome.ctx.symbols);
    }
    build_report(name, outcome.ctx)
}

/// Assemble one source stem: read `<stem>.as`, write `<stem>.am`, and on
/// success write the `.ob`/`.ent`/`.ext` artifacts.
pub fn assemble_stem(stem: &str, options: &AssemblerOptions) -> Result<FileReport> {
    let source_path = format!("{stem}.as");
    let source = fs::read_to_string(&source_path).map_err(|source| {
        AssemblerError::CannotOpenSource {
            path: source_path.clone().into(),
            source,
        }
    })?;

    tracing::info!(file = %source_path, "assembling");
    let outcome = run_pipeline(&source_path, &source);
    let mut ctx = outcome.ctx;

    // The expanded intermediate is written even for failed files; it is
    // the record of what the later stages saw.
    output::write_expanded_file(stem, &outcome.expanded)?;

    if options.dump_symbols {
        dump_symbols(&ctx.symbols);
    }

    if ctx.stage == Stage::CreateOutputs {
        if let Err(e) = output::write_artifacts(stem, &ctx.image, &ctx.symbols, &ctx.externals)
        {
            ctx.reporter.error(ErrorKind::FileCreationFailed);
            ctx.stage = Stage::Failed;
            tracing::warn!(error = %e, "artifact creation failed");
        }
    }

    if options.write_log && !ctx.reporter.diagnostics().is_empty() {
        // Log creation failing must not mask the assembly outcome.
        if let Err(e) = output::write_log_file(stem, ctx.reporter.diagnostics()) {
            tracing::warn!(error = %e, "log creation failed");
        }
    }

    Ok(build_report(stem, ctx))
}

/// Assemble a list of stems in order. Per-file failures, including a
/// missing `.as`, become reports; only an empty stem list is an error.
pub fn assemble_stems(stems: &[String], options: &AssemblerOptions) -> Result<Vec<FileReport>> {
    if stems.is_empty() {
        return Err(AssemblerError::NoSourceFiles);
    }
    let mut reports = Vec::with_capacity(stems.len());
    for stem in stems {
        match assemble_stem(stem, options) {
            Ok(report) => reports.push(report),
            Err(AssemblerError::CannotOpenSource { path, .. }) => {
                tracing::warn!(path = %path.display(), "source file could not be opened");
                let mut reporter = Reporter::new(path.display().to_string());
                reporter.error(ErrorKind::CannotOpenSource);
                reports.push(FileReport {
                    stem: stem.clone(),
                    succeeded: false,
                    stage: Stage::Failed,
                    code_words: 0,
                    data_words: 0,
                    symbols: Vec::new(),
                    diagnostics: reporter.into_diagnostics(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(reports)
}
