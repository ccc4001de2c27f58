//! Output artifact writers.
//!
//! `.ob` holds the memory image: a header with the code and data word
//! counts, then one line per word: a four-digit decimal address and five
//! octal digits. `.ent` lists entry symbols, `.ext` lists external use
//! sites, and `.am` is the macro-expanded intermediate. All writers take
//! any `io::Write` so the formats are testable without touching disk.

use crate::diagnostics::Diagnostic;
use crate::error::{AssemblerError, Result};
use crate::image::{MemoryImage, MEMORY_START};
use crate::tables::{ExternalList, SymbolAttrs, SymbolTable};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Write the object image in `.ob` format.
pub fn write_object(image: &MemoryImage, w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "{} {}", image.code_len(), image.data_len())?;
    for (i, word) in image.words().iter().enumerate() {
        writeln!(w, "{:04} {}", MEMORY_START + i as u32, word)?;
    }
    Ok(())
}

/// Write the entry symbols in `.ent` format, in table-iteration order.
pub fn write_entries(symbols: &SymbolTable, w: &mut impl Write) -> io::Result<()> {
    for symbol in symbols.iter() {
        if symbol.attrs.contains(SymbolAttrs::ENTRY) {
            writeln!(w, "{} {:04}", symbol.name, symbol.address())?;
        }
    }
    Ok(())
}

/// Write the external use sites in `.ext` format: symbols in order of
/// first use, each site on its own line.
pub fn write_externals(externals: &ExternalList, w: &mut impl Write) -> io::Result<()> {
    for (name, sites) in externals.iter() {
        for site in sites {
            writeln!(w, "{} {:04}", name, site.base)?;
        }
    }
    Ok(())
}

/// Render the collected diagnostics, one per line.
pub fn write_log(diagnostics: &[Diagnostic], w: &mut impl Write) -> io::Result<()> {
    for d in diagnostics {
        writeln!(w, "{d}")?;
    }
    Ok(())
}

fn create(path: PathBuf) -> Result<BufWriter<File>> {
    let file = File::create(&path).map_err(|source| AssemblerError::FileCreation {
        path,
        source,
    })?;
    Ok(BufWriter::new(file))
}

/// Write the expanded source to `<stem>.am`.
pub fn write_expanded_file(stem: &str, expanded: &str) -> Result<()> {
    let mut w = create(PathBuf::from(format!("{stem}.am")))?;
    w.write_all(expanded.as_bytes())?;
    w.flush()?;
    Ok(())
}

/// Write the success artifacts: `<stem>.ob` always, `<stem>.ent` when at
/// least one entry exists, `<stem>.ext` when at least one external site
/// was recorded.
pub fn write_artifacts(
    stem: &str,
    image: &MemoryImage,
    symbols: &SymbolTable,
    externals: &ExternalList,
) -> Result<()> {
    let mut ob = create(PathBuf::from(format!("{stem}.ob")))?;
    write_object(image, &mut ob)?;
    ob.flush()?;

    if symbols.entries_count() > 0 {
        let mut ent = create(PathBuf::from(format!("{stem}.ent")))?;
        write_entries(symbols, &mut ent)?;
        ent.flush()?;
    }
    if externals.has_references() {
        let mut ext = create(PathBuf::from(format!("{stem}.ext")))?;
        write_externals(externals, &mut ext)?;
        ext.flush()?;
    }
    Ok(())
}

/// Write the per-file diagnostic log to `<stem>.log`.
pub fn write_log_file(stem: &str, diagnostics: &[Diagnostic]) -> Result<()> {
    let mut w = create(PathBuf::from(format!("{stem}.log")))?;
    write_log(diagnostics, &mut w)?;
    w.flush()?;
    Ok(())
}
