//! Error types for the assembler.
//!
//! This module defines the infrastructure-level error type: failures to
//! open, create, or write files. Translation problems found in the source
//! text are *not* errors in this sense; they are collected as
//! [`crate::diagnostics::Diagnostic`] values so a single run can surface
//! every problem in a file.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for assembler infrastructure failures.
#[derive(Debug, Error)]
pub enum AssemblerError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The `.as` source file could not be opened.
    #[error("cannot open source file {path}: {source}")]
    CannotOpenSource {
        /// Path of the missing or unreadable source.
        path: PathBuf,
        /// Underlying IO failure.
        source: std::io::Error,
    },

    /// An output artifact could not be created.
    #[error("cannot create {path}: {source}")]
    FileCreation {
        /// Path of the artifact that failed to open for writing.
        path: PathBuf,
        /// Underlying IO failure.
        source: std::io::Error,
    },

    /// No source stems were passed on the command line.
    #[error("no source files provided")]
    NoSourceFiles,
}

/// Result type alias for assembler operations.
pub type Result<T> = std::result::Result<T, AssemblerError>;
