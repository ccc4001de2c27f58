//! Diagnostic taxonomy and collecting reporter.
//!
//! Every problem the assembler can find in a source file is one of the
//! fixed [`ErrorKind`] variants below. Diagnostics are collected, not
//! thrown: a line-parse routine keeps going past the first problem so the
//! user sees everything wrong with a line in one run. Errors flip the
//! per-file valid flag (which gates artifact creation); warnings do not.

use serde::Serialize;
use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Fails the file; no artifacts are written.
    Error,
    /// Reported but does not fail the file.
    Warning,
}

/// Closed taxonomy of translation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    // Structural
    /// Source line exceeds the fixed line-length cap.
    LineTooLong,
    /// A single stray character opens the line.
    IllegalCharAtLineStart,
    /// Trailing characters after a complete statement.
    IllegalCharsAtLineEnd,
    /// First token is not a label, directive, or operation.
    UndefinedToken,
    /// Mnemonic lookup failed.
    UndefinedOperation,
    /// Directive lookup failed.
    UndefinedInstruction,
    /// Directive keyword fused to its first argument.
    MissingSpaceAfterInstruction,
    /// Label declaration fused to the statement after it.
    MissingSpaceAfterLabel,

    // Symbol / label
    /// Label longer than 31 characters.
    IllegalLabelLength,
    /// Label violates the first-alphabetic, rest-alphanumeric rule.
    IllegalLabelCharacters,
    /// Label collides with a register name.
    LabelUsesReservedRegisterName,
    /// Label collides with an operation mnemonic.
    LabelUsesReservedOperationName,
    /// Label collides with a directive or macro keyword.
    LabelUsesReservedKeyword,
    /// Identifier already bound as a symbol or macro.
    NameAlreadyInUse,
    /// Attempt to attach a body or attributes to an external symbol.
    OverrideExternal,
    /// Attempt to mark a locally defined symbol external.
    OverrideLocalWithExternal,
    /// Label used as a statement with nothing after it.
    IllegalLabelUse,
    /// Operand names a symbol that was never defined.
    LabelNotDefined,
    /// Symbol lookup failed during finalization.
    SymbolDoesNotExist,
    /// `.entry` symbol referenced but never given a body.
    EntryDeclaredButNotDefined,

    // Directive
    /// `.data` with no arguments.
    EmptyDataDeclaration,
    /// `.string` with no argument.
    EmptyStringDeclaration,
    /// `.entry` with no symbol name.
    EmptyEntryDeclaration,
    /// `.extern` with no symbol name.
    EmptyExternalDeclaration,
    /// `.data` argument is not a number at all.
    ExpectedNumber,
    /// `.data` argument is numeric but not an integer.
    WrongArgumentTypeNotInteger,
    /// `.string` argument does not open with a double quote.
    ExpectedQuotes,
    /// `.string` argument opens but never closes its quote.
    ClosingQuoteMissing,

    // Operand
    /// Operation requires a source operand that was not given.
    RequiredSourceMissing,
    /// Operation requires a destination operand that was not given.
    RequiredDestMissing,
    /// More operands than the operation accepts.
    ExtraOperands,
    /// Source operand is not a register, immediate, indirect, or label.
    IllegalSrcOperandKind,
    /// Destination operand is not a register, immediate, indirect, or label.
    IllegalDstOperandKind,
    /// Source operand uses an addressing mode the operation forbids.
    SrcOperandKindNotAllowed,
    /// Destination operand uses an addressing mode the operation forbids.
    DstOperandKindNotAllowed,

    // Comma syntax
    /// Comma before the first parameter.
    CommaBeforeFirstParameter,
    /// Comma after the last parameter.
    CommaAfterLastParameter,
    /// Two or more consecutive commas.
    ExtraCommas,
    /// Two parameters with no comma between them.
    MissingCommas,

    // Macro
    /// `macr` with no name after it.
    MacroDeclWithoutName,
    /// Macro name is reserved or malformed.
    IllegalMacroName,
    /// A macro by that name already exists.
    MacroNameInUse,
    /// `endmacr` with no open definition.
    CloseWithoutOpen,

    // Infrastructure (reported through the same channel for uniformity)
    /// The `.as` source could not be opened.
    CannotOpenSource,
    /// An output artifact could not be created.
    FileCreationFailed,
    /// Allocation failure.
    OutOfMemory,
}

impl ErrorKind {
    /// Severity of this kind. Only the three empty-declaration kinds that
    /// still leave a well-formed program behind are warnings.
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::EmptyDataDeclaration
            | ErrorKind::EmptyEntryDeclaration
            | ErrorKind::EmptyExternalDeclaration => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Fixed human-readable message for this kind.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::LineTooLong => "line exceeds the maximum length of 81 characters",
            ErrorKind::IllegalCharAtLineStart => "illegal character at the start of the line",
            ErrorKind::IllegalCharsAtLineEnd => "illegal characters at the end of the line",
            ErrorKind::UndefinedToken => {
                "undefined token, expected a label, directive, or operation"
            }
            ErrorKind::UndefinedOperation => "undefined operation",
            ErrorKind::UndefinedInstruction => "undefined directive",
            ErrorKind::MissingSpaceAfterInstruction => {
                "missing space between directive and its arguments"
            }
            ErrorKind::MissingSpaceAfterLabel => {
                "missing space between label declaration and statement"
            }
            ErrorKind::IllegalLabelLength => "label exceeds the maximum length of 31 characters",
            ErrorKind::IllegalLabelCharacters => {
                "label must start with a letter and contain only letters and digits"
            }
            ErrorKind::LabelUsesReservedRegisterName => "label name collides with a register name",
            ErrorKind::LabelUsesReservedOperationName => {
                "label name collides with an operation mnemonic"
            }
            ErrorKind::LabelUsesReservedKeyword => {
                "label name collides with a directive or macro keyword"
            }
            ErrorKind::NameAlreadyInUse => "name is already in use",
            ErrorKind::OverrideExternal => "cannot redefine an external symbol locally",
            ErrorKind::OverrideLocalWithExternal => {
                "cannot mark a locally defined symbol as external"
            }
            ErrorKind::IllegalLabelUse => {
                "label must be followed by a directive or operation"
            }
            ErrorKind::LabelNotDefined => "operand refers to an undefined label",
            ErrorKind::SymbolDoesNotExist => "symbol does not exist",
            ErrorKind::EntryDeclaredButNotDefined => {
                "entry symbol was declared but never defined"
            }
            ErrorKind::EmptyDataDeclaration => ".data directive with no values",
            ErrorKind::EmptyStringDeclaration => ".string directive with no string",
            ErrorKind::EmptyEntryDeclaration => ".entry directive with no symbol name",
            ErrorKind::EmptyExternalDeclaration => ".extern directive with no symbol name",
            ErrorKind::ExpectedNumber => "expected a number",
            ErrorKind::WrongArgumentTypeNotInteger => "argument must be an integer",
            ErrorKind::ExpectedQuotes => "expected a double-quoted string",
            ErrorKind::ClosingQuoteMissing => "closing quote of the string is missing",
            ErrorKind::RequiredSourceMissing => "required source operand is missing",
            ErrorKind::RequiredDestMissing => "required destination operand is missing",
            ErrorKind::ExtraOperands => "too many operands for this operation",
            ErrorKind::IllegalSrcOperandKind => "illegal source operand",
            ErrorKind::IllegalDstOperandKind => "illegal destination operand",
            ErrorKind::SrcOperandKindNotAllowed => {
                "source addressing mode is not allowed for this operation"
            }
            ErrorKind::DstOperandKindNotAllowed => {
                "destination addressing mode is not allowed for this operation"
            }
            ErrorKind::CommaBeforeFirstParameter => "illegal comma before the first parameter",
            ErrorKind::CommaAfterLastParameter => "illegal comma after the last parameter",
            ErrorKind::ExtraCommas => "multiple consecutive commas",
            ErrorKind::MissingCommas => "missing comma between parameters",
            ErrorKind::MacroDeclWithoutName => "macro declared without a name",
            ErrorKind::IllegalMacroName => "illegal macro name, reserved keyword",
            ErrorKind::MacroNameInUse => "macro name is already in use",
            ErrorKind::CloseWithoutOpen => "endmacr without a matching macr",
            ErrorKind::CannotOpenSource => "source file could not be opened",
            ErrorKind::FileCreationFailed => "output file could not be created",
            ErrorKind::OutOfMemory => "out of memory",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A single collected diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Source file the diagnostic belongs to.
    pub file: String,
    /// 1-based line number, reset per file.
    pub line: u32,
    /// Taxonomy kind.
    pub kind: ErrorKind,
    /// Severity derived from the kind.
    pub severity: Severity,
    /// Fixed message text for the kind.
    pub message: &'static str,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}:{}: {}: {}",
            self.file, self.line, tag, self.message
        )
    }
}

/// Collecting diagnostic sink for one source file.
///
/// Stage code calls [`Reporter::error`] / [`Reporter::warning`] freely; the
/// reporter tracks the current line number and whether the file is still
/// valid. The driver renders the collected list to stderr and to the
/// per-file log after the run.
#[derive(Debug)]
pub struct Reporter {
    file: String,
    line: u32,
    valid: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Reporter {
    /// Create a reporter for the named source file, positioned at line 1.
    pub fn new(file: impl Into<String>) -> Self {
        Reporter {
            file: file.into(),
            line: 1,
            valid: true,
            diagnostics: Vec::new(),
        }
    }

    /// Set the current 1-based line number.
    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    /// Current 1-based line number.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Record an error-severity diagnostic and invalidate the file.
    pub fn error(&mut self, kind: ErrorKind) {
        tracing::debug!(line = self.line, %kind, "diagnostic");
        self.valid = false;
        self.push(kind);
    }

    /// Record a warning-severity diagnostic; the file stays valid.
    pub fn warning(&mut self, kind: ErrorKind) {
        tracing::debug!(line = self.line, %kind, "warning");
        self.push(kind);
    }

    /// Record `kind` at its natural severity.
    pub fn report(&mut self, kind: ErrorKind) {
        match kind.severity() {
            Severity::Error => self.error(kind),
            Severity::Warning => self.warning(kind),
        }
    }

    fn push(&mut self, kind: ErrorKind) {
        self.diagnostics.push(Diagnostic {
            file: self.file.clone(),
            line: self.line,
            kind,
            severity: kind.severity(),
            message: kind.message(),
        });
    }

    /// Whether no error-severity diagnostic has been recorded.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// All diagnostics recorded so far, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the reporter, yielding its diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// True if `kind` was reported at least once.
    pub fn has(&self, kind: ErrorKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }
}
