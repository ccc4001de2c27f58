//! Lexical token classifiers.
//!
//! Every function here is total and side-effect free: given any token (a
//! whitespace-free slice), it answers a yes/no question or extracts a value
//! without touching shared state. The classifiers are deliberately strict
//! about shape (`r8` is not a register, `#1x` is not an immediate) because
//! the passes rely on them to tell operand kinds apart.

use crate::ops;
use memchr::memchr;

/// Maximum label length in characters.
pub const MAX_LABEL_LEN: usize = 31;

/// Maximum source line length in characters.
pub const MAX_LINE_LEN: usize = 81;

/// Macro definition opener keyword.
pub const MACRO_OPEN: &str = "macr";

/// Macro definition closer keyword.
pub const MACRO_CLOSE: &str = "endmacr";

/// The eight register names.
pub const REGISTERS: [&str; 8] = ["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7"];

/// True if `t` is exactly one of `r0`..`r7`.
pub fn is_register(t: &str) -> bool {
    register_number(t).is_some()
}

/// Register number for `r0`..`r7`, if `t` is exactly such a name.
pub fn register_number(t: &str) -> Option<u8> {
    let b = t.as_bytes();
    match b {
        [b'r', d @ b'0'..=b'7'] => Some(d - b'0'),
        _ => None,
    }
}

/// True if `t` is `#`, an optional sign, then one or more digits.
pub fn is_immediate(t: &str) -> bool {
    immediate_value(t).is_some()
}

/// Parsed value of an immediate operand, if `t` has immediate shape.
pub fn immediate_value(t: &str) -> Option<i32> {
    let rest = t.strip_prefix('#')?;
    let digits = rest.strip_prefix(&['+', '-'][..]).unwrap_or(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// True if `t` is exactly `*rX` for a register `rX`.
pub fn is_indirect(t: &str) -> bool {
    indirect_register(t).is_some()
}

/// Register number of an indirect operand `*rX`.
pub fn indirect_register(t: &str) -> Option<u8> {
    register_number(t.strip_prefix('*')?)
}

/// Register number of either a register or an indirect operand.
pub fn operand_register(t: &str) -> Option<u8> {
    register_number(t).or_else(|| indirect_register(t))
}

/// True if `t` ends with `:` (strict label declaration).
pub fn is_label_decl_strict(t: &str) -> bool {
    t.ends_with(':')
}

/// True if `t` contains `:` anywhere (used to diagnose a label fused to
/// the statement after it).
pub fn is_label_decl_loose(t: &str) -> bool {
    memchr(b':', t.as_bytes()).is_some()
}

/// True if the line is a comment: first non-whitespace character is `;`.
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with(';')
}

/// True if `t` is the macro opener keyword.
pub fn is_macro_open(t: &str) -> bool {
    t == MACRO_OPEN
}

/// True if `t` is the macro closer keyword.
pub fn is_macro_close(t: &str) -> bool {
    t == MACRO_CLOSE
}

/// The four assembler directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `.data`: comma-separated signed integers.
    Data,
    /// `.string`: one double-quoted string.
    String,
    /// `.entry`: export a locally defined symbol.
    Entry,
    /// `.extern`: import a symbol defined elsewhere.
    Extern,
}

impl Directive {
    /// Keyword as written in source.
    pub fn name(self) -> &'static str {
        match self {
            Directive::Data => ".data",
            Directive::String => ".string",
            Directive::Entry => ".entry",
            Directive::Extern => ".extern",
        }
    }

    /// All directives, for iteration.
    pub const ALL: [Directive; 4] = [
        Directive::Data,
        Directive::String,
        Directive::Entry,
        Directive::Extern,
    ];
}

/// Exact directive match.
pub fn directive(t: &str) -> Option<Directive> {
    Directive::ALL.into_iter().find(|d| d.name() == t)
}

/// True if `t` exactly matches a directive keyword.
pub fn is_directive_strict(t: &str) -> bool {
    directive(t).is_some()
}

/// Loose directive match: a directive keyword occurs inside `t`, as in
/// `.data5` where the space before the argument was dropped.
pub fn directive_loose(t: &str) -> Option<Directive> {
    Directive::ALL.into_iter().find(|d| t.contains(d.name()))
}

/// True if a directive keyword occurs inside `t`.
pub fn is_directive_loose(t: &str) -> bool {
    directive_loose(t).is_some()
}

/// Why an identifier cannot be used as a label or macro name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameIssue {
    /// Longer than [`MAX_LABEL_LEN`].
    TooLong,
    /// Empty, starts with a non-letter, or contains a non-alphanumeric.
    BadChars,
    /// Collides with `r0`..`r7`.
    ReservedRegister,
    /// Collides with an operation mnemonic.
    ReservedOperation,
    /// Collides with a directive or macro keyword.
    ReservedKeyword,
}

/// Validate an identifier against the naming rules: 1..=31 characters,
/// first alphabetic, remainder alphanumeric, and not a reserved name.
pub fn check_name(t: &str) -> Result<(), NameIssue> {
    if t.len() > MAX_LABEL_LEN {
        return Err(NameIssue::TooLong);
    }
    let mut chars = t.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(NameIssue::BadChars),
    }
    if !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(NameIssue::BadChars);
    }
    if is_register(t) {
        return Err(NameIssue::ReservedRegister);
    }
    if ops::is_operation(t) {
        return Err(NameIssue::ReservedOperation);
    }
    if is_directive_strict(t) || is_macro_open(t) || is_macro_close(t) {
        return Err(NameIssue::ReservedKeyword);
    }
    Ok(())
}

/// True if `t` is usable as a symbol reference in operand position.
pub fn is_label_ref(t: &str) -> bool {
    check_name(t).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers() {
        for (i, name) in REGISTERS.iter().enumerate() {
            assert_eq!(register_number(name), Some(i as u8));
        }
        assert!(!is_register("r8"));
        assert!(!is_register("r77"));
        assert!(!is_register("R0"));
        assert!(!is_register("r"));
    }

    #[test]
    fn test_immediates() {
        assert_eq!(immediate_value("#5"), Some(5));
        assert_eq!(immediate_value("#-1"), Some(-1));
        assert_eq!(immediate_value("#+12"), Some(12));
        assert!(!is_immediate("#"));
        assert!(!is_immediate("#-"));
        assert!(!is_immediate("#1.5"));
        assert!(!is_immediate("#1x"));
        assert!(!is_immediate("5"));
    }

    #[test]
    fn test_indirect() {
        assert_eq!(indirect_register("*r3"), Some(3));
        assert!(!is_indirect("*r8"));
        assert!(!is_indirect("*x"));
        assert!(!is_indirect("r3"));
        assert_eq!(operand_register("r5"), Some(5));
        assert_eq!(operand_register("*r5"), Some(5));
        assert_eq!(operand_register("K"), None);
    }

    #[test]
    fn test_label_decls() {
        assert!(is_label_decl_strict("MAIN:"));
        assert!(!is_label_decl_strict("MAIN"));
        assert!(is_label_decl_loose("MAIN:mov"));
        assert!(!is_label_decl_loose("MAIN"));
    }

    #[test]
    fn test_comments() {
        assert!(is_comment("; hi"));
        assert!(is_comment("   ;indented"));
        assert!(!is_comment("mov r1, r2 ; trailing"));
    }

    #[test]
    fn test_directives() {
        assert_eq!(directive(".data"), Some(Directive::Data));
        assert_eq!(directive(".string"), Some(Directive::String));
        assert!(directive(".word").is_none());
        assert_eq!(directive_loose(".data5"), Some(Directive::Data));
        assert!(is_directive_loose("x.entryy"));
        assert!(!is_directive_loose(".dat"));
    }

    #[test]
    fn test_macro_keywords() {
        assert!(is_macro_open("macr"));
        assert!(!is_macro_open("macro"));
        assert!(is_macro_close("endmacr"));
        assert!(!is_macro_close("endm"));
    }

    #[test]
    fn test_name_validation() {
        assert!(check_name("LOOP").is_ok());
        assert!(check_name("a1b2").is_ok());
        let long = "a".repeat(31);
        assert!(check_name(&long).is_ok());
        let too_long = "a".repeat(32);
        assert_eq!(check_name(&too_long), Err(NameIssue::TooLong));
        assert_eq!(check_name("1abc"), Err(NameIssue::BadChars));
        assert_eq!(check_name("ab_c"), Err(NameIssue::BadChars));
        assert_eq!(check_name(""), Err(NameIssue::BadChars));
        assert_eq!(check_name("r3"), Err(NameIssue::ReservedRegister));
        assert_eq!(check_name("mov"), Err(NameIssue::ReservedOperation));
        assert_eq!(check_name("macr"), Err(NameIssue::ReservedKeyword));
        assert_eq!(check_name("endmacr"), Err(NameIssue::ReservedKeyword));
    }
}
