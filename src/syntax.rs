//! Shared operand-text machinery.
//!
//! The comma-syntax validator serves both the `.data` directive and
//! operation operands, in both passes. It reports every violation it finds
//! and keeps scanning, so one bad line surfaces all of its problems at
//! once.

use crate::diagnostics::{ErrorKind, Reporter};
use memchr::memchr;

/// A comma-syntax violation, positionless: the reporter supplies the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    BeforeFirst,
    AfterLast,
    Extra,
    Missing,
}

impl Violation {
    fn kind(self) -> ErrorKind {
        match self {
            Violation::BeforeFirst => ErrorKind::CommaBeforeFirstParameter,
            Violation::AfterLast => ErrorKind::CommaAfterLastParameter,
            Violation::Extra => ErrorKind::ExtraCommas,
            Violation::Missing => ErrorKind::MissingCommas,
        }
    }
}

/// Split `args` into parameter tokens and collect comma violations.
///
/// A token is a maximal run of characters that are neither whitespace nor
/// commas; the commas in each gap between tokens are counted against the
/// four rules.
fn scan(args: &str) -> (Vec<&str>, Vec<Violation>) {
    let mut tokens = Vec::new();
    let mut violations = Vec::new();

    let mut commas_in_gap = 0usize;
    let mut start = None;

    fn close<'s>(
        tokens: &mut Vec<&'s str>,
        start: &mut Option<usize>,
        end: usize,
        args: &'s str,
    ) {
        if let Some(s) = start.take() {
            tokens.push(&args[s..end]);
        }
    }

    for (i, c) in args.char_indices() {
        if c == ',' {
            close(&mut tokens, &mut start, i, args);
            commas_in_gap += 1;
        } else if c.is_whitespace() {
            close(&mut tokens, &mut start, i, args);
        } else {
            if start.is_none() {
                // A new token begins; judge the gap behind it.
                if !tokens.is_empty() {
                    match commas_in_gap {
                        0 => violations.push(Violation::Missing),
                        1 => {}
                        _ => violations.push(Violation::Extra),
                    }
                } else if commas_in_gap > 0 {
                    violations.push(Violation::BeforeFirst);
                    if commas_in_gap > 1 {
                        violations.push(Violation::Extra);
                    }
                }
                commas_in_gap = 0;
                start = Some(i);
            }
        }
    }
    close(&mut tokens, &mut start, args.len(), args);

    if commas_in_gap > 0 {
        if tokens.is_empty() {
            violations.push(Violation::BeforeFirst);
        } else {
            violations.push(Violation::AfterLast);
            if commas_in_gap > 1 {
                violations.push(Violation::Extra);
            }
        }
    }

    (tokens, violations)
}

/// Validate the comma syntax of `args`, reporting every violation.
/// Returns `true` when no violation was found.
pub fn verify_comma_syntax(args: &str, reporter: &mut Reporter) -> bool {
    let (_, violations) = scan(args);
    for v in &violations {
        reporter.error(v.kind());
    }
    violations.is_empty()
}

/// Split operation operands, reporting comma violations on the way.
pub fn split_operands<'a>(args: &'a str, reporter: &mut Reporter) -> (Vec<&'a str>, bool) {
    let (tokens, violations) = scan(args);
    for v in &violations {
        reporter.error(v.kind());
    }
    (tokens, violations.is_empty())
}

fn is_integer_token(t: &str) -> bool {
    let digits = t.strip_prefix(&['+', '-'][..]).unwrap_or(t);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn looks_numeric_but_fractional(t: &str) -> bool {
    let body = t.strip_prefix(&['+', '-'][..]).unwrap_or(t);
    memchr(b'.', body.as_bytes()).is_some()
        && body
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b'.')
        && body.bytes().any(|b| b.is_ascii_digit())
}

/// Validate a `.data` argument list and return how many words it will
/// occupy. Every problem is reported; the count is returned only when the
/// list was fully valid, so the data counter never grows on a bad line.
pub fn count_data_arguments(args: &str, reporter: &mut Reporter) -> Option<u32> {
    let (tokens, violations) = scan(args);
    for v in &violations {
        reporter.error(v.kind());
    }
    let mut valid = violations.is_empty();

    if tokens.is_empty() && valid {
        reporter.warning(ErrorKind::EmptyDataDeclaration);
        return Some(0);
    }

    for token in &tokens {
        if is_integer_token(token) {
            continue;
        }
        if looks_numeric_but_fractional(token) {
            reporter.error(ErrorKind::WrongArgumentTypeNotInteger);
        } else {
            reporter.error(ErrorKind::ExpectedNumber);
        }
        valid = false;
    }

    valid.then(|| tokens.len() as u32)
}

/// Parse the integer values of an already-validated `.data` argument list.
pub fn parse_data_values(args: &str) -> Vec<i32> {
    let (tokens, _) = scan(args);
    tokens
        .iter()
        .filter(|t| is_integer_token(t))
        .map(|t| t.parse::<i64>().unwrap_or(0) as i32)
        .collect()
}

/// Validate a `.string` argument and return the length of its content in
/// characters (the zero terminator is the caller's business).
pub fn check_string_argument(args: &str, reporter: &mut Reporter) -> Option<u32> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        reporter.error(ErrorKind::EmptyStringDeclaration);
        return None;
    }
    if !trimmed.starts_with('"') {
        reporter.error(ErrorKind::ExpectedQuotes);
        return None;
    }
    let rest = &trimmed[1..];
    let Some(close) = rest.rfind('"') else {
        reporter.error(ErrorKind::ClosingQuoteMissing);
        return None;
    };
    let content = &rest[..close];
    let tail = rest[close + 1..].trim();
    if !tail.is_empty() {
        reporter.error(ErrorKind::IllegalCharsAtLineEnd);
        return None;
    }
    Some(content.chars().count() as u32)
}

/// Extract the content of a `.string` argument without reporting. Used by
/// the second pass, which only runs on lines the first pass accepted.
pub fn extract_string(args: &str) -> Option<&str> {
    let trimmed = args.trim();
    let rest = trimmed.strip_prefix('"')?;
    let close = rest.rfind('"')?;
    Some(&rest[..close])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Reporter;

    fn kinds(r: &Reporter) -> Vec<ErrorKind> {
        r.diagnostics().iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_clean_list() {
        let mut r = Reporter::new("t");
        assert!(verify_comma_syntax("1, 2, 3", &mut r));
        assert!(r.diagnostics().is_empty());
    }

    #[test]
    fn test_comma_before_first() {
        let mut r = Reporter::new("t");
        assert!(!verify_comma_syntax(", 1, 2", &mut r));
        assert_eq!(kinds(&r), vec![ErrorKind::CommaBeforeFirstParameter]);
    }

    #[test]
    fn test_comma_after_last() {
        let mut r = Reporter::new("t");
        assert!(!verify_comma_syntax("1, 2,", &mut r));
        assert_eq!(kinds(&r), vec![ErrorKind::CommaAfterLastParameter]);
    }

    #[test]
    fn test_extra_commas() {
        let mut r = Reporter::new("t");
        assert!(!verify_comma_syntax("1,, 2", &mut r));
        assert_eq!(kinds(&r), vec![ErrorKind::ExtraCommas]);
    }

    #[test]
    fn test_missing_commas() {
        let mut r = Reporter::new("t");
        assert!(!verify_comma_syntax("1 2", &mut r));
        assert_eq!(kinds(&r), vec![ErrorKind::MissingCommas]);
    }

    #[test]
    fn test_all_violations_surface() {
        let mut r = Reporter::new("t");
        assert!(!verify_comma_syntax(",1,, 2 3,", &mut r));
        let k = kinds(&r);
        assert!(k.contains(&ErrorKind::CommaBeforeFirstParameter));
        assert!(k.contains(&ErrorKind::ExtraCommas));
        assert!(k.contains(&ErrorKind::MissingCommas));
        assert!(k.contains(&ErrorKind::CommaAfterLastParameter));
    }

    #[test]
    fn test_count_data_arguments() {
        let mut r = Reporter::new("t");
        assert_eq!(count_data_arguments("7, -1, 9", &mut r), Some(3));
        assert!(r.is_valid());
    }

    #[test]
    fn test_count_rejects_fractional() {
        let mut r = Reporter::new("t");
        assert_eq!(count_data_arguments("1.5", &mut r), None);
        assert_eq!(kinds(&r), vec![ErrorKind::WrongArgumentTypeNotInteger]);
    }

    #[test]
    fn test_count_rejects_junk() {
        let mut r = Reporter::new("t");
        assert_eq!(count_data_arguments("1, x, 3", &mut r), None);
        assert_eq!(kinds(&r), vec![ErrorKind::ExpectedNumber]);
    }

    #[test]
    fn test_count_keeps_scanning_past_errors() {
        // Scenario: `.data 1,, 2`: the extra comma is reported but the
        // size of the list is still computed.
        let mut r = Reporter::new("t");
        let (tokens, violations) = scan("1,, 2");
        assert_eq!(tokens, vec!["1", "2"]);
        assert_eq!(violations, vec![Violation::Extra]);
        assert_eq!(count_data_arguments("1,, 2", &mut r), None);
        assert!(!r.is_valid());
    }

    #[test]
    fn test_empty_data_is_a_warning() {
        let mut r = Reporter::new("t");
        assert_eq!(count_data_arguments("   ", &mut r), Some(0));
        assert!(r.is_valid());
        assert_eq!(kinds(&r), vec![ErrorKind::EmptyDataDeclaration]);
    }

    #[test]
    fn test_double_sign_rejected() {
        let mut r = Reporter::new("t");
        assert_eq!(count_data_arguments("--5", &mut r), None);
        assert_eq!(kinds(&r), vec![ErrorKind::ExpectedNumber]);
    }

    #[test]
    fn test_parse_data_values() {
        assert_eq!(parse_data_values("7, -1, 9"), vec![7, -1, 9]);
        assert_eq!(parse_data_values("+3"), vec![3]);
    }

    #[test]
    fn test_string_argument() {
        let mut r = Reporter::new("t");
        assert_eq!(check_string_argument("\"abcd\"", &mut r), Some(4));
        assert_eq!(check_string_argument("\"\"", &mut r), Some(0));
        assert_eq!(check_string_argument("\"ab cd\"", &mut r), Some(5));
        assert!(r.is_valid());
    }

    #[test]
    fn test_string_missing_quotes() {
        let mut r = Reporter::new("t");
        assert_eq!(check_string_argument("abc", &mut r), None);
        assert_eq!(kinds(&r), vec![ErrorKind::ExpectedQuotes]);
    }

    #[test]
    fn test_string_missing_closing_quote() {
        let mut r = Reporter::new("t");
        assert_eq!(check_string_argument("\"abc", &mut r), None);
        assert_eq!(kinds(&r), vec![ErrorKind::ClosingQuoteMissing]);
    }

    #[test]
    fn test_string_trailing_junk() {
        let mut r = Reporter::new("t");
        assert_eq!(check_string_argument("\"abc\" x", &mut r), None);
        assert_eq!(kinds(&r), vec![ErrorKind::IllegalCharsAtLineEnd]);
    }

    #[test]
    fn test_extract_string() {
        assert_eq!(extract_string("  \"hello\"  "), Some("hello"));
        assert_eq!(extract_string("\"\""), Some(""));
        assert_eq!(extract_string("nope"), None);
    }
}
