//! Macro preprocessor.
//!
//! Streams the `.as` source line by line into the expanded `.am` text.
//! A definition opens with `macr NAME` and closes with `endmacr`; the
//! lines in between are captured verbatim and swallowed from the output.
//! A line whose first token names a captured macro is replaced by the
//! captured body. Everything else passes through unchanged, so a source
//! with no macros expands to itself.

use crate::diagnostics::{ErrorKind, Reporter};
use crate::lexer;
use crate::tables::MacroTable;

enum State {
    Outside,
    Inside { name: String, body: Vec<String> },
}

/// Expand all macros in `source`, filling `macros` with the captured
/// definitions. Returns the expanded text; a definition error aborts the
/// expansion early, leaving the reporter invalid.
pub fn expand(source: &str, macros: &mut MacroTable, reporter: &mut Reporter) -> String {
    let mut out = String::with_capacity(source.len());
    let mut state = State::Outside;

    for (index, line) in source.lines().enumerate() {
        reporter.set_line(index as u32 + 1);
        let mut tokens = line.split_whitespace();
        let first = tokens.next();

        state = match state {
            State::Inside { name, mut body } => match first {
                Some(t) if lexer::is_macro_close(t) => {
                    if let Err(kind) = macros.add_macro(&name, body) {
                        reporter.error(kind);
                        return out;
                    }
                    tracing::debug!(macro_name = %name, "macro captured");
                    State::Outside
                }
                _ => {
                    body.push(line.to_string());
                    State::Inside { name, body }
                }
            },
            State::Outside => match first {
                Some(t) if lexer::is_macro_open(t) => {
                    let Some(name) = tokens.next() else {
                        reporter.error(ErrorKind::MacroDeclWithoutName);
                        return out;
                    };
                    if lexer::check_name(name).is_err() {
                        reporter.error(ErrorKind::IllegalMacroName);
                        return out;
                    }
                    State::Inside {
                        name: name.to_string(),
                        body: Vec::new(),
                    }
                }
                Some(t) if lexer::is_macro_close(t) => {
                    reporter.error(ErrorKind::CloseWithoutOpen);
                    State::Outside
                }
                Some(t) => {
                    if let Some(m) = macros.lookup(t) {
                        for body_line in &m.body {
                            out.push_str(body_line);
                            out.push('\n');
                        }
                    } else {
                        out.push_str(line);
                        out.push('\n');
                    }
                    State::Outside
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                    State::Outside
                }
            },
        };
    }

    out
}
