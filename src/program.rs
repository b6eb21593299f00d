//! Turns indented script text into a statement tree.
//!
//! A statement owns every following line indented deeper than itself. `if`, `else`,
//! `while` and `forever` take those lines as their body; after any other statement
//! deeper lines simply run in sequence. `begin`/`end` brackets a group by keyword and
//! ignores indentation. Blank lines never end a block.

use crate::error::{ExprError, ScriptError};
use crate::expr::{Expr, Value};
use crate::script::SourceProvider;

/// One non-blank script line with its indentation measured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub indent: usize,
    pub text: String,
}

/// Indentation width of `line` (tabs count `tab_width` columns) and the text after it.
pub fn measure_indent(line: &str, tab_width: usize) -> (usize, &str) {
    let text = line.trim_start_matches([' ', '\t']);
    let width = line[..line.len() - text.len()]
        .chars()
        .map(|ch| if ch == '\t' { tab_width } else { 1 })
        .sum();
    (width, text)
}

/// Matches a control keyword at the start of `text`, case-insensitively.
///
/// The keyword must be followed by a non-letter or the end of the line, so `ifValue`
/// is not an `if`. Returns the text after the keyword.
pub fn keyword<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let head = text.get(..word.len())?;
    if !head.eq_ignore_ascii_case(word) {
        return None;
    }
    let rest = &text[word.len()..];
    match rest.chars().next() {
        Some(ch) if ch.is_ascii_alphabetic() => None,
        _ => Some(rest),
    }
}

/// A keyword that must stand alone on its line.
fn bare_keyword(text: &str, word: &str) -> bool {
    keyword(text, word).is_some_and(|rest| rest.trim().is_empty())
}

type Condition = Result<Expr, ExprError>;

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    If {
        line: usize,
        condition: Condition,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        line: usize,
        condition: Condition,
        body: Vec<Stmt>,
    },
    Forever {
        line: usize,
        body: Vec<Stmt>,
    },
    /// `begin` ... `end`. `closed` is false when no `end` was found.
    Group {
        line: usize,
        body: Vec<Stmt>,
        closed: bool,
    },
    Break {
        line: usize,
    },
    Continue {
        line: usize,
    },
    /// An `end` with no open `begin`.
    StrayEnd {
        line: usize,
    },
    /// An `else` with no `if` at the same indent just before it. Its body is dropped.
    StrayElse {
        line: usize,
    },
    Set {
        line: usize,
        name: String,
        value: Expr,
    },
    Print {
        line: usize,
        value: Expr,
        newline: bool,
    },
    /// Anything else, handed to the command engine as is.
    Command {
        line: usize,
        text: String,
    },
    /// A statement that failed to parse; reported when reached.
    Invalid {
        line: usize,
        error: ScriptError,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Forever { line, .. }
            | Stmt::Group { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line }
            | Stmt::StrayEnd { line }
            | Stmt::StrayElse { line }
            | Stmt::Set { line, .. }
            | Stmt::Print { line, .. }
            | Stmt::Command { line, .. }
            | Stmt::Invalid { line, .. } => *line,
        }
    }
}

/// A parsed script.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Program {
    /// Reads `source` from the start and builds the statement tree.
    pub fn parse(source: &mut dyn SourceProvider, tab_width: usize) -> Self {
        source.restart();
        let mut lines = Vec::new();
        while let Some(raw) = source.next_line() {
            let (indent, text) = measure_indent(&raw, tab_width);
            if text.is_empty() {
                continue;
            }
            lines.push(SourceLine {
                number: source.line_number(),
                indent,
                text: text.to_string(),
            });
        }
        Self::from_lines(&lines)
    }

    pub fn from_lines(lines: &[SourceLine]) -> Self {
        Self {
            body: parse_block(lines),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Index of the first line at or after `start` that is not indented deeper than `indent`.
fn block_end(lines: &[SourceLine], start: usize, indent: usize) -> usize {
    lines[start..]
        .iter()
        .position(|line| line.indent <= indent)
        .map_or(lines.len(), |offset| start + offset)
}

/// Index of the `end` closing a `begin` whose body starts at `start`, if any.
fn matching_end(lines: &[SourceLine], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, line) in lines[start..].iter().enumerate() {
        if bare_keyword(&line.text, "begin") {
            depth += 1;
        } else if bare_keyword(&line.text, "end") {
            depth -= 1;
            if depth == 0 {
                return Some(start + offset);
            }
        }
    }
    None
}

fn parse_block(lines: &[SourceLine]) -> Vec<Stmt> {
    let mut stmts = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let current = &lines[i];
        let line = current.number;
        let text = current.text.as_str();
        i += 1;

        if let Some(rest) = keyword(text, "if") {
            let end = block_end(lines, i, current.indent);
            let then = parse_block(&lines[i..end]);
            i = end;

            let mut otherwise = None;
            if let Some(next) = lines.get(i)
                && next.indent == current.indent
                && bare_keyword(&next.text, "else")
            {
                let end = block_end(lines, i + 1, next.indent);
                otherwise = Some(parse_block(&lines[i + 1..end]));
                i = end;
            }

            stmts.push(Stmt::If {
                line,
                condition: Expr::parse(rest),
                then,
                otherwise,
            });
        } else if let Some(rest) = keyword(text, "while") {
            let end = block_end(lines, i, current.indent);
            stmts.push(Stmt::While {
                line,
                condition: Expr::parse(rest),
                body: parse_block(&lines[i..end]),
            });
            i = end;
        } else if bare_keyword(text, "forever") {
            let end = block_end(lines, i, current.indent);
            stmts.push(Stmt::Forever {
                line,
                body: parse_block(&lines[i..end]),
            });
            i = end;
        } else if bare_keyword(text, "else") {
            i = block_end(lines, i, current.indent);
            stmts.push(Stmt::StrayElse { line });
        } else if bare_keyword(text, "begin") {
            match matching_end(lines, i) {
                Some(end) => {
                    stmts.push(Stmt::Group {
                        line,
                        body: parse_block(&lines[i..end]),
                        closed: true,
                    });
                    i = end + 1;
                }
                None => {
                    stmts.push(Stmt::Group {
                        line,
                        body: parse_block(&lines[i..]),
                        closed: false,
                    });
                    i = lines.len();
                }
            }
        } else if bare_keyword(text, "end") {
            stmts.push(Stmt::StrayEnd { line });
        } else if bare_keyword(text, "break") {
            stmts.push(Stmt::Break { line });
        } else if bare_keyword(text, "continue") {
            stmts.push(Stmt::Continue { line });
        } else if let Some(rest) = keyword(text, "set") {
            stmts.push(parse_set(line, rest));
        } else if let Some(rest) = keyword(text, "println") {
            stmts.push(parse_print(line, rest, true));
        } else if let Some(rest) = keyword(text, "print") {
            stmts.push(parse_print(line, rest, false));
        } else {
            stmts.push(Stmt::Command {
                line,
                text: text.to_string(),
            });
        }
    }

    stmts
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn parse_set(line: usize, rest: &str) -> Stmt {
    let Some((name, value)) = rest.split_once('=') else {
        return Stmt::Invalid {
            line,
            error: ScriptError::BadSet,
        };
    };
    let name = name.trim();
    if !is_identifier(name) {
        return Stmt::Invalid {
            line,
            error: ScriptError::BadName(name.to_string()),
        };
    }
    match Expr::parse(value) {
        Ok(value) => Stmt::Set {
            line,
            name: name.to_string(),
            value,
        },
        Err(err) => Stmt::Invalid {
            line,
            error: err.into(),
        },
    }
}

fn parse_print(line: usize, rest: &str, newline: bool) -> Stmt {
    let value = if rest.trim().is_empty() {
        Ok(Expr::Literal(Value::Str(String::new())))
    } else {
        Expr::parse(rest)
    };
    match value {
        Ok(value) => Stmt::Print {
            line,
            value,
            newline,
        },
        Err(err) => Stmt::Invalid {
            line,
            error: err.into(),
        },
    }
}
