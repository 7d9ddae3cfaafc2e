use std::borrow::Cow;
use std::cell::RefCell;

use rustyline::Context;
use rustyline::Helper;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;

use loxide::{KEYWORDS, Scanner, TokenType, is_identifier_char};

/// Rustyline helper providing completion and syntax highlighting
pub struct LoxHelper {
    variables: RefCell<Vec<String>>,
}

impl LoxHelper {
    pub fn new() -> Self {
        Self {
            variables: RefCell::new(Vec::new()),
        }
    }

    pub fn set_variables(&self, variables: Vec<String>) {
        *self.variables.borrow_mut() = variables;
    }

    fn find_word_start(line: &str, pos: usize) -> usize {
        let before_cursor = &line[..pos];
        for (i, c) in before_cursor.char_indices().rev() {
            if !is_identifier_char(c) {
                return i + c.len_utf8();
            }
        }
        0
    }

    fn completions(prefix: &str, variables: &[String]) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for (keyword, _) in KEYWORDS {
            if keyword.starts_with(prefix) {
                candidates.push((*keyword).to_string());
            }
        }
        for variable in variables {
            if variable.starts_with(prefix) {
                candidates.push(variable.clone());
            }
        }
        candidates
    }

    /// Re-scan the line and wrap interesting tokens in ANSI colors.
    /// Skipped characters (whitespace, comments, scan errors) come through
    /// the span gaps unstyled.
    fn highlight_line(line: &str, variables: &[String]) -> String {
        const KEYWORD: &str = "\x1b[35m";
        const STRING: &str = "\x1b[32m";
        const NUMBER: &str = "\x1b[33m";
        const VARIABLE: &str = "\x1b[36m";
        const RESET: &str = "\x1b[0m";

        let mut result = String::new();
        let mut pos = 0usize;

        for token in Scanner::new(line).flatten() {
            if token.token_type == TokenType::Eof {
                break;
            }

            if token.span.start > pos {
                result.push_str(&line[pos..token.span.start]);
            }

            let color = match token.token_type {
                TokenType::String => Some(STRING),
                TokenType::Number => Some(NUMBER),
                TokenType::Identifier => {
                    if variables.contains(&token.lexeme) {
                        Some(VARIABLE)
                    } else {
                        None
                    }
                }
                other if KEYWORDS.iter().any(|(_, tt)| *tt == other) => Some(KEYWORD),
                _ => None,
            };

            if let Some(color) = color {
                result.push_str(color);
                result.push_str(&line[token.span.clone()]);
                result.push_str(RESET);
            } else {
                result.push_str(&line[token.span.clone()]);
            }
            pos = token.span.end;
        }

        if pos < line.len() {
            result.push_str(&line[pos..]);
        }

        result
    }
}

impl Helper for LoxHelper {}

impl Highlighter for LoxHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let variables = self.variables.borrow();
        Cow::Owned(Self::highlight_line(line, &variables))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: rustyline::highlight::CmdKind) -> bool {
        true
    }
}

impl Hinter for LoxHelper {
    type Hint = String;
}

impl Validator for LoxHelper {}

impl Completer for LoxHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = Self::find_word_start(line, pos);
        let prefix = &line[start..pos];
        let variables = self.variables.borrow();

        let pairs = Self::completions(prefix, &variables)
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();

        Ok((start, pairs))
    }
}
