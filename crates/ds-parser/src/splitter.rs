use ds_core::{Category, DiagnosticSink, Severity};

use crate::cursor::QuoteState;

const INDENT_SIZE: usize = 4;

/// One logical statement after splitting. `text` is the trimmed content, empty
/// for a blank placeholder; `indent` is the normalized leading-space count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Statement {
    pub(crate) indent: usize,
    pub(crate) text: String,
    pub(crate) line: usize,
}

impl Statement {
    pub(crate) fn indent_level(&self) -> usize {
        self.indent / INDENT_SIZE
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Splits raw script text into statements. Statements end at line breaks
/// always, and at `;`/`；` outside a quoted string. An unterminated string at
/// end of line is a recoverable syntax error; the quote state resets and the
/// scan continues.
pub(crate) fn split_statements(content: &str, sink: &mut DiagnosticSink) -> Vec<Statement> {
    let chars: Vec<char> = content.chars().collect();
    let mut statements = Vec::new();
    let mut quotes = QuoteState::default();
    let mut start = 0usize;
    let mut line = 1usize;
    let mut statement_line = 1usize;

    let mut index = 0usize;
    while index < chars.len() {
        let c = chars[index];
        let previous = if index == 0 {
            None
        } else {
            Some(chars[index - 1])
        };
        quotes.observe(c, previous);

        let is_newline = c == '\n' || c == '\r';
        let is_separator = (c == ';' || c == '；') && !quotes.in_string();

        if is_newline || is_separator {
            push_statement(&chars[start..index], statement_line, &mut statements);

            if is_newline {
                if quotes.in_string() {
                    sink.add(
                        "String not closed before end of line",
                        line,
                        Severity::Error,
                        Category::Syntax,
                        "UNCLOSED_STRING",
                    );
                    quotes.reset();
                }
                if c == '\r' && chars.get(index + 1) == Some(&'\n') {
                    index += 1;
                }
                line += 1;
            }
            start = index + 1;
            statement_line = line;
        }

        index += 1;
    }

    if start < chars.len() {
        if quotes.in_string() {
            sink.add(
                "String not closed before end of line",
                line,
                Severity::Error,
                Category::Syntax,
                "UNCLOSED_STRING",
            );
        }
        push_statement(&chars[start..], statement_line, &mut statements);
    }

    statements
}

fn push_statement(raw: &[char], line: usize, statements: &mut Vec<Statement>) {
    let mut content_start = 0usize;
    let mut space_count = 0usize;
    while content_start < raw.len() && raw[content_start].is_whitespace() {
        if raw[content_start] == ' ' {
            space_count += 1;
        }
        content_start += 1;
    }

    // Blank statement: collapse runs, and never emit one first.
    if content_start >= raw.len() {
        if statements.is_empty() {
            return;
        }
        if statements.last().map(Statement::is_blank).unwrap_or(false) {
            return;
        }
        statements.push(Statement {
            indent: 0,
            text: String::new(),
            line,
        });
        return;
    }

    // Comment-only statement.
    if raw[content_start] == '/' && raw.get(content_start + 1) == Some(&'/') {
        return;
    }

    // Round any nonzero indent up to the next multiple of the indent size so
    // single-space differences never change structure.
    let indent = if space_count == 0 {
        0
    } else {
        ((space_count - 1) / INDENT_SIZE + 1) * INDENT_SIZE
    };

    let text: String = raw[content_start..].iter().collect::<String>();
    let text = text.trim().to_string();
    if text.is_empty() {
        return;
    }

    statements.push(Statement { indent, text, line });
}
