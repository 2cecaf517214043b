use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Syntax,
    Reference,
    Validation,
    Parse,
    Runtime,
    ResourceLoad,
    Format,
    Structure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    pub line: usize,
    pub message: String,
    pub code: String,
    pub context: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} {}\n{}",
            self.line, self.message, self.code, self.context
        )
    }
}

/// Accumulates diagnostics per source name. Parsing never throws past a
/// statement boundary; everything a pass finds lands here.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    source_name: String,
    source_lines: Vec<String>,
    diagnostics: BTreeMap<String, Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points subsequent `add` calls at a source and keeps its lines around
    /// for context snippets.
    pub fn begin_source(&mut self, source_name: &str, content: &str) {
        self.source_name = source_name.to_string();
        self.source_lines = content.lines().map(str::to_string).collect();
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn add(
        &mut self,
        message: impl Into<String>,
        line: usize,
        severity: Severity,
        category: Category,
        code: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            severity,
            category,
            line,
            message: message.into(),
            code: code.into(),
            context: render_context(line, &self.source_lines),
        };

        match severity {
            Severity::Warning => log::warn!("[{}] {}", self.source_name, diagnostic),
            Severity::Error | Severity::Fatal => {
                log::error!("[{}] {}", self.source_name, diagnostic)
            }
        }

        self.diagnostics
            .entry(self.source_name.clone())
            .or_default()
            .push(diagnostic);
    }

    pub fn all(&self) -> &BTreeMap<String, Vec<Diagnostic>> {
        &self.diagnostics
    }

    pub fn for_source(&self, source_name: &str) -> &[Diagnostic] {
        self.diagnostics
            .get(source_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_fatal(&self, source_name: &str) -> bool {
        self.for_source(source_name)
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Fatal)
    }
}

fn render_context(line: usize, lines: &[String]) -> String {
    const CONTEXT_LINES: usize = 2;

    if line == 0 || line > lines.len() {
        return String::new();
    }
    let index = line - 1;

    let start = index.saturating_sub(CONTEXT_LINES);
    let end = (index + CONTEXT_LINES).min(lines.len() - 1);

    let mut out = String::new();
    for i in start..=end {
        let prefix = format!("{:4} | ", i + 1);
        if i == index {
            out.push_str(&format!(">>> {}{}\n", prefix, lines[i]));
            out.push_str(&format!("     {}\n", "^".repeat(lines[i].len().max(1))));
        } else {
            out.push_str(&format!("    {}{}\n", prefix, lines[i]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_groups_diagnostics_by_source() {
        let mut sink = DiagnosticSink::new();
        sink.begin_source("a.ds", "one\ntwo\nthree");
        sink.add("bad", 2, Severity::Error, Category::Syntax, "BAD_LINE");
        sink.begin_source("b.ds", "only");
        sink.add("worse", 1, Severity::Fatal, Category::Parse, "FATAL_ERROR");

        assert_eq!(sink.for_source("a.ds").len(), 1);
        assert_eq!(sink.for_source("a.ds")[0].code, "BAD_LINE");
        assert!(!sink.has_fatal("a.ds"));
        assert!(sink.has_fatal("b.ds"));
        assert!(sink.for_source("missing.ds").is_empty());
    }

    #[test]
    fn context_snippet_marks_the_offending_line() {
        let mut sink = DiagnosticSink::new();
        sink.begin_source("a.ds", "one\ntwo\nthree\nfour");
        sink.add("bad", 3, Severity::Warning, Category::Syntax, "X");
        let context = &sink.for_source("a.ds")[0].context;
        assert!(context.contains(">>>    3 | three"));
        assert!(context.contains("^^^^^"));
        assert!(context.contains("   2 | two"));
    }

    #[test]
    fn out_of_range_line_renders_no_context() {
        let mut sink = DiagnosticSink::new();
        sink.begin_source("a.ds", "one");
        sink.add("bad", 9, Severity::Error, Category::Syntax, "X");
        assert!(sink.for_source("a.ds")[0].context.is_empty());
    }
}
