//! Lint engine: scanner trait, diagnostic sink and language dispatch.
//!
//! A lint pass is a pure function of `(source, language)`. The dispatcher
//! picks the scanner registered for the language, runs its syntax scanner
//! and then its semantic scanner against the same text, and returns the
//! diagnostics both pushed into one sink. Nothing is cached between passes.

pub mod lines;
pub mod scan;
pub mod symbols;

use crate::error::LintError;
use crate::language::LanguageId;
use crate::models::{Diagnostic, Severity};
use crate::scanners::{
    assembly, bash, cfamily, css, html, javascript, php, python, rust, sql, swift, typescript,
    xml,
};

/// Ordered, append-only collection of diagnostics for one lint pass.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    items: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Push a diagnostic with an optional line.
    pub fn report(
        &mut self,
        severity: Severity,
        kind: impl Into<String>,
        message: impl Into<String>,
        line: Option<usize>,
    ) {
        self.push(Diagnostic::new(severity, kind, message, line));
    }

    pub fn error(&mut self, kind: impl Into<String>, message: impl Into<String>, line: usize) {
        self.report(Severity::Error, kind, message, Some(line));
    }

    pub fn warning(&mut self, kind: impl Into<String>, message: impl Into<String>, line: usize) {
        self.report(Severity::Warning, kind, message, Some(line));
    }

    pub fn info(&mut self, kind: impl Into<String>, message: impl Into<String>, line: usize) {
        self.report(Severity::Info, kind, message, Some(line));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// Syntax and semantic checks for one language.
///
/// Implementations are stateless; all scan state lives on the stack of a
/// single call. Neither method may panic on malformed input.
pub trait LanguageScanner: Sync {
    fn language(&self) -> LanguageId;

    /// Line-oriented structural and style checks.
    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink);

    /// Whole-text checks (unused symbols, unreachable code, ...).
    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink);
}

/// Scanner registered for `language`.
pub fn scanner_for(language: LanguageId) -> &'static dyn LanguageScanner {
    match language {
        LanguageId::Assembly => &assembly::AssemblyScanner,
        LanguageId::Bash => &bash::BashScanner,
        LanguageId::CFamily => &cfamily::CFamilyScanner,
        LanguageId::Css => &css::CssScanner,
        LanguageId::Html => &html::HtmlScanner,
        LanguageId::JavaScript => &javascript::JavaScriptScanner,
        LanguageId::MonkeyC => &swift::MONKEY_C,
        LanguageId::Php => &php::PhpScanner,
        LanguageId::Python => &python::PythonScanner,
        LanguageId::Rust => &rust::RustScanner,
        LanguageId::Sql => &sql::SqlScanner,
        LanguageId::Swift => &swift::SWIFT,
        LanguageId::TypeScript => &typescript::TypeScriptScanner,
        LanguageId::Xml => &xml::XmlScanner,
    }
}

/// Lint `source` as `language`: syntax scanner first, then semantic.
pub fn lint(source: &str, language: LanguageId) -> Vec<Diagnostic> {
    let scanner = scanner_for(language);
    let mut sink = DiagnosticSink::new();
    scanner.syntax_check(source, &mut sink);
    let after_syntax = sink.len();
    scanner.semantic_check(source, &mut sink);
    tracing::trace!(
        language = %language,
        syntax = after_syntax,
        semantic = sink.len() - after_syntax,
        "lint pass finished"
    );
    sink.into_diagnostics()
}

/// Lint `source` for a language given by id.
///
/// Fails with [`LintError::UnsupportedLanguage`] when no scanner is
/// registered for `language_id`.
pub fn lint_as(source: &str, language_id: &str) -> Result<Vec<Diagnostic>, LintError> {
    let language: LanguageId = language_id.parse()?;
    Ok(lint(source, language))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_message<'a>(diags: &'a [Diagnostic], needle: &str) -> Vec<&'a Diagnostic> {
        diags.iter().filter(|d| d.message.contains(needle)).collect()
    }

    #[test]
    fn test_dispatcher_covers_every_language() {
        for lang in LanguageId::ALL {
            assert_eq!(scanner_for(lang).language(), lang);
        }
    }

    #[test]
    fn test_lint_is_deterministic() {
        let src = "var a = 1\nfunction f() {\n  return a == 2\n  console.log(a)\n";
        for lang in LanguageId::ALL {
            assert_eq!(lint(src, lang), lint(src, lang), "{}", lang);
        }
    }

    #[test]
    fn test_unmatched_opening_brace_reported_once() {
        let diags = lint("function f() {", LanguageId::JavaScript);
        let hits = with_message(&diags, "Unmatched opening '{'");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, Some(1));
        assert_eq!(hits[0].kind, "Syntax Error");
    }

    #[test]
    fn test_balanced_brackets_produce_no_syntax_errors() {
        let n = 12;
        let mut src = String::new();
        for i in 0..n {
            src.push_str(&format!("{}foo(a[{}], {{ k: {} }});\n", "  ".repeat(i % 3), i, i));
        }
        let diags = lint(&src, LanguageId::JavaScript);
        assert!(diags.iter().all(|d| d.kind != "Syntax Error"), "{:?}", diags);
    }

    #[test]
    fn test_missing_semicolon_single_statement() {
        let diags = lint("let x = 5", LanguageId::JavaScript);
        assert!(diags
            .iter()
            .any(|d| d.kind == "Missing Semicolon" && d.severity == Severity::Warning && d.line == Some(1)));
        let diags = lint("let x = 5;", LanguageId::JavaScript);
        assert!(diags.iter().all(|d| d.kind != "Missing Semicolon"));
    }

    #[test]
    fn test_unused_variable_textual_count() {
        let diags = lint("let unused = 1;\n", LanguageId::JavaScript);
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Variable" && d.severity == Severity::Info && d.line == Some(1)));
        let diags = lint("let used = 1;\nconsole.log(used);", LanguageId::JavaScript);
        assert!(with_message(&diags, "'used'").is_empty());
    }

    #[test]
    fn test_sql_unused_table_has_no_line() {
        let diags = lint("CREATE TABLE foo (id INT);", LanguageId::Sql);
        let table = diags.iter().find(|d| d.kind == "Unused Table").expect("unused table");
        assert_eq!(table.line, None);
        assert_eq!(table.severity, Severity::Info);
    }

    #[test]
    fn test_unsupported_language_is_an_error() {
        match lint_as("IDENTIFICATION DIVISION.", "cobol") {
            Err(LintError::UnsupportedLanguage { id }) => assert_eq!(id, "cobol"),
            other => panic!("expected UnsupportedLanguage, got {:?}", other),
        }
        assert!(lint_as("let x = 1;", "javascript").is_ok());
    }

    #[test]
    fn test_lines_never_exceed_line_count() {
        let samples = [
            "<div>\n<p>\n",
            "if x\n  y = (\n",
            "CREATE TABLE t (\n  a INT,\n",
            "section .text\n_start:\n  jmp nowhere\n",
            "fn main() {\n    let v = vec![1;\n",
            "",
        ];
        for src in samples {
            let total = lines::line_count(src);
            for lang in LanguageId::ALL {
                for d in lint(src, lang) {
                    if let Some(line) = d.line {
                        assert!(line >= 1 && line <= total, "{} {:?} in {:?}", lang, d, src);
                    }
                }
            }
        }
    }

    fn syntax_lines(src: &str, lang: LanguageId) -> Vec<usize> {
        let mut sink = DiagnosticSink::new();
        scanner_for(lang).syntax_check(src, &mut sink);
        sink.iter().filter_map(|d| d.line).collect()
    }

    #[test]
    fn test_line_findings_follow_source_order() {
        // (language, source, earlier finding line, later finding line);
        // none of these sources trigger an end-of-scan report.
        let cases = [
            (LanguageId::JavaScript, "let a = 1\nuse(a);\nlet s = \"oops\n", 1, 3),
            (LanguageId::TypeScript, "let a = 1\nuse(a);\nlet s = \"oops\n", 1, 3),
            (LanguageId::CFamily, "int a = 1\nuse(a);\nchar *s = \"oops\n", 1, 3),
            (LanguageId::Python, "x = 1;\nprint(x)\ns = \"oops\n", 1, 3),
            (LanguageId::Css, "a {\n  margin: 0px;\n  content: \"oops\n}\n", 2, 3),
            (LanguageId::Swift, "let a = 1;\nprint(a)\nlet s = \"oops\n", 1, 3),
            (LanguageId::MonkeyC, "var a = 1\nSystem.println(a);\nvar s = \"oops\n", 1, 3),
            (LanguageId::Assembly, "section .text\nmov eax\nmsg db \"oops\n", 2, 3),
            (LanguageId::Php, "<?php\n$a = 1\necho $a;\nvar_dump($a);\n", 2, 4),
            (LanguageId::Rust, "let a = 1\nprintln!(\"{}\", a);\nlet b = v.unwrap();\n", 1, 3),
            (LanguageId::Bash, "#!/bin/sh\nx=1\nif [ $x = 1 ]; then\n  echo `date`\nfi\n", 3, 4),
            (LanguageId::Sql, "SELECT * FROM users;\nDELETE FROM users;\n", 1, 2),
            (LanguageId::Html, "<!DOCTYPE html>\n<img src=\"a.png\">\n<center>hi</center>\n", 2, 3),
            (LanguageId::Xml, "<?xml version=\"1.0\"?>\n<r>\n  a & b\n  </x>\n</r>\n", 3, 4),
        ];
        let covered: Vec<LanguageId> = cases.iter().map(|c| c.0).collect();
        for lang in LanguageId::ALL {
            assert!(covered.contains(&lang), "no ordering case for {}", lang);
        }
        for (lang, src, early, late) in cases {
            let lines = syntax_lines(src, lang);
            assert!(lines.contains(&early) && lines.contains(&late), "{} {:?}", lang, lines);
            assert!(lines.windows(2).all(|w| w[0] <= w[1]), "{} out of order: {:?}", lang, lines);
        }
    }

    #[test]
    fn test_open_string_does_not_jump_ahead() {
        for lang in [LanguageId::JavaScript, LanguageId::TypeScript] {
            let diags = lint("let a = 1\nuse(a);\nlet s = \"oops\n", lang);
            let missing = diags.iter().position(|d| d.kind == "Missing Semicolon");
            let open = diags
                .iter()
                .position(|d| d.message == "Unterminated string literal");
            assert!(missing.is_some() && open.is_some(), "{:?}", diags);
            assert!(missing < open, "{} {:?}", lang, diags);
            assert_eq!(diags[0].line, Some(1));
        }
    }

    #[test]
    fn test_sink_preserves_push_order() {
        let mut sink = DiagnosticSink::new();
        sink.warning("A", "first", 3);
        sink.error("B", "second", 1);
        sink.report(Severity::Info, "C", "third", None);
        let kinds: Vec<_> = sink.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(kinds, vec!["A", "B", "C"]);
    }
}
