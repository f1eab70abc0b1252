//! Python scanner.
//!
//! Python statements are grouped into logical lines first: a physical line
//! continues the previous statement while brackets are open, after a
//! trailing backslash, or inside a triple-quoted string. Indentation is
//! only checked on the first physical line of each logical line.

use crate::engine::lines::LineIndex;
use crate::engine::scan::{
    code_text, report_open_string, report_unterminated, scan_lines, BracketTracker, CodeLine,
    LexicalRules, Region, StringDelim,
};
use crate::engine::symbols::{count_word, is_word_char, SymbolTable};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::models::Severity;
use once_cell::sync::Lazy;
use regex::Regex;

const RULES: LexicalRules = LexicalRules {
    line_comments: &["#"],
    strings: &[
        StringDelim::multi("\"\"\""),
        StringDelim::multi("'''"),
        StringDelim::single("\""),
        StringDelim::single("'"),
    ],
    escapes: true,
    ..LexicalRules::EMPTY
};

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(if|elif|else|for|while|def|class|try|except|finally|with|async\s+(?:def|for|with))\b")
        .expect("valid regex")
});
static BARE_EXCEPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^except\s*:").expect("valid regex"));
static NONE_COMPARISON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(==|!=)\s*None\b").expect("valid regex"));
static MUTABLE_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:async\s+)?def\s+\w+\s*\(.*=\s*(\[\s*\]|\{\s*\}|list\(\)|dict\(\)|set\(\))")
        .expect("valid regex")
});
static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]").expect("valid regex")
});
static IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*import\s+(.+)$").expect("valid regex"));
static FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*from\s+([\w.]+)\s+import\s+(.+)$").expect("valid regex")
});
static DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:async\s+)?def\s+([A-Za-z_]\w*)").expect("valid regex")
});
static TERMINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(return|raise|break|continue)\b").expect("valid regex"));
static CONTINUATION_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(elif|else|except|finally|case)\b").expect("valid regex"));

/// Inclusive `(first, last)` line indices of each logical line.
fn logical_lines(lines: &[CodeLine<'_>]) -> Vec<(usize, usize)> {
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut depth = 0usize;
    let mut joined = false;
    for (i, line) in lines.iter().enumerate() {
        let continuation = depth > 0 || joined || line.starts_in != Region::Code;
        if !line.trimmed().is_empty() {
            match groups.last_mut() {
                Some(group) if continuation => group.1 = i,
                _ => groups.push((i, i)),
            }
        }
        for c in line.code.chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        joined = line.code.trim_end().ends_with('\\');
    }
    groups
}

fn logical_text(lines: &[CodeLine<'_>], (first, last): (usize, usize)) -> String {
    lines[first..=last]
        .iter()
        .map(|l| l.trimmed().trim_end_matches('\\').trim_end())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `text` has a `:` outside brackets (walrus `:=` excluded).
fn has_block_colon(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 0usize;
    for (i, c) in chars.iter().enumerate() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 && chars.get(i + 1) != Some(&'=') => return true,
            _ => {}
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndentStyle {
    Tabs,
    Spaces,
    Mixed,
}

fn indent_style(indent: &str) -> Option<IndentStyle> {
    match (indent.contains('\t'), indent.contains(' ')) {
        (true, true) => Some(IndentStyle::Mixed),
        (true, false) => Some(IndentStyle::Tabs),
        (false, true) => Some(IndentStyle::Spaces),
        (false, false) => None,
    }
}

/// Indentation state machine: a stack of open block widths.
#[derive(Debug)]
struct Indentation {
    stack: Vec<usize>,
    unit: Option<usize>,
    style: Option<IndentStyle>,
    mixed_reported: bool,
    /// Header line whose block has not started yet.
    expecting: Option<usize>,
}

impl Indentation {
    fn new() -> Self {
        Self {
            stack: vec![0],
            unit: None,
            style: None,
            mixed_reported: false,
            expecting: None,
        }
    }

    /// Check the first line of a logical line. `opens_block` is whether the
    /// logical line ends with `:`.
    fn check(&mut self, line: &CodeLine<'_>, opens_block: bool, sink: &mut DiagnosticSink) {
        let n = line.number;
        let indent = line.indent();
        let style = indent_style(indent);
        let mixed = match (style, self.style) {
            (Some(IndentStyle::Mixed), _) => true,
            (Some(current), Some(established)) => current != established,
            _ => false,
        };
        if mixed {
            if !self.mixed_reported {
                sink.warning(
                    "Mixed Indentation",
                    "Mixed tabs and spaces in indentation",
                    n,
                );
                self.mixed_reported = true;
            }
            self.expecting = opens_block.then_some(n);
            return;
        }
        if self.style.is_none() {
            self.style = style;
        }

        let width = indent.chars().count();
        let top = self.stack.last().copied().unwrap_or(0);
        if width > top {
            match self.expecting {
                None => sink.error("Syntax Error", "Unexpected indent", n),
                Some(_) => {
                    let step = width - top;
                    match self.unit {
                        None => self.unit = Some(step),
                        Some(unit) if step != unit => sink.warning(
                            "Indentation",
                            format!("Indented by {} instead of {}", step, unit),
                            n,
                        ),
                        Some(_) => {}
                    }
                }
            }
            self.stack.push(width);
        } else {
            if let Some(header) = self.expecting {
                sink.error(
                    "Syntax Error",
                    format!("Expected an indented block after line {}", header),
                    n,
                );
            }
            if width < top {
                while self.stack.last().is_some_and(|w| *w > width) {
                    self.stack.pop();
                }
                if self.stack.last() != Some(&width) {
                    sink.error(
                        "Syntax Error",
                        "Unindent does not match any outer indentation level",
                        n,
                    );
                    self.stack.push(width);
                }
            }
        }
        self.expecting = opens_block.then_some(n);
    }

    fn finish(self, sink: &mut DiagnosticSink) {
        if let Some(header) = self.expecting {
            sink.error(
                "Syntax Error",
                format!("Expected an indented block after line {}", header),
                header,
            );
        }
    }
}

pub struct PythonScanner;

impl LanguageScanner for PythonScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Python
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let groups = logical_lines(&lines);
        let mut group_at = vec![None; lines.len()];
        for group in &groups {
            group_at[group.0] = Some(*group);
        }

        let mut tracker = BracketTracker::standard();
        let mut indentation = Indentation::new();

        for (idx, line) in lines.iter().enumerate() {
            let n = line.number;
            report_open_string(line, sink);
            tracker.feed(&line.code, n, sink);
            let Some(group) = group_at[idx] else { continue };

            let text = logical_text(&lines, group);
            let opens_block = text.ends_with(':');
            indentation.check(line, opens_block, sink);

            if let Some(caps) = HEADER.captures(&text) {
                if !has_block_colon(&text) {
                    sink.error(
                        "Missing Colon",
                        format!("Expected ':' after '{}' statement", &caps[1]),
                        n,
                    );
                }
            }
            if text.ends_with(';') {
                sink.info("Unnecessary Semicolon", "Trailing semicolon is not needed", n);
            }
            if BARE_EXCEPT.is_match(&text) {
                sink.warning(
                    "Bare Except",
                    "Catch a specific exception instead of a bare 'except:'",
                    n,
                );
            }
            if let Some(caps) = NONE_COMPARISON.captures(&text) {
                let fix = if &caps[1] == "==" { "is None" } else { "is not None" };
                sink.warning(
                    "Comparison to None",
                    format!("Use '{}' instead of '{} None'", fix, &caps[1]),
                    n,
                );
            }
            if MUTABLE_DEFAULT.is_match(&text) {
                sink.warning(
                    "Mutable Default Argument",
                    "Mutable default argument is shared between calls",
                    n,
                );
            }
            if let Some(caps) = ASSIGNMENT.captures(&text).filter(|_| !HEADER.is_match(&text)) {
                let name = &caps[1];
                if !name.starts_with('_') && count_word(source, name, is_word_char) == 1 {
                    sink.info(
                        "Unused Variable",
                        format!("Variable '{}' is assigned but never used", name),
                        n,
                    );
                }
            }
        }

        tracker.finish(sink);
        indentation.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);

        let mut imports = SymbolTable::new();
        for caps in IMPORT.captures_iter(&code) {
            let Some(clause) = caps.get(1) else { continue };
            let line = index.line_of(clause.start());
            for part in clause.as_str().split(',') {
                let words: Vec<&str> = part.split_whitespace().collect();
                let binding = match words.as_slice() {
                    [_, "as", alias] => *alias,
                    [module] => module.split('.').next().unwrap_or(module),
                    _ => continue,
                };
                imports.declare(binding, Some(line));
            }
        }
        for caps in FROM_IMPORT.captures_iter(&code) {
            if &caps[1] == "__future__" {
                continue;
            }
            let Some(clause) = caps.get(2) else { continue };
            let line = index.line_of(clause.start());
            let names = clause.as_str().replace(['(', ')', '\\'], " ");
            for part in names.split(',') {
                let words: Vec<&str> = part.split_whitespace().collect();
                let binding = match words.as_slice() {
                    [_, "as", alias] => *alias,
                    ["*"] | [] => continue,
                    [name] => *name,
                    _ => continue,
                };
                imports.declare(binding, Some(line));
            }
        }
        for (name, line) in imports.unused(source, is_word_char) {
            sink.report(
                Severity::Info,
                "Unused Import",
                format!("Import '{}' is never used", name),
                line,
            );
        }

        for caps in DEF.captures_iter(&code) {
            let Some(name) = caps.get(1) else { continue };
            let name_str = name.as_str();
            if name_str.starts_with("__") || name_str.starts_with("test_") {
                continue;
            }
            if count_word(source, name_str, is_word_char) == 1 {
                sink.info(
                    "Unused Function",
                    format!("Function '{}' is defined but never called", name_str),
                    index.line_of(name.start()),
                );
            }
        }

        unreachable_code(&lines, sink);
    }
}

/// Statements after `return`/`raise`/`break`/`continue` in the same block.
fn unreachable_code(lines: &[CodeLine<'_>], sink: &mut DiagnosticSink) {
    let mut terminated: Option<usize> = None;
    for (first, last) in logical_lines(lines) {
        let line = &lines[first];
        let width = line.indent().chars().count();
        let text = logical_text(lines, (first, last));
        if let Some(block) = terminated {
            if width == block && !CONTINUATION_CLAUSE.is_match(&text) {
                sink.warning(
                    "Unreachable Code",
                    "Unreachable code after a control-flow exit",
                    line.number,
                );
            }
            terminated = None;
        }
        if TERMINAL.is_match(&text) {
            terminated = Some(width);
        }
    }
}
