//! CSS scanner.

use std::collections::{HashMap, HashSet};

use crate::engine::lines::LineIndex;
use crate::engine::scan::{
    code_text, next_code_line, report_open_string, report_unterminated, scan_lines,
    BracketTracker, CodeLine, LexicalRules, StringDelim,
};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use once_cell::sync::Lazy;
use regex::Regex;

const RULES: LexicalRules = LexicalRules {
    block_comments: &[("/*", "*/")],
    strings: &[StringDelim::single("\""), StringDelim::single("'")],
    escapes: true,
    ..LexicalRules::EMPTY
};

static DECLARATION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-{0,2}[A-Za-z][\w-]*\s*:").expect("valid regex"));
static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([0-9A-Za-z]+)").expect("valid regex"));
static ZERO_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(,])0(?:px|em|rem|pt|vh|vw|ex|ch|cm|mm|in|pc|%)(?:$|[\s;,)!])")
        .expect("valid regex")
});
static VENDOR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-(webkit|moz|ms|o)-").expect("valid regex"));
static CUSTOM_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(--[\w-]+)\s*:").expect("valid regex"));
static VAR_USE: Lazy<Regex> = Lazy::new(|| Regex::new(r"var\(\s*(--[\w-]+)").expect("valid regex"));
static IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*@import\b").expect("valid regex"));

/// An open `{ ... }` rule.
#[derive(Debug)]
struct Block {
    selector: String,
    line: usize,
    properties: Vec<String>,
    has_content: bool,
}

#[derive(Debug, Default)]
struct RuleState {
    blocks: Vec<Block>,
    buffer: String,
    buffer_line: usize,
}

impl RuleState {
    fn feed(&mut self, code: &str, line: usize, sink: &mut DiagnosticSink) {
        for c in code.chars() {
            match c {
                '{' => {
                    let selector = self.buffer.trim().to_string();
                    let start = if selector.is_empty() { line } else { self.buffer_line };
                    if let Some(parent) = self.blocks.last_mut() {
                        parent.has_content = true;
                    }
                    self.blocks.push(Block {
                        selector,
                        line: start,
                        properties: Vec::new(),
                        has_content: false,
                    });
                    self.buffer.clear();
                }
                ';' => self.end_declaration(sink),
                '}' => {
                    self.end_declaration(sink);
                    if let Some(block) = self.blocks.pop() {
                        if !block.has_content {
                            sink.warning(
                                "Empty Rule",
                                format!("Rule '{}' has no declarations", block.selector),
                                block.line,
                            );
                        }
                    }
                }
                _ => {
                    if self.buffer.trim().is_empty() && !c.is_whitespace() {
                        self.buffer.clear();
                        self.buffer_line = line;
                    }
                    self.buffer.push(c);
                }
            }
        }
        self.buffer.push(' ');
    }

    /// A declaration is pending on the current line.
    fn pending_declaration(&self) -> bool {
        !self.blocks.is_empty() && DECLARATION_START.is_match(self.buffer.trim())
    }

    fn end_declaration(&mut self, sink: &mut DiagnosticSink) {
        let text = std::mem::take(&mut self.buffer);
        let decl = text.trim();
        if decl.is_empty() {
            return;
        }
        let line = self.buffer_line;
        let Some(block) = self.blocks.last_mut() else {
            return;
        };
        block.has_content = true;
        let Some((property, value)) = decl.split_once(':') else {
            return;
        };
        let property = property.trim().to_ascii_lowercase();
        check_declaration(&property, value, line, sink);
        if block.properties.contains(&property) {
            sink.warning(
                "Duplicate Property",
                format!("Property '{}' is declared more than once in this rule", property),
                line,
            );
        } else {
            block.properties.push(property);
        }
    }
}

fn check_declaration(property: &str, value: &str, line: usize, sink: &mut DiagnosticSink) {
    if value.trim().is_empty() {
        sink.error("Empty Value", format!("Property '{}' has no value", property), line);
        return;
    }
    for caps in HEX_COLOR.captures_iter(value) {
        let digits = &caps[1];
        let valid = matches!(digits.len(), 3 | 4 | 6 | 8)
            && digits.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            sink.error("Invalid Color", format!("Invalid hex color '#{}'", digits), line);
        }
    }
    if value.contains("!important") {
        sink.warning("Important", "Avoid '!important'; raise selector specificity instead", line);
    }
    if ZERO_UNIT.is_match(value) {
        sink.info("Zero Unit", "Zero values do not need a unit", line);
    }
    if let Some(caps) = VENDOR_PREFIX.captures(property) {
        sink.info(
            "Vendor Prefix",
            format!("Vendor-prefixed property '{}' (-{}-)", property, &caps[1]),
            line,
        );
    }
}

/// Whether the declaration on `idx` runs into a new declaration on the
/// next line.
fn runs_into_next(lines: &[CodeLine<'_>], idx: usize) -> bool {
    let Some(next) = next_code_line(lines, idx) else {
        return false;
    };
    let next = lines[next].trimmed();
    DECLARATION_START.is_match(next) && !next.contains('{')
}

pub struct CssScanner;

impl LanguageScanner for CssScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Css
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let mut tracker = BracketTracker::standard();
        let mut rules = RuleState::default();

        for (idx, line) in lines.iter().enumerate() {
            report_open_string(line, sink);
            tracker.feed(&line.code, line.number, sink);
            rules.feed(&line.code, line.number, sink);
            if rules.pending_declaration() && runs_into_next(&lines, idx) {
                sink.warning(
                    "Missing Semicolon",
                    "Missing semicolon after declaration",
                    line.number,
                );
                rules.end_declaration(sink);
            }
        }

        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);

        duplicate_selectors(&code, &index, sink);

        let mut defined: Vec<(&str, usize)> = Vec::new();
        for caps in CUSTOM_PROPERTY.captures_iter(&code) {
            let Some(name) = caps.get(1) else { continue };
            if !defined.iter().any(|(n, _)| *n == name.as_str()) {
                defined.push((name.as_str(), index.line_of(name.start())));
            }
        }
        let mut used: Vec<(&str, usize)> = Vec::new();
        for caps in VAR_USE.captures_iter(&code) {
            let Some(name) = caps.get(1) else { continue };
            if !used.iter().any(|(n, _)| *n == name.as_str()) {
                used.push((name.as_str(), index.line_of(name.start())));
            }
        }
        let used_names: HashSet<&str> = used.iter().map(|(n, _)| *n).collect();
        for (name, line) in &defined {
            if !used_names.contains(name) {
                sink.info(
                    "Unused Variable",
                    format!("Custom property '{}' is never used", name),
                    *line,
                );
            }
        }
        for (name, line) in &used {
            if !defined.iter().any(|(d, _)| d == name) {
                sink.warning(
                    "Undefined Variable",
                    format!("Custom property '{}' is not defined", name),
                    *line,
                );
            }
        }

        for m in IMPORT.find_iter(&code) {
            let at = m.start() + (m.as_str().len() - m.as_str().trim_start().len());
            sink.info(
                "Performance",
                "@import blocks parallel stylesheet downloads",
                index.line_of(at),
            );
        }
    }
}

/// Top-level selectors that appear more than once.
fn duplicate_selectors(code: &str, index: &LineIndex, sink: &mut DiagnosticSink) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in code.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    let raw = &code[start..i];
                    let selector = raw.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !selector.is_empty() && !selector.starts_with('@') {
                        let offset = start + (raw.len() - raw.trim_start().len());
                        let line = index.line_of(offset);
                        match seen.get(&selector) {
                            Some(first) => sink.warning(
                                "Duplicate Selector",
                                format!("Selector '{}' is also defined on line {}", selector, first),
                                line,
                            ),
                            None => {
                                seen.insert(selector, line);
                            }
                        }
                    }
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    start = i + 1;
                }
            }
            ';' if depth == 0 => start = i + 1,
            _ => {}
        }
    }
}
