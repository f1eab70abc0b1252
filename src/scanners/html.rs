//! HTML scanner.

use std::collections::HashMap;

use crate::engine::lines::LineIndex;
use crate::engine::scan::{code_text, report_unterminated, scan_lines, LexicalRules};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::models::Severity;
use once_cell::sync::Lazy;
use regex::Regex;

const RULES: LexicalRules = LexicalRules {
    block_comments: &[("<!--", "-->")],
    ..LexicalRules::EMPTY
};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose end tag may be omitted.
const OPTIONAL_CLOSE: &[&str] = &[
    "p", "li", "td", "tr", "th", "option", "dt", "dd", "thead", "tbody", "tfoot", "colgroup",
];

const RAW_TEXT: &[&str] = &["script", "style"];

const DEPRECATED: &[&str] = &[
    "acronym", "applet", "basefont", "big", "blink", "center", "dir", "font", "frame", "frameset",
    "isindex", "marquee", "strike", "tt",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9:-]*)([^<>]*?)(/?)>").expect("valid regex")
});
static ID_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(?:^|\s)id\s*=\s*["']([^"']+)["']"#).expect("valid regex"));
static DOCTYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<!doctype\b").expect("valid regex"));
static HTML_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html\b([^>]*)>").expect("valid regex"));
static HEAD_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<head\b").expect("valid regex"));
static TITLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<title\b").expect("valid regex"));

/// Whether the attribute text declares `name`.
pub(crate) fn has_attr(attrs: &str, name: &str) -> bool {
    attrs
        .split(|c: char| c.is_whitespace())
        .any(|part| {
            let key = part.split('=').next().unwrap_or("");
            key.eq_ignore_ascii_case(name)
        })
}

/// Tags an opening `name` closes implicitly.
fn implied_closes(name: &str) -> &'static [&'static str] {
    match name {
        "li" => &["li"],
        "dt" | "dd" => &["dt", "dd"],
        "td" | "th" => &["td", "th"],
        "tr" => &["tr", "td", "th"],
        "option" => &["option"],
        "thead" | "tbody" | "tfoot" => &["thead", "tbody", "tfoot", "tr", "td", "th"],
        n if BLOCK_ELEMENTS.contains(&n) => &["p"],
        _ => &[],
    }
}

fn check_opening_tag(name: &str, attrs: &str, line: usize, sink: &mut DiagnosticSink) {
    if name == "img" && !has_attr(attrs, "alt") {
        sink.warning("Accessibility", "<img> is missing an alt attribute", line);
    }
    if DEPRECATED.contains(&name) {
        sink.warning("Deprecated Tag", format!("<{}> is deprecated", name), line);
    }
    if has_attr(attrs, "style") {
        sink.info("Inline Style", "Move inline styles to a stylesheet", line);
    }
    if name == "a" && !has_attr(attrs, "href") {
        sink.info("Missing Href", "<a> without an href is not focusable", line);
    }
}

pub struct HtmlScanner;

impl LanguageScanner for HtmlScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Html
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);
        let mut stack: Vec<(String, usize)> = Vec::new();
        let mut raw_text: Option<String> = None;

        for caps in TAG.captures_iter(&code) {
            let Some(whole) = caps.get(0) else { continue };
            let line = index.line_of(whole.start());
            let closing = !caps[1].is_empty();
            let name = caps[2].to_ascii_lowercase();

            if let Some(raw) = &raw_text {
                if !(closing && *raw == name) {
                    continue;
                }
                raw_text = None;
            }

            if closing {
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                match stack.iter().rposition(|(open, _)| *open == name) {
                    Some(at) => {
                        for (open, open_line) in stack.drain(at..).skip(1) {
                            if !OPTIONAL_CLOSE.contains(&open.as_str()) {
                                sink.error(
                                    "Syntax Error",
                                    format!("Unclosed tag <{}>", open),
                                    open_line,
                                );
                            }
                        }
                    }
                    None => sink.error(
                        "Syntax Error",
                        format!("Unexpected closing tag </{}>", name),
                        line,
                    ),
                }
                continue;
            }

            check_opening_tag(&name, &caps[3], line, sink);
            let self_closing = !caps[4].is_empty();
            if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
                continue;
            }
            let implied = implied_closes(&name);
            while stack
                .last()
                .is_some_and(|(open, _)| implied.contains(&open.as_str()))
            {
                stack.pop();
            }
            if RAW_TEXT.contains(&name.as_str()) {
                raw_text = Some(name.clone());
            }
            stack.push((name, line));
        }

        for (open, line) in stack {
            if !OPTIONAL_CLOSE.contains(&open.as_str()) {
                sink.error("Syntax Error", format!("Unclosed tag <{}>", open), line);
            }
        }
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);

        let mut ids: HashMap<&str, usize> = HashMap::new();
        for caps in ID_ATTR.captures_iter(&code) {
            let Some(id) = caps.get(1) else { continue };
            let line = index.line_of(id.start());
            match ids.get(id.as_str()) {
                Some(first) => sink.warning(
                    "Duplicate ID",
                    format!("id '{}' is already used on line {}", id.as_str(), first),
                    line,
                ),
                None => {
                    ids.insert(id.as_str(), line);
                }
            }
        }

        if let Some(caps) = HTML_OPEN.captures(&code) {
            if !DOCTYPE.is_match(&code) {
                sink.report(
                    Severity::Warning,
                    "Missing Doctype",
                    "Document has no <!DOCTYPE html> declaration",
                    None,
                );
            }
            if !has_attr(&caps[1], "lang") {
                let line = caps.get(0).map_or(1, |m| index.line_of(m.start()));
                sink.info("Accessibility", "<html> is missing a lang attribute", line);
            }
        }
        if let Some(head) = HEAD_OPEN.find(&code) {
            if !TITLE_OPEN.is_match(&code) {
                sink.warning(
                    "Missing Title",
                    "<head> has no <title> element",
                    index.line_of(head.start()),
                );
            }
        }
    }
}
