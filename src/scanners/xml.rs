//! XML scanner. Comments and CDATA sections are stripped before tags are
//! matched; processing instructions and DOCTYPE never match the tag pattern.

use crate::engine::lines::LineIndex;
use crate::engine::scan::{code_text, report_unterminated, scan_lines, LexicalRules};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::models::Severity;
use once_cell::sync::Lazy;
use regex::Regex;

const RULES: LexicalRules = LexicalRules {
    block_comments: &[("<!--", "-->"), ("<![CDATA[", "]]>")],
    ..LexicalRules::EMPTY
};

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([A-Za-z_][\w:.-]*)([^<>]*?)(/?)>").expect("valid regex")
});
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\w:.-]+)\s*=\s*("[^"]*"|'[^']*'|[^\s"'>/]+)"#).expect("valid regex")
});
static ENTITY_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:#[0-9]+|#x[0-9A-Fa-f]+|[A-Za-z_][\w.-]*);").expect("valid regex")
});

fn check_attributes(attrs: &str, line: usize, sink: &mut DiagnosticSink) {
    let mut seen: Vec<&str> = Vec::new();
    for caps in ATTRIBUTE.captures_iter(attrs) {
        let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let name = name.as_str();
        if !value.as_str().starts_with(['"', '\'']) {
            sink.error(
                "Unquoted Attribute",
                format!("Value of attribute '{}' must be quoted", name),
                line,
            );
        }
        if seen.contains(&name) {
            sink.error(
                "Duplicate Attribute",
                format!("Attribute '{}' is specified more than once", name),
                line,
            );
        } else {
            seen.push(name);
        }
    }
}

/// Report an `&` that does not start an entity or character reference.
/// Bare `&` finder that walks the text in order alongside the tag scan.
/// One report per line.
struct EntityCheck<'a> {
    code: &'a str,
    index: &'a LineIndex,
    cursor: usize,
    last_line: usize,
}

impl<'a> EntityCheck<'a> {
    fn new(code: &'a str, index: &'a LineIndex) -> Self {
        Self {
            code,
            index,
            cursor: 0,
            last_line: 0,
        }
    }

    /// Check everything between the previous call and `end`.
    fn advance_to(&mut self, end: usize, sink: &mut DiagnosticSink) {
        let start = self.cursor;
        if end <= start {
            return;
        }
        for (i, _) in self.code[start..end].match_indices('&') {
            let at = start + i;
            if ENTITY_TAIL.is_match(&self.code[at + 1..]) {
                continue;
            }
            let line = self.index.line_of(at);
            if line != self.last_line {
                sink.error("Invalid Entity", "Unescaped '&'; use '&amp;'", line);
                self.last_line = line;
            }
        }
        self.cursor = end;
    }
}

pub struct XmlScanner;

impl LanguageScanner for XmlScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Xml
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);
        let mut stack: Vec<(String, usize)> = Vec::new();
        let mut root_seen = false;
        let mut multiple_roots_reported = false;
        let mut entities = EntityCheck::new(&code, &index);

        for caps in TAG.captures_iter(&code) {
            let Some(whole) = caps.get(0) else { continue };
            entities.advance_to(whole.end(), sink);
            let line = index.line_of(whole.start());
            let name = caps[2].to_string();

            if !caps[1].is_empty() {
                match stack.iter().rposition(|(open, _)| *open == name) {
                    Some(at) => {
                        if let Some((inner, inner_line)) = stack.get(at + 1) {
                            sink.error(
                                "Syntax Error",
                                format!(
                                    "Mismatched closing tag </{}>: <{}> is still open",
                                    name, inner
                                ),
                                *inner_line,
                            );
                        }
                        stack.truncate(at);
                    }
                    None => sink.error(
                        "Syntax Error",
                        format!("Unexpected closing tag </{}>", name),
                        line,
                    ),
                }
                continue;
            }

            if stack.is_empty() {
                if root_seen && !multiple_roots_reported {
                    sink.error(
                        "Multiple Root Elements",
                        "Document has more than one root element",
                        line,
                    );
                    multiple_roots_reported = true;
                }
                root_seen = true;
            }
            check_attributes(&caps[3], line, sink);
            if caps[4].is_empty() {
                stack.push((name, line));
            }
        }

        entities.advance_to(code.len(), sink);
        for (open, line) in stack {
            sink.error("Syntax Error", format!("Unclosed tag <{}>", open), line);
        }
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);
        let body = code.strip_prefix('\u{feff}').unwrap_or(&code);

        match body.find("<?xml") {
            Some(0) => {}
            Some(at) => sink.error(
                "Misplaced Declaration",
                "The XML declaration must be at the very start of the document",
                index.line_of(at + (code.len() - body.len())),
            ),
            None if !body.trim().is_empty() => sink.report(
                Severity::Info,
                "Missing Declaration",
                "Document has no <?xml ...?> declaration",
                None,
            ),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnostic;

    fn run(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::Xml)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    #[test]
    fn test_well_formed_document_is_clean() {
        let src = "<?xml version=\"1.0\"?>\n<root a=\"1\">\n  <!-- <x> -->\n  <item b='2'/>\n  <![CDATA[ <y> & ]]>\n  <name>A &amp; B</name>\n</root>\n";
        let diags = run(src);
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_mismatched_closing_tag_at_opener() {
        let diags = run("<root>\n  <a>\n  <b>\n  </a>\n</root>\n");
        let errors: Vec<_> = diags.iter().filter(|d| d.kind == "Syntax Error").collect();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert_eq!(errors[0].line, Some(3));
        assert!(errors[0].message.contains("</a>") && errors[0].message.contains("<b>"));
    }

    #[test]
    fn test_unexpected_and_unclosed_tags() {
        let diags = run("<root>\n</x>\n<open>\n");
        assert!(diags
            .iter()
            .any(|d| d.message == "Unexpected closing tag </x>" && d.line == Some(2)));
        assert!(diags.iter().any(|d| d.message == "Unclosed tag <root>" && d.line == Some(1)));
        assert!(diags.iter().any(|d| d.message == "Unclosed tag <open>" && d.line == Some(3)));
    }

    #[test]
    fn test_multiple_roots_reported_once() {
        let diags = run("<a/>\n<b/>\n<c/>\n");
        let roots: Vec<_> = diags.iter().filter(|d| d.kind == "Multiple Root Elements").collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].line, Some(2));
    }

    #[test]
    fn test_attribute_errors() {
        let diags = run("<root x=1 y=\"2\" y=\"3\"/>\n");
        assert!(has(&diags, "Unquoted Attribute", 1));
        assert!(has(&diags, "Duplicate Attribute", 1));
    }

    #[test]
    fn test_bare_ampersand() {
        let diags = run("<r>Fish & chips &amp; &#38; &#x26;</r>\n");
        assert_eq!(diags.iter().filter(|d| d.kind == "Invalid Entity").count(), 1);
        assert!(has(&diags, "Invalid Entity", 1));
    }

    #[test]
    fn test_ampersand_reported_before_later_tag_errors() {
        let diags = run("<r>\n  a & b\n  </x>\n</r>\n");
        let entity = diags.iter().position(|d| d.kind == "Invalid Entity");
        let closing = diags
            .iter()
            .position(|d| d.message == "Unexpected closing tag </x>");
        assert!(entity.is_some() && closing.is_some(), "{:?}", diags);
        assert!(entity < closing);
        assert!(has(&diags, "Invalid Entity", 2));
    }

    #[test]
    fn test_declaration_placement() {
        let diags = run("\n<?xml version=\"1.0\"?>\n<r/>\n");
        assert!(has(&diags, "Misplaced Declaration", 2));
        let diags = run("<r/>\n");
        let missing = diags.iter().find(|d| d.kind == "Missing Declaration").expect("missing");
        assert_eq!(missing.line, None);
    }
}
