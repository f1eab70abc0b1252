//! TypeScript scanner: the JavaScript rules plus type-system checks.

use crate::engine::lines::LineIndex;
use crate::engine::scan::{code_text, report_unterminated, scan_lines, BraceStack, BracketTracker, Region};
use crate::engine::symbols::{count_word, is_js_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::scanners::javascript::{
    continues_on_next_line, hook_in_conditional, map_without_key, needs_semicolon,
    report_jsx_aware_open_string, smell_checks, unreachable_after_return, unused_imports,
    FUNCTION_DECL, LITERAL_AFTER, RULES,
};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

static NO_TERMINATOR: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^(if|else|for|while|do|switch|case|default|try|catch|finally|function|class|import)\b",
        r"^(export\s+)?(declare\s+)?(abstract\s+)?(interface|enum|namespace|module|class)\b",
        r"^async\s+function\b",
        r"^export\s+(default\s+)?(async\s+)?(function|class)\b",
        r"^(export\s+)?type\s+\w+(<[^>]*>)?\s*=\s*$",
        r"^\}\s*$",
        r"^\}\s*(else|catch|finally|while)\b",
        r"^@",
        r"^<",
        r"^#!",
    ])
    .expect("valid exclusion patterns")
});

static VAR_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:declare\s+)?(?:var|let|const)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=")
        .expect("valid regex")
});
static ANY_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(:\s*any\b|\bas\s+any\b|<any>|\bany\[\])").expect("valid regex"));
static NON_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w$)\]]!(\.|\[)").expect("valid regex"));
static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(interface|type)\s+([A-Za-z_$][\w$]*)").expect("valid regex")
});

/// Frames whose members are declarations rather than statements.
fn in_type_body(braces: &BraceStack) -> bool {
    braces.top().is_some_and(|f| {
        let head = f.head.trim_start_matches("export").trim_start();
        let head = head.trim_start_matches("declare").trim_start();
        ["interface", "enum", "type", "namespace"]
            .iter()
            .any(|kw| head.starts_with(kw))
    })
}

pub struct TypeScriptScanner;

impl LanguageScanner for TypeScriptScanner {
    fn language(&self) -> LanguageId {
        LanguageId::TypeScript
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let mut tracker = BracketTracker::standard();
        let mut braces = BraceStack::new(LITERAL_AFTER);

        for (idx, line) in lines.iter().enumerate() {
            let n = line.number;
            let parens_before = tracker.open_count(&['(', '[']);
            let skip_terminator = braces.in_literal() || in_type_body(&braces);
            report_jsx_aware_open_string(line, sink);
            hook_in_conditional(&line.code, braces.frames(), n, sink);

            tracker.feed(&line.code, n, sink);
            braces.feed(&line.code, n);

            if line.raw.contains("@ts-ignore") {
                sink.warning(
                    "Type Safety",
                    "'@ts-ignore' suppresses type checking for the next line",
                    n,
                );
            }

            let code = line.trimmed();
            if code.is_empty() || line.starts_in != Region::Code {
                continue;
            }

            if line.is_plain()
                && !line.unterminated_string
                && parens_before == 0
                && tracker.open_count(&['(', '[']) == 0
                && !skip_terminator
                && needs_semicolon(code)
                && !NO_TERMINATOR.is_match(code)
                && !continues_on_next_line(&lines, idx)
            {
                sink.warning("Missing Semicolon", "Missing semicolon at end of statement", n);
            }

            smell_checks(line, source, &VAR_DECL, sink);
            if ANY_TYPE.is_match(&line.code) {
                sink.warning("Type Safety", "Avoid the 'any' type", n);
            }
            if NON_NULL.is_match(&line.code) {
                sink.info(
                    "Non-null Assertion",
                    "Non-null assertion '!' bypasses null checks",
                    n,
                );
            }
            map_without_key(&lines, idx, sink);
        }

        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);
        let exported = |line: usize| {
            lines
                .get(line - 1)
                .is_some_and(|l| l.code.contains("export"))
        };

        for caps in FUNCTION_DECL.captures_iter(&code) {
            let Some(name) = caps.get(1) else { continue };
            let line = index.line_of(name.start());
            if !exported(line) && count_word(source, name.as_str(), is_js_word_char) == 1 {
                sink.info(
                    "Unused Function",
                    format!("Function '{}' is declared but never called", name.as_str()),
                    line,
                );
            }
        }
        for caps in TYPE_DECL.captures_iter(&code) {
            let Some(name) = caps.get(2) else { continue };
            let line = index.line_of(name.start());
            if !exported(line) && count_word(source, name.as_str(), is_js_word_char) == 1 {
                let what = if &caps[1] == "interface" { "Interface" } else { "Type alias" };
                sink.info(
                    "Unused Type",
                    format!("{} '{}' is declared but never used", what, name.as_str()),
                    line,
                );
            }
        }
        unused_imports(source, &code, &index, sink);
        unreachable_after_return(&lines, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnostic;

    fn run(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::TypeScript)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    #[test]
    fn test_typed_declarations_are_tracked() {
        let diags = run("const count: number = 1;\nlet seen: string[] = [];\nuse(seen);\n");
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Variable" && d.message.contains("'count'") && d.line == Some(1)));
        assert!(!diags.iter().any(|d| d.kind == "Unused Variable" && d.message.contains("'seen'")));
    }

    #[test]
    fn test_type_safety_checks() {
        let src = "let a: any = load();\nconst b = a as any;\n// @ts-ignore\nconst c = el!.value;\nuse(b, c);\n";
        let diags = run(src);
        assert!(has(&diags, "Type Safety", 1));
        assert!(has(&diags, "Type Safety", 2));
        assert!(has(&diags, "Type Safety", 3));
        assert!(has(&diags, "Non-null Assertion", 4));
    }

    #[test]
    fn test_interface_members_need_no_semicolon() {
        let src = "interface Point {\n  x: number\n  y: number\n}\nexport function mk(): Point {\n  return { x: 1, y: 2 };\n}\n";
        let diags = run(src);
        assert!(diags.iter().all(|d| d.kind != "Missing Semicolon"), "{:?}", diags);
        assert!(diags.iter().all(|d| d.kind != "Syntax Error"), "{:?}", diags);
    }

    #[test]
    fn test_unused_types() {
        let src = "interface Unused {\n  a: number;\n}\ntype Alias = string;\ntype Id = number;\nexport const id: Id = 1;\n";
        let diags = run(src);
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Type" && d.message.contains("'Unused'") && d.line == Some(1)));
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Type" && d.message.contains("'Alias'") && d.line == Some(4)));
        assert!(!diags.iter().any(|d| d.kind == "Unused Type" && d.message.contains("'Id'")));
    }

    #[test]
    fn test_javascript_rules_apply() {
        let diags = run("let x = 5\nif (x == 3) { console.log(x); }\n");
        assert!(has(&diags, "Missing Semicolon", 1));
        assert!(has(&diags, "Loose Equality", 2));
        assert!(has(&diags, "Debug Statement", 2));
    }
}
