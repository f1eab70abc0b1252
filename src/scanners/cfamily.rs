//! C and C++ scanner.

use crate::engine::scan::{
    code_text, last_char, next_code_line, report_open_string, report_unterminated, scan_lines,
    BraceStack, BracketTracker, CodeLine, LexicalRules, StringDelim,
};
use crate::engine::symbols::{count_word, is_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::scanners::javascript::unreachable_after_return;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

const RULES: LexicalRules = LexicalRules {
    line_comments: &["//"],
    block_comments: &[("/*", "*/")],
    strings: &[StringDelim::single("\""), StringDelim::single("'")],
    escapes: true,
    ..LexicalRules::EMPTY
};

static NO_TERMINATOR: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^#",
        r"^(if|else|for|while|do|switch|case|default|try|catch)\b",
        r"^(public|private|protected)\s*:",
        r"^template\s*<",
        r#"^extern\s+"C""#,
    ])
    .expect("valid exclusion patterns")
});

static GETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bgets\s*\(").expect("valid regex"));
static UNBOUNDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(strcpy|strcat|sprintf|scanf)\s*\(").expect("valid regex"));
static CONDITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(if|while)\s*\((.*)\)").expect("valid regex"));
static GOTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bgoto\s+\w+").expect("valid regex"));
static LOCAL_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:const|static|unsigned|signed|long|short|volatile)\s+)*(?:int|char|float|double|long|short|bool|size_t|auto|std::\w+(?:<[^>]*>)?|\w+_t|[A-Z]\w*)\s*[\*&]*\s+[\*&]*([A-Za-z_]\w*)\s*(?:=|;|\[)",
    )
    .expect("valid regex")
});
static FUNCTION_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[\w:<>\*&]+\s+)+[\*&]*([A-Za-z_][\w:~]*)\s*\([^;]*\)\s*(?:const\s*)?\{?\s*$")
        .expect("valid regex")
});
static ALLOC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(malloc|calloc|realloc)\s*\(").expect("valid regex"));
static FREE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfree\s*\(").expect("valid regex"));
static NEW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnew\s+[A-Za-z_]").expect("valid regex"));
static DELETE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdelete\b").expect("valid regex"));
static INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*#\s*include\s*([<"][^>"]+[>"])"#).expect("valid regex"));

const KEYWORDS: &[&str] = &["if", "while", "for", "switch", "return", "sizeof", "catch"];

fn needs_semicolon(code: &str) -> bool {
    match last_char(code) {
        Some(c) => !";{},(:\\=+-*/%&|^!?<>.[".contains(c),
        None => false,
    }
}

/// `if (x = y)`: a single `=` inside an `if`/`while` condition.
fn assigns_in_condition(code: &str) -> bool {
    let Some(caps) = CONDITION.captures(code) else {
        return false;
    };
    let inner = caps[2].trim();
    // doubled parentheses mark an intended assignment
    if inner.starts_with('(') && inner.ends_with(')') {
        return false;
    }
    let chars: Vec<char> = inner.chars().collect();
    chars.iter().enumerate().any(|(i, c)| {
        *c == '='
            && chars.get(i + 1) != Some(&'=')
            && !matches!(i.checked_sub(1).map(|p| chars[p]), Some('=' | '!' | '<' | '>'))
    })
}

/// Whether a line is exempt because of the line that follows it.
fn continues_on_next_line(lines: &[CodeLine<'_>], idx: usize) -> bool {
    let Some(next) = next_code_line(lines, idx) else {
        return false;
    };
    let next = lines[next].trimmed();
    let current = lines[idx].trimmed();
    (current.ends_with(')') && next.starts_with('{'))
        || ["{", "<<", ">>", "+", "-", ".", "->", "?", ":", "&&", "||", "="]
            .iter()
            .any(|p| next.starts_with(p))
}

pub struct CFamilyScanner;

impl LanguageScanner for CFamilyScanner {
    fn language(&self) -> LanguageId {
        LanguageId::CFamily
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let mut tracker = BracketTracker::standard();
        let mut braces = BraceStack::new("=(,");
        let mut macro_continues = false;

        for (idx, line) in lines.iter().enumerate() {
            let n = line.number;
            let parens_before = tracker.open_count(&['(', '[']);
            let literal_before = braces.in_literal();
            let depth_before = braces.depth();
            let in_macro = macro_continues;
            report_open_string(line, sink);
            tracker.feed(&line.code, n, sink);
            braces.feed(&line.code, n);

            let code = line.trimmed();
            macro_continues = code.ends_with('\\');
            if code.is_empty() {
                continue;
            }

            if line.is_plain()
                && !line.unterminated_string
                && !in_macro
                && parens_before == 0
                && tracker.open_count(&['(', '[']) == 0
                && !literal_before
                && needs_semicolon(code)
                && !NO_TERMINATOR.is_match(code)
                && !continues_on_next_line(&lines, idx)
            {
                sink.warning("Missing Semicolon", "Missing semicolon at end of statement", n);
            }

            if GETS.is_match(code) {
                sink.error(
                    "Unsafe Function",
                    "'gets' cannot limit input length; use 'fgets'",
                    n,
                );
            }
            if let Some(caps) = UNBOUNDED.captures(code) {
                sink.warning(
                    "Unsafe Function",
                    format!("'{}' does not check buffer bounds", &caps[1]),
                    n,
                );
            }
            if assigns_in_condition(code) {
                sink.warning(
                    "Assignment in Condition",
                    "Assignment inside a condition; did you mean '=='?",
                    n,
                );
            }
            if GOTO.is_match(code) {
                sink.info("Goto", "Avoid 'goto'; prefer structured control flow", n);
            }
            if depth_before > 0 {
                if let Some(caps) = LOCAL_DECL.captures(code) {
                    let name = &caps[1];
                    if count_word(source, name, is_word_char) == 1 {
                        sink.info(
                            "Unused Variable",
                            format!("Variable '{}' is declared but never used", name),
                            n,
                        );
                    }
                }
            }
        }

        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);

        let mut depth = 0usize;
        let mut includes: Vec<String> = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let depth_before = depth;
            for c in line.code.chars() {
                match c {
                    '{' => depth += 1,
                    '}' => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }

            if line.trimmed().starts_with('#') {
                if let Some(caps) = INCLUDE.captures(line.raw) {
                    let target = caps[1].to_string();
                    if includes.contains(&target) {
                        sink.warning(
                            "Duplicate Include",
                            format!("{} is included more than once", target),
                            line.number,
                        );
                    } else {
                        includes.push(target);
                    }
                }
                continue;
            }

            if depth_before > 0 {
                continue;
            }
            let Some(caps) = FUNCTION_DEF.captures(&line.code) else {
                continue;
            };
            let name = &caps[1];
            let opens_body = line.trimmed().ends_with('{')
                || next_code_line(&lines, idx).is_some_and(|k| lines[k].trimmed().starts_with('{'));
            if !opens_body || name == "main" || KEYWORDS.contains(&name) || name.contains("::") {
                continue;
            }
            if count_word(source, name, is_word_char) == 1 {
                sink.info(
                    "Unused Function",
                    format!("Function '{}' is defined but never called", name),
                    line.number,
                );
            }
        }

        if let Some(alloc) = lines.iter().find(|l| ALLOC.is_match(&l.code)) {
            if !FREE.is_match(&code) {
                sink.warning(
                    "Memory Leak",
                    "Memory is allocated but never freed",
                    alloc.number,
                );
            }
        }
        if let Some(alloc) = lines.iter().find(|l| NEW.is_match(&l.code)) {
            if !DELETE.is_match(&code) {
                sink.info(
                    "Memory Management",
                    "'new' without a matching 'delete'; consider a smart pointer",
                    alloc.number,
                );
            }
        }

        unreachable_after_return(&lines, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Diagnostic, Severity};

    fn run(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::CFamily)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    #[test]
    fn test_clean_program() {
        let src = "#include <stdio.h>\n\nint add(int a, int b)\n{\n    return a + b;\n}\n\nint main(void) {\n    int total = add(1, 2);\n    if (total > 2) {\n        printf(\"%d\\n\", total);\n    }\n    return 0;\n}\n";
        let diags = run(src);
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_missing_semicolon() {
        let diags = run("int main(void) {\n    int x = 1\n    return x;\n}\n");
        assert!(has(&diags, "Missing Semicolon", 2));
        let diags = run("#define SQR(x) \\\n    ((x) * (x))\nint y = SQR(2);\n");
        assert!(diags.iter().all(|d| d.kind != "Missing Semicolon"), "{:?}", diags);
    }

    #[test]
    fn test_unsafe_calls_and_conditions() {
        let src = "void f(char *d, const char *s) {\n    char buf[8];\n    gets(buf);\n    strcpy(d, s);\n    if (x = 1) { goto out; }\nout:\n    return;\n}\n";
        let diags = run(src);
        let gets = diags
            .iter()
            .find(|d| d.kind == "Unsafe Function" && d.line == Some(3))
            .expect("gets");
        assert_eq!(gets.severity, Severity::Error);
        let strcpy = diags
            .iter()
            .find(|d| d.kind == "Unsafe Function" && d.line == Some(4))
            .expect("strcpy");
        assert_eq!(strcpy.severity, Severity::Warning);
        assert!(has(&diags, "Assignment in Condition", 5));
        assert!(has(&diags, "Goto", 5));
        assert!(!diags.iter().any(|d| d.kind == "Assignment in Condition" && d.line != Some(5)));
    }

    #[test]
    fn test_whole_file_findings() {
        let src = "#include <stdlib.h>\n#include <stdlib.h>\nstatic int helper(int v) {\n    return v;\n}\nint main(void) {\n    char *p = malloc(4);\n    return 0;\n    p[0] = 1;\n}\n";
        let diags = run(src);
        assert!(has(&diags, "Duplicate Include", 2));
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Function" && d.message.contains("'helper'") && d.line == Some(3)));
        assert!(has(&diags, "Memory Leak", 7));
        assert!(has(&diags, "Unreachable Code", 9));
    }

    #[test]
    fn test_bracket_errors() {
        let diags = run("int f() {\n    return (1;\n}\n");
        assert!(diags.iter().any(|d| d.kind == "Syntax Error" && d.line == Some(2)));
        let diags = run("char *s = \"abc;\n");
        assert!(diags
            .iter()
            .any(|d| d.message == "Unterminated string literal" && d.line == Some(1)));
    }
}
