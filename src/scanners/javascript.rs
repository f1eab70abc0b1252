//! JavaScript scanner (also the JSX rules reused by TypeScript).

use crate::engine::lines::LineIndex;
use crate::engine::scan::{
    code_text, last_char, next_code_line, report_open_string, report_unterminated, scan_lines,
    BraceFrame, BraceStack, BracketTracker, CodeLine, LexicalRules, Region, StringDelim,
};
use crate::engine::symbols::{count_word, is_js_word_char, SymbolTable};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::models::Severity;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

pub(crate) const RULES: LexicalRules = LexicalRules {
    line_comments: &["//"],
    block_comments: &[("/*", "*/")],
    strings: &[
        StringDelim::single("\""),
        StringDelim::single("'"),
        StringDelim::multi("`"),
    ],
    escapes: true,
    regex_literals: true,
    ..LexicalRules::EMPTY
};

/// Characters that make a following `{` an object literal.
pub(crate) const LITERAL_AFTER: &str = "=(,:[?";

/// Statement headers and block delimiters that need no semicolon.
static NO_TERMINATOR: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^(if|else|for|while|do|switch|case|default|try|catch|finally|function|class|import)\b",
        r"^async\s+function\b",
        r"^export\s+(default\s+)?(async\s+)?(function|class)\b",
        r"^\}\s*$",
        r"^\}\s*(else|catch|finally|while)\b",
        r"^@",
        r"^<",
        r"^#!",
    ])
    .expect("valid exclusion patterns")
});

static VAR_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:var|let|const)\s+([A-Za-z_$][\w$]*)\s*=").expect("valid regex"));
static VAR_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s;(])var\s+[A-Za-z_$\[{]").expect("valid regex"));
static CONSOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bconsole\.(log|debug|info|trace)\s*\(").expect("valid regex"));
static DEBUGGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdebugger\b").expect("valid regex"));
static EVAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\beval\s*\(").expect("valid regex"));
static EQUALITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[!=]=+").expect("valid regex"));
static NULL_AFTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(null|undefined)\b").expect("valid regex"));
static HOOK_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(use[A-Z][\w$]*)\s*\(").expect("valid regex"));
static HOOK_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(function\s+use[A-Z]|(const|let|var)\s+use[A-Z][\w$]*\s*=)").expect("valid regex")
});
static MAP_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.map\s*\(").expect("valid regex"));
static JSX_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z]").expect("valid regex"));
pub(crate) static FUNCTION_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(").expect("valid regex")
});
static IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([^;]+?)\s+from\b").expect("valid regex"));
static TERMINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(return|throw)\b").expect("valid regex"));
static CASE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(case\b|default\s*:)").expect("valid regex"));

pub struct JavaScriptScanner;

impl LanguageScanner for JavaScriptScanner {
    fn language(&self) -> LanguageId {
        LanguageId::JavaScript
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let mut tracker = BracketTracker::standard();
        let mut braces = BraceStack::new(LITERAL_AFTER);

        for (idx, line) in lines.iter().enumerate() {
            let n = line.number;
            let parens_before = tracker.open_count(&['(', '[']);
            let literal_before = braces.in_literal();
            report_jsx_aware_open_string(line, sink);
            hook_in_conditional(&line.code, braces.frames(), n, sink);

            tracker.feed(&line.code, n, sink);
            braces.feed(&line.code, n);

            let code = line.trimmed();
            if code.is_empty() || line.starts_in != Region::Code {
                continue;
            }

            if line.is_plain()
                && !line.unterminated_string
                && parens_before == 0
                && tracker.open_count(&['(', '[']) == 0
                && !literal_before
                && needs_semicolon(code)
                && !NO_TERMINATOR.is_match(code)
                && !continues_on_next_line(&lines, idx)
            {
                sink.warning("Missing Semicolon", "Missing semicolon at end of statement", n);
            }

            smell_checks(line, source, &VAR_DECL, sink);
            map_without_key(&lines, idx, sink);
        }

        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);

        for caps in FUNCTION_DECL.captures_iter(&code) {
            let Some(name) = caps.get(1) else { continue };
            let line = index.line_of(name.start());
            let exported = lines
                .get(line - 1)
                .is_some_and(|l| l.code.contains("export"));
            if !exported && count_word(source, name.as_str(), is_js_word_char) == 1 {
                sink.info(
                    "Unused Function",
                    format!("Function '{}' is declared but never called", name.as_str()),
                    line,
                );
            }
        }
        unused_imports(source, &code, &index, sink);
        unreachable_after_return(&lines, sink);
    }
}

/// Per-line smells shared with TypeScript. `var_decl` captures the
/// declared name in group 1.
pub(crate) fn smell_checks(
    line: &CodeLine<'_>,
    source: &str,
    var_decl: &Regex,
    sink: &mut DiagnosticSink,
) {
    let n = line.number;
    if VAR_KEYWORD.is_match(&line.code) {
        sink.warning(
            "Deprecated Keyword",
            "Use 'let' or 'const' instead of 'var'",
            n,
        );
    }
    if let Some(caps) = CONSOLE.captures(&line.code) {
        sink.info(
            "Debug Statement",
            format!("Debug output 'console.{}' left in code", &caps[1]),
            n,
        );
    }
    if DEBUGGER.is_match(&line.code) {
        sink.warning("Debugger Statement", "Remove 'debugger' statement", n);
    }
    if EVAL.is_match(&line.code) {
        sink.warning("Security", "Avoid eval(): it executes arbitrary code", n);
    }
    loose_equality(&line.code, n, sink);
    if let Some(caps) = var_decl.captures(&line.code) {
        let name = &caps[1];
        if count_word(source, name, is_js_word_char) == 1 {
            sink.info(
                "Unused Variable",
                format!("Variable '{}' is declared but never used", name),
                n,
            );
        }
    }
}

/// JSX text content (`<p>Don't</p>`) opens quotes that are not strings.
pub(crate) fn report_jsx_aware_open_string(line: &CodeLine<'_>, sink: &mut DiagnosticSink) {
    if !(line.raw.contains('<') && line.raw.contains('>')) {
        report_open_string(line, sink);
    }
}

/// Whether a trimmed statement line lacks a terminator.
pub(crate) fn needs_semicolon(code: &str) -> bool {
    if code.ends_with("++") || code.ends_with("--") {
        return true;
    }
    match last_char(code) {
        Some(c) => !";{},([:=+-*%&|^!?<>.~".contains(c),
        None => false,
    }
}

/// Whether the next code line continues the current expression.
pub(crate) fn continues_on_next_line(lines: &[CodeLine<'_>], idx: usize) -> bool {
    let Some(next) = next_code_line(lines, idx) else {
        return false;
    };
    let next = lines[next].trimmed();
    [".", "?", ":", "&&", "||", "+", "-", "*", "=", "??"]
        .iter()
        .any(|p| next.starts_with(p))
        && !next.starts_with("++")
        && !next.starts_with("--")
}

/// Flag `==`/`!=` outside comparisons against `null`/`undefined`.
pub(crate) fn loose_equality(code: &str, line: usize, sink: &mut DiagnosticSink) {
    for m in EQUALITY.find_iter(code) {
        let op = m.as_str();
        if op != "==" && op != "!=" {
            continue;
        }
        if code[..m.start()].ends_with(['<', '>']) || NULL_AFTER.is_match(&code[m.end()..]) {
            continue;
        }
        let strict = if op == "==" { "===" } else { "!==" };
        sink.warning(
            "Loose Equality",
            format!("Use '{}' instead of '{}'", strict, op),
            line,
        );
        return;
    }
}

/// Rule of hooks: a hook called inside an `if`/loop/`switch` block.
pub(crate) fn hook_in_conditional(
    code: &str,
    frames: &[BraceFrame],
    line: usize,
    sink: &mut DiagnosticSink,
) {
    if HOOK_DECL.is_match(code) {
        return;
    }
    let Some(caps) = HOOK_CALL.captures(code) else {
        return;
    };
    if frames.iter().any(|f| f.is_conditional()) {
        sink.warning(
            "Hook Rule",
            format!(
                "React hook '{}' is called inside a conditional or loop",
                &caps[1]
            ),
            line,
        );
    }
}

/// JSX elements returned from a `.map(` callback without a `key` prop.
pub(crate) fn map_without_key(lines: &[CodeLine<'_>], idx: usize, sink: &mut DiagnosticSink) {
    let line = &lines[idx];
    let Some(m) = MAP_CALL.find(&line.code) else {
        return;
    };
    let mut callback = String::new();
    let mut depth = 0usize;
    let mut started = false;
    'lines: for (k, l) in lines.iter().enumerate().skip(idx).take(12) {
        let text = if k == idx { &l.code[m.end() - 1..] } else { l.code.as_str() };
        for c in text.chars() {
            match c {
                '(' => {
                    depth += 1;
                    started = true;
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    if started && depth == 0 {
                        break 'lines;
                    }
                }
                _ => {}
            }
            callback.push(c);
        }
        callback.push('\n');
    }
    if JSX_TAG.is_match(&callback) && !callback.contains("key=") {
        sink.warning(
            "Missing Key Prop",
            "Elements returned from .map() need a unique 'key' prop",
            line.number,
        );
    }
}

/// Imported bindings that are never referenced again.
pub(crate) fn unused_imports(
    source: &str,
    code: &str,
    index: &LineIndex,
    sink: &mut DiagnosticSink,
) {
    let mut table = SymbolTable::new();
    for caps in IMPORT.captures_iter(code) {
        let Some(clause) = caps.get(1) else { continue };
        for (offset, name) in import_bindings(clause.as_str()) {
            table.declare(name, Some(index.line_of(clause.start() + offset)));
        }
    }
    for (name, line) in table.unused(source, is_js_word_char) {
        sink.report(
            Severity::Info,
            "Unused Import",
            format!("Import '{}' is never used", name),
            line,
        );
    }
}

/// Local binding names introduced by an import clause, with their offsets.
fn import_bindings(clause: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut start = 0;
    for part in clause.split(',') {
        let offset = start;
        start += part.len() + 1;
        let cleaned = part.replace(['{', '}'], " ");
        let words: Vec<&str> = cleaned.split_whitespace().collect();
        let name = match words.as_slice() {
            [] => continue,
            [.., "as", alias] => *alias,
            ["type", name] => *name,
            [name] => *name,
            _ => continue,
        };
        if name == "*" || !name.chars().all(is_js_word_char) {
            continue;
        }
        let within = part.find(name).unwrap_or(0);
        out.push((offset + within, name.to_string()));
    }
    out
}

/// Statements following `return`/`throw` in the same block.
pub(crate) fn unreachable_after_return(lines: &[CodeLine<'_>], sink: &mut DiagnosticSink) {
    let mut depth = 0usize;
    let mut terminated: Option<usize> = None;
    for line in lines {
        let code = line.trimmed();
        if code.is_empty() {
            continue;
        }
        let depth_before = depth;
        if let Some(d) = terminated {
            let closes = code.starts_with('}') || CASE_LABEL.is_match(code);
            if depth_before == d && !closes {
                sink.warning(
                    "Unreachable Code",
                    "Unreachable code after return",
                    line.number,
                );
                terminated = None;
            } else if depth_before < d || closes {
                terminated = None;
            }
        }
        for c in code.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        if depth_before >= 1
            && depth == depth_before
            && TERMINAL.is_match(code)
            && statement_complete(code)
        {
            terminated = Some(depth_before);
        }
    }
}

fn statement_complete(code: &str) -> bool {
    if code.ends_with(';') {
        return true;
    }
    let balanced = code.matches('(').count() == code.matches(')').count()
        && code.matches('[').count() == code.matches(']').count();
    balanced && !matches!(last_char(code), Some(c) if "({[,=+-*/&|?:".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnostic;

    fn run(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::JavaScript)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    fn count(diags: &[Diagnostic], kind: &str) -> usize {
        diags.iter().filter(|d| d.kind == kind).count()
    }

    #[test]
    fn test_semicolon_exclusions() {
        let src = "import x from './x'\nfunction f(a) {\n  if (a) {\n    return a;\n  } else {\n    x(a);\n  }\n}\nf(1);\n";
        let diags = run(src);
        assert_eq!(count(&diags, "Missing Semicolon"), 0, "{:?}", diags);
    }

    #[test]
    fn test_object_literal_and_chained_calls_are_not_flagged() {
        let src = "const o = {\n  a: 1,\n  b: 2\n};\nfetch(url)\n  .then(r => r.json())\n  .catch(e => e);\nuse(o);\n";
        let diags = run(src);
        assert_eq!(count(&diags, "Missing Semicolon"), 0, "{:?}", diags);
    }

    #[test]
    fn test_missing_semicolon_inside_block() {
        let src = "function f() {\n  const a = g()\n  return a;\n}\nf();\n";
        let diags = run(src);
        assert!(has(&diags, "Missing Semicolon", 2));
        assert_eq!(count(&diags, "Missing Semicolon"), 1);
    }

    #[test]
    fn test_mismatched_bracket_reported_at_opener() {
        let diags = run("call(a, [1, 2);\n");
        let d = diags.iter().find(|d| d.kind == "Syntax Error").expect("syntax error");
        assert_eq!(d.line, Some(1));
        assert!(d.message.contains("'['") && d.message.contains("')'"));
    }

    #[test]
    fn test_brackets_in_strings_regex_and_comments_ignored() {
        let src = "const s = \"{[(\";\nconst r = /[)]+/;\n// }\n/* ] */\nuse(s, r);\n";
        let diags = run(src);
        assert_eq!(count(&diags, "Syntax Error"), 0, "{:?}", diags);
    }

    #[test]
    fn test_unterminated_comment() {
        let diags = run("let a = 1;\n/* never closed\nuse(a);\n");
        assert!(diags
            .iter()
            .any(|d| d.message == "Unterminated block comment" && d.line == Some(2)));
    }

    #[test]
    fn test_smells() {
        let src = "var a = 1;\nconsole.log(a);\nif (a == 2) { debugger; }\neval(\"a\");\nif (a != null) {}\n";
        let diags = run(src);
        assert!(has(&diags, "Deprecated Keyword", 1));
        assert!(has(&diags, "Debug Statement", 2));
        assert!(has(&diags, "Loose Equality", 3));
        assert!(has(&diags, "Debugger Statement", 3));
        assert!(has(&diags, "Security", 4));
        assert!(!has(&diags, "Loose Equality", 5));
    }

    #[test]
    fn test_strict_equality_not_flagged() {
        let diags = run("if (a === b && c !== d) { go(); }\n");
        assert_eq!(count(&diags, "Loose Equality"), 0);
    }

    #[test]
    fn test_hook_inside_condition() {
        let src = "function App(props) {\n  const [a, setA] = useState(0);\n  if (props.x) {\n    useEffect(() => {});\n  }\n  return a;\n}\n";
        let diags = run(src);
        assert!(has(&diags, "Hook Rule", 4));
        assert!(!has(&diags, "Hook Rule", 2));
    }

    #[test]
    fn test_map_without_key() {
        let src = "const items = list.map(item => (\n  <li>{item}</li>\n));\nconst ok = list.map(i => <li key={i}>{i}</li>);\nuse(items, ok);\n";
        let diags = run(src);
        assert!(has(&diags, "Missing Key Prop", 1));
        assert!(!has(&diags, "Missing Key Prop", 4));
    }

    #[test]
    fn test_unused_function_and_import() {
        let src = "import { a, b as c } from 'lib';\nimport D from 'd';\nfunction helper() {}\nfunction main() { a(); }\nmain();\n";
        let diags = run(src);
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Function" && d.message.contains("'helper'") && d.line == Some(3)));
        assert!(!diags.iter().any(|d| d.kind == "Unused Function" && d.message.contains("'main'")));
        assert!(diags.iter().any(|d| d.kind == "Unused Import" && d.message.contains("'c'")));
        assert!(diags.iter().any(|d| d.kind == "Unused Import" && d.message.contains("'D'") && d.line == Some(2)));
        assert!(!diags.iter().any(|d| d.kind == "Unused Import" && d.message.contains("'a'")));
    }

    #[test]
    fn test_unreachable_after_return() {
        let src = "function f(x) {\n  return x;\n  x += 1;\n}\nfunction g(y) {\n  switch (y) {\n    case 1:\n      return 1;\n    case 2:\n      return 2;\n  }\n  return 0;\n}\nf(g(1));\n";
        let diags = run(src);
        assert!(has(&diags, "Unreachable Code", 3));
        assert_eq!(count(&diags, "Unreachable Code"), 1, "{:?}", diags);
    }

    #[test]
    fn test_semantic_follows_syntax() {
        let diags = run("function lonely() {\n");
        let syntax = diags.iter().position(|d| d.kind == "Syntax Error").unwrap();
        let semantic = diags.iter().position(|d| d.kind == "Unused Function").unwrap();
        assert!(syntax < semantic);
    }
}
