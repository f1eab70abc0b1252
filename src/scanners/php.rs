//! PHP scanner. Only the code inside `<?php ... ?>` and `<?= ... ?>` is
//! checked; surrounding markup is blanked so line numbers stay aligned.

use std::collections::HashSet;

use crate::engine::scan::{
    report_open_string, report_unterminated, scan_lines, BraceStack, BracketTracker, CodeLine,
    LexicalRules, StringDelim,
};
use crate::engine::symbols::{count_word, is_js_word_char, is_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::scanners::javascript::{continues_on_next_line, needs_semicolon, unreachable_after_return};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

const RULES: LexicalRules = LexicalRules {
    line_comments: &["//", "#"],
    block_comments: &[("/*", "*/")],
    strings: &[StringDelim::multi("\""), StringDelim::multi("'")],
    escapes: true,
    ..LexicalRules::EMPTY
};

static OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\?(?:php\b|=)").expect("valid regex"));

static NO_TERMINATOR: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^(if|else|elseif|for|foreach|while|do|switch|case|default|try|catch|finally|function|class|interface|trait|enum|namespace|abstract|final|declare)\b",
        r"^(public|private|protected|static)\s+(static\s+)?function\b",
        r"^\}",
    ])
    .expect("valid exclusion patterns")
});

static DEPRECATED_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(mysql_\w+|eregi?(?:_replace)?|spliti?|create_function|each)\s*\(")
        .expect("valid regex")
});
static VAR_PROPERTY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*var\s+\$").expect("valid regex"));
static DEBUG_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(var_dump|print_r|var_export|debug_zval_dump)\s*\(").expect("valid regex")
});
static SUPPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s=(,!.])@\s*[$A-Za-z_]").expect("valid regex"));
static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\$[A-Za-z_]\w*)\s*=[^=>]").expect("valid regex"));
static FUNCTION_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((?:(?:public|private|protected|static|abstract|final)\s+)*)function\s+&?([A-Za-z_]\w*)\s*\(")
        .expect("valid regex")
});
static TYPE_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(class|trait|interface|enum)\b").expect("valid regex"));
static ECHO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(echo|print)\b").expect("valid regex"));
static QUERY_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(mysql_query|mysqli_query|pg_query|query|exec|prepare)\s*\(").expect("valid regex")
});
static SQL_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(SELECT|INSERT\s+INTO|UPDATE|DELETE\s+FROM)\b").expect("valid regex"));
static REQUEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$_(GET|POST|REQUEST|COOKIE)\b").expect("valid regex"));
static ESCAPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(htmlspecialchars|htmlentities|intval|strip_tags|filter_var|filter_input|json_encode)\s*\(|\(int\)")
        .expect("valid regex")
});

/// Source with everything outside PHP tags blanked.
#[derive(Debug)]
struct PhpSource {
    code: String,
    /// Lines on which a PHP region ends with `?>`.
    closing_lines: HashSet<usize>,
}

fn blank(out: &mut String, text: &str) {
    out.extend(text.chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
}

impl PhpSource {
    fn new(source: &str) -> Self {
        let mut code = String::with_capacity(source.len());
        let mut closing_lines = HashSet::new();
        let mut rest = source;
        loop {
            let Some(open) = OPEN_TAG.find(rest) else {
                blank(&mut code, rest);
                break;
            };
            blank(&mut code, &rest[..open.end()]);
            rest = &rest[open.end()..];
            match rest.find("?>") {
                Some(at) => {
                    code.push_str(&rest[..at]);
                    closing_lines.insert(code.matches('\n').count() + 1);
                    blank(&mut code, "?>");
                    rest = &rest[at + 2..];
                }
                None => {
                    code.push_str(rest);
                    break;
                }
            }
        }
        Self {
            code,
            closing_lines,
        }
    }
}

/// Deprecated call, unless it is a method or static call.
fn deprecated_call(code: &str) -> Option<&str> {
    DEPRECATED_CALL.captures_iter(code).find_map(|caps| {
        let name = caps.get(1)?;
        let before = code[..name.start()].trim_end();
        (!before.ends_with("->") && !before.ends_with("::")).then(|| name.as_str())
    })
}

fn line_checks(line: &CodeLine<'_>, source: &str, sink: &mut DiagnosticSink) {
    let n = line.number;
    let code = line.code.as_str();
    if let Some(name) = deprecated_call(code) {
        sink.warning(
            "Deprecated Function",
            format!("'{}' is deprecated or removed in current PHP", name),
            n,
        );
    }
    if VAR_PROPERTY.is_match(code) {
        sink.warning(
            "Deprecated Keyword",
            "Use a visibility modifier instead of 'var'",
            n,
        );
    }
    if let Some(caps) = DEBUG_CALL.captures(code) {
        sink.info(
            "Debug Statement",
            format!("Debug output '{}' left in code", &caps[1]),
            n,
        );
    }
    if SUPPRESSION.is_match(code) {
        sink.warning("Error Suppression", "'@' hides errors; handle them instead", n);
    }
    if let Some(caps) = ASSIGNMENT.captures(code) {
        let name = &caps[1];
        if name != "$this"
            && !name.starts_with("$_")
            && count_word(source, name, is_js_word_char) == 1
        {
            sink.info(
                "Unused Variable",
                format!("Variable '{}' is assigned but never used", name),
                n,
            );
        }
    }
}

pub struct PhpScanner;

impl LanguageScanner for PhpScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Php
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let php = PhpSource::new(source);
        let lines = scan_lines(&php.code, &RULES);
        let mut tracker = BracketTracker::standard();

        for (idx, line) in lines.iter().enumerate() {
            let n = line.number;
            let parens_before = tracker.open_count(&['(', '[']);
            report_open_string(line, sink);
            tracker.feed(&line.code, n, sink);
            let code = line.trimmed();
            if code.is_empty() {
                continue;
            }

            if line.is_plain()
                && parens_before == 0
                && tracker.open_count(&['(', '[']) == 0
                && !php.closing_lines.contains(&n)
                && needs_semicolon(code)
                && !NO_TERMINATOR.is_match(code)
                && !continues_on_next_line(&lines, idx)
            {
                sink.warning("Missing Semicolon", "Missing semicolon at end of statement", n);
            }
            line_checks(line, source, sink);
        }

        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let php = PhpSource::new(source);
        let lines = scan_lines(&php.code, &RULES);
        let originals: Vec<&str> = source.lines().collect();
        let mut braces = BraceStack::new("=(,[");

        for line in &lines {
            let n = line.number;
            if let Some(caps) = FUNCTION_DEF.captures(&line.code) {
                let modifiers = &caps[1];
                let name = &caps[2];
                let in_type = braces.frames().iter().any(|f| TYPE_HEAD.is_match(&f.head));
                let hidden = modifiers.contains("private") || modifiers.contains("protected");
                let checked = if in_type { hidden } else { modifiers.trim().is_empty() };
                if checked
                    && !name.starts_with("__")
                    && count_word(source, name, is_word_char) == 1
                {
                    sink.info(
                        "Unused Function",
                        format!("Function '{}' is never called", name),
                        n,
                    );
                }
            }

            if REQUEST.is_match(line.raw) && !ESCAPED.is_match(line.raw) {
                let short_echo = originals.get(n - 1).is_some_and(|raw| raw.contains("<?="));
                if ECHO.is_match(&line.code) || short_echo {
                    sink.warning(
                        "Security",
                        "Request data is echoed without escaping (XSS)",
                        n,
                    );
                } else if QUERY_CALL.is_match(&line.code) || SQL_TEXT.is_match(line.raw) {
                    sink.warning(
                        "Security",
                        "Request data is used directly in a database query (SQL injection)",
                        n,
                    );
                }
            }
            braces.feed(&line.code, n);
        }

        unreachable_after_return(&lines, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnostic;

    fn run(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::Php)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    #[test]
    fn test_markup_outside_php_is_ignored() {
        let src = "<html>\n<body>\n<?php\nfunction greet($name)\n{\n    $message = \"Hello \" . htmlspecialchars($name);\n    echo $message;\n}\n\ngreet(\"World\");\n?>\n<p>Don't parse this; {</p>\n</body>\n</html>\n";
        let diags = run(src);
        assert!(diags.is_empty(), "{:?}", diags);
        assert!(run("<p>Hello; world {</p>\n").is_empty());
    }

    #[test]
    fn test_line_smells() {
        let src = "<?php\nclass Legacy {\n    var $count;\n    public function run() {\n        $unused = 1;\n        $link = mysql_connect(\"h\");\n        $rows = @file(\"x\");\n        var_dump($link, $rows);\n        $total = 2\n        return $this->count + $total;\n    }\n}\n";
        let diags = run(src);
        assert!(has(&diags, "Deprecated Keyword", 3));
        assert!(has(&diags, "Unused Variable", 5));
        assert!(has(&diags, "Deprecated Function", 6));
        assert!(has(&diags, "Error Suppression", 7));
        assert!(has(&diags, "Debug Statement", 8));
        let missing: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == "Missing Semicolon")
            .filter_map(|d| d.line)
            .collect();
        assert_eq!(missing, vec![9]);
    }

    #[test]
    fn test_method_call_named_each_is_not_deprecated() {
        let diags = run("<?php\n$items->each(function ($i) { return $i; });\n");
        assert!(!diags.iter().any(|d| d.kind == "Deprecated Function"), "{:?}", diags);
    }

    #[test]
    fn test_semantic_findings() {
        let src = "<?php\nclass Repo {\n    private function unusedHelper() {}\n    private function used() { return 1; }\n    function implicitPublic() {}\n    public function find() {\n        $id = $_GET['id'];\n        $this->db->query(\"SELECT * FROM t WHERE id = \" . $_GET['id']);\n        echo $_POST['name'];\n        return $this->used() + $id;\n        $dead = 1;\n    }\n}\n?>\n<p><?= $_REQUEST['q'] ?></p>\n";
        let diags = run(src);
        let unused: Vec<_> = diags.iter().filter(|d| d.kind == "Unused Function").collect();
        assert_eq!(unused.len(), 1, "{:?}", unused);
        assert_eq!(unused[0].line, Some(3));
        assert!(has(&diags, "Security", 8));
        assert!(has(&diags, "Security", 9));
        assert!(has(&diags, "Security", 15));
        assert!(!has(&diags, "Security", 7));
        assert!(has(&diags, "Unreachable Code", 11));
        assert!(!has(&diags, "Missing Semicolon", 15));
    }
}
