//! Rust scanner.

use crate::engine::scan::{
    code_text, last_char, next_code_line, report_unterminated, scan_lines, BraceStack,
    BracketTracker, CodeLine, LexicalRules, StringDelim,
};
use crate::engine::symbols::{count_word, is_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::models::Severity;
use crate::scanners::javascript::unreachable_after_return;
use once_cell::sync::Lazy;
use regex::Regex;

const RULES: LexicalRules = LexicalRules {
    line_comments: &["//"],
    block_comments: &[("/*", "*/")],
    strings: &[StringDelim::multi("\"")],
    escapes: true,
    char_literals: true,
    ..LexicalRules::EMPTY
};

static STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(let|use|const|static|type)\b").expect("valid regex")
});
static UNWRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.unwrap\(\)").expect("valid regex"));
static UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bunsafe\b").expect("valid regex"));
static PANIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(panic|todo|unimplemented)!").expect("valid regex"));
static DEBUG_PRINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(println|print|eprintln|dbg)!").expect("valid regex"));
static MUT_BORROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&mut\s+([a-z_]\w*)").expect("valid regex"));
static LET_BINDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*let\s+(?:mut\s+)?([a-z_]\w*)\b").expect("valid regex"));
static FN_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(pub(?:\([^)]*\))?\s+)?(?:(?:const|async|unsafe|extern(?:\s+"\s*")?)\s+)*fn\s+([A-Za-z_]\w*)"#)
        .expect("valid regex")
});
static TRAIT_CONTEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:unsafe\s+)?(?:impl\b.*\bfor\b|(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?trait\b)")
        .expect("valid regex")
});
static LIFETIME_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\bfn\s+\w+|\bimpl|\bstruct\s+\w+|\benum\s+\w+|\btrait\s+\w+)\s*<\s*'([a-z]\w*)")
        .expect("valid regex")
});
static RC_REFCELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bRc<\s*RefCell<").expect("valid regex"));
static ARC_LOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bArc<\s*(Mutex|RwLock)<").expect("valid regex"));

const CLONE_HEAVY: usize = 5;

fn needs_semicolon(code: &str) -> bool {
    match last_char(code) {
        Some(c) => !";{},([=+-*/&|.<>".contains(c),
        None => false,
    }
}

fn continues_on_next_line(lines: &[CodeLine<'_>], idx: usize) -> bool {
    next_code_line(lines, idx).is_some_and(|k| {
        let next = lines[k].trimmed();
        [".", "?", "+", "-", "*", "/", "&&", "||", "=", "as "]
            .iter()
            .any(|p| next.starts_with(p))
    })
}

pub struct RustScanner;

impl LanguageScanner for RustScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Rust
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let mut tracker = BracketTracker::standard();

        for (idx, line) in lines.iter().enumerate() {
            let n = line.number;
            let parens_before = tracker.open_count(&['(', '[']);
            tracker.feed(&line.code, n, sink);
            let code = line.trimmed();
            if code.is_empty() {
                continue;
            }

            if line.is_plain()
                && parens_before == 0
                && tracker.open_count(&['(', '[']) == 0
                && STATEMENT.is_match(code)
                && needs_semicolon(code)
                && !continues_on_next_line(&lines, idx)
            {
                sink.warning("Missing Semicolon", "Missing semicolon after statement", n);
            }

            if UNWRAP.is_match(code) {
                sink.warning(
                    "Unwrap Usage",
                    "'.unwrap()' panics on None/Err; handle the error or use '?'",
                    n,
                );
            }
            if UNSAFE.is_match(code) {
                sink.warning("Unsafe Code", "'unsafe' block bypasses memory safety checks", n);
            }
            if let Some(caps) = PANIC.captures(code) {
                sink.warning("Panic", format!("'{}!' aborts at runtime", &caps[1]), n);
            }
            if let Some(caps) = DEBUG_PRINT.captures(code) {
                sink.info(
                    "Debug Statement",
                    format!("Debug output '{}!' left in code", &caps[1]),
                    n,
                );
            }
            let borrowed = MUT_BORROW.captures_iter(code).find_map(|caps| {
                let name = caps.get(1)?;
                let path = code[name.end()..].starts_with("::");
                (name.as_str() != "self" && !path).then(|| name.as_str())
            });
            if let Some(name) = borrowed {
                sink.info(
                    "Ownership",
                    format!("'{}' is mutably borrowed here", name),
                    n,
                );
            }
            if let Some(caps) = LET_BINDING.captures(code) {
                let name = &caps[1];
                if !name.starts_with('_') && count_word(source, name, is_word_char) == 1 {
                    sink.info(
                        "Unused Variable",
                        format!("Binding '{}' is never used", name),
                        n,
                    );
                }
            }
        }

        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let mut braces = BraceStack::new("");
        let mut previous: Option<&str> = None;

        for line in &lines {
            let trimmed = line.trimmed();
            if let Some(caps) = FN_DEF.captures(&line.code) {
                let public = caps.get(1).is_some();
                let name = &caps[2];
                let attributed = previous.is_some_and(|p| p.starts_with("#["));
                let in_trait = braces
                    .frames()
                    .iter()
                    .any(|f| TRAIT_CONTEXT.is_match(&f.head));
                if !public
                    && !attributed
                    && !in_trait
                    && name != "main"
                    && count_word(source, name, is_word_char) == 1
                {
                    sink.info(
                        "Unused Function",
                        format!("Function '{}' is never called", name),
                        line.number,
                    );
                }
            }
            if let Some(caps) = LIFETIME_PARAM.captures(&line.code) {
                sink.info(
                    "Lifetime",
                    format!("Explicit lifetime parameter '{}", &caps[1]),
                    line.number,
                );
            }
            if RC_REFCELL.is_match(&line.code) {
                sink.info(
                    "Shared State",
                    "Rc<RefCell<..>> moves borrow checking to runtime",
                    line.number,
                );
            }
            if let Some(caps) = ARC_LOCK.captures(&line.code) {
                sink.info(
                    "Shared State",
                    format!("Arc<{}<..>> shares mutable state across threads", &caps[1]),
                    line.number,
                );
            }
            braces.feed(&line.code, line.number);
            if !trimmed.is_empty() {
                previous = Some(trimmed);
            }
        }

        let clones = code.matches(".clone()").count();
        if clones > CLONE_HEAVY {
            sink.report(
                Severity::Info,
                "Performance",
                format!("{} calls to .clone(); consider borrowing instead", clones),
                None,
            );
        }

        unreachable_after_return(&lines, sink);
    }
}
