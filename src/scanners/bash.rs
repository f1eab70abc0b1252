//! Shell script scanner.
//!
//! Heredoc bodies are blanked before lexing so their text never counts as
//! code. Block keywords (`if`/`fi`, `case`/`esac`, loops/`done`) are matched
//! on the first word of each `;`, `&&` or `|` separated command.

use crate::engine::scan::{
    report_unterminated, scan_lines, BracketTracker, CodeLine, LexicalRules, StringDelim,
};
use crate::engine::symbols::{count_word, is_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use once_cell::sync::Lazy;
use regex::Regex;

const RULES: LexicalRules = LexicalRules {
    line_comments: &["#"],
    strings: &[StringDelim::multi("\""), StringDelim::multi("'")],
    escapes: true,
    comment_needs_blank: true,
    ..LexicalRules::EMPTY
};

static HEREDOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^<])<<-?\s*["']?([A-Za-z_]\w*)["']?"#).expect("valid regex")
});
static CASE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\(?[^()]*?\)").expect("valid regex"));
static THEN_WITHOUT_SEMICOLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[;&|]\s*)(?:if|elif)\s+[^;]*?[^;\s]\s+then\b").expect("valid regex")
});
static DO_WITHOUT_SEMICOLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[;&|]\s*)(?:for|while|until|select)\s+[^;]*?[^;\s]\s+do\b")
        .expect("valid regex")
});
static SINGLE_TEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\[])\[\s([^\]]*?)\s\]").expect("valid regex"));
static EXPANSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{?[A-Za-z_@*#0-9]").expect("valid regex"));
static DANGEROUS_RM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brm\s+-(?:[a-zA-Z]*r[a-zA-Z]*f|[a-zA-Z]*f[a-zA-Z]*r)[a-zA-Z]*\s+(?:/|\$|"|~)"#)
        .expect("valid regex")
});
static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:local\s+|readonly\s+|declare\s+(?:-\w+\s+)?)?([A-Za-z_]\w*)=").expect("valid regex")
});
static FUNCTION_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:function\s+([A-Za-z_][\w-]*)|([A-Za-z_][\w-]*)\s*\(\s*\))")
        .expect("valid regex")
});
static CD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cd\b").expect("valid regex"));
static ERREXIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*set\s+(-[a-zA-Z]*e|-o\s+errexit)").expect("valid regex"));

/// Replace heredoc bodies (and their terminator lines) with blank lines.
fn mask_heredocs(source: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut terminator: Option<String> = None;
    for line in source.lines() {
        if let Some(word) = &terminator {
            if line.trim() == word {
                terminator = None;
            }
            out.push("");
            continue;
        }
        if let Some(caps) = HEREDOC.captures(line) {
            terminator = Some(caps[1].to_string());
        }
        out.push(line);
    }
    out.join("\n")
}

/// First word of every command on a line of code.
fn command_words(code: &str) -> impl Iterator<Item = &str> {
    code.split([';', '&', '|'])
        .filter_map(|segment| segment.split_whitespace().next())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    If,
    Case,
    Loop,
}

impl Block {
    fn opener(self) -> &'static str {
        match self {
            Block::If => "if",
            Block::Case => "case",
            Block::Loop => "loop",
        }
    }

    fn opened_by(word: &str) -> Option<Block> {
        match word {
            "if" => Some(Block::If),
            "case" => Some(Block::Case),
            "for" | "while" | "until" | "select" => Some(Block::Loop),
            _ => None,
        }
    }

    fn closed_by(word: &str) -> Option<Block> {
        match word {
            "fi" => Some(Block::If),
            "esac" => Some(Block::Case),
            "done" => Some(Block::Loop),
            _ => None,
        }
    }
}

/// Stack of open `if`/`case`/loop blocks with the keyword and line of each.
#[derive(Debug, Default)]
struct KeywordBalance {
    open: Vec<(Block, String, usize)>,
}

impl KeywordBalance {
    fn in_case(&self) -> bool {
        matches!(self.open.last(), Some((Block::Case, _, _)))
    }

    fn feed(&mut self, code: &str, line: usize, sink: &mut DiagnosticSink) {
        for word in command_words(code) {
            if let Some(block) = Block::opened_by(word) {
                self.open.push((block, word.to_string(), line));
            } else if let Some(block) = Block::closed_by(word) {
                match self.open.pop() {
                    Some((open, keyword, open_line)) if open != block => sink.error(
                        "Syntax Error",
                        format!(
                            "'{}' on line {} is closed by '{}' (expected the {} block to end first)",
                            keyword,
                            open_line,
                            word,
                            open.opener()
                        ),
                        open_line,
                    ),
                    Some(_) => {}
                    None => sink.error("Syntax Error", format!("Unexpected '{}'", word), line),
                }
            }
        }
    }

    fn finish(self, sink: &mut DiagnosticSink) {
        for (_, keyword, line) in self.open {
            sink.error("Syntax Error", format!("Unmatched '{}'", keyword), line);
        }
    }
}

fn line_smells(line: &CodeLine<'_>, source: &str, sink: &mut DiagnosticSink) {
    let n = line.number;
    let code = line.code.as_str();
    if THEN_WITHOUT_SEMICOLON.is_match(code) {
        sink.warning("Missing Semicolon", "Missing ';' before 'then'", n);
    }
    if DO_WITHOUT_SEMICOLON.is_match(code) {
        sink.warning("Missing Semicolon", "Missing ';' before 'do'", n);
    }
    if SINGLE_TEST
        .captures_iter(code)
        .any(|caps| EXPANSION.is_match(&caps[1]))
    {
        sink.warning(
            "Unquoted Variable",
            "Quote variable expansions inside [ ] tests",
            n,
        );
    }
    if code.contains('`') {
        sink.info("Deprecated Syntax", "Use $(...) instead of backticks", n);
    }
    if DANGEROUS_RM.is_match(code) {
        sink.warning(
            "Dangerous Command",
            "rm -rf on a variable or absolute path",
            n,
        );
    }
    if let Some(caps) = ASSIGNMENT.captures(code) {
        let name = &caps[1];
        if count_word(source, name, is_word_char) == 1 {
            sink.info(
                "Unused Variable",
                format!("Variable '{}' is assigned but never used", name),
                n,
            );
        }
    }
}

pub struct BashScanner;

impl LanguageScanner for BashScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Bash
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let masked = mask_heredocs(source);
        let lines = scan_lines(&masked, &RULES);
        let mut tracker = BracketTracker::standard();
        let mut keywords = KeywordBalance::default();

        if !source.trim().is_empty() && !source.starts_with("#!") {
            sink.info("Missing Shebang", "Script has no #! interpreter line", 1);
        }

        for line in &lines {
            let n = line.number;
            let code = if keywords.in_case() {
                CASE_PATTERN.replace(&line.code, "").into_owned()
            } else {
                line.code.clone()
            };
            tracker.feed(&code, n, sink);
            keywords.feed(&line.code, n, sink);
            line_smells(line, source, sink);
        }

        tracker.finish(sink);
        keywords.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let masked = mask_heredocs(source);
        let lines = scan_lines(&masked, &RULES);

        for line in &lines {
            let Some(caps) = FUNCTION_DEF.captures(&line.code) else {
                continue;
            };
            let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            if count_word(source, name.as_str(), is_word_char) == 1 {
                sink.info(
                    "Unused Function",
                    format!("Function '{}' is defined but never called", name.as_str()),
                    line.number,
                );
            }
        }

        if !ERREXIT.is_match(&masked) {
            for line in &lines {
                let code = line.trimmed();
                if CD.is_match(code) && !code.contains("||") && !code.contains("&&") {
                    sink.info(
                        "Error Handling",
                        "'cd' without '|| exit' keeps running in the wrong directory on failure",
                        line.number,
                    );
                }
            }
        }

        unreachable_after_exit(&lines, sink);
    }
}

/// The first command after a top-level `exit`.
fn unreachable_after_exit(lines: &[CodeLine<'_>], sink: &mut DiagnosticSink) {
    let mut depth = 0isize;
    let mut exited = false;
    for line in lines {
        let code = line.trimmed();
        if code.is_empty() {
            continue;
        }
        if exited && depth == 0 {
            sink.warning(
                "Unreachable Code",
                "Unreachable code after 'exit'",
                line.number,
            );
            return;
        }
        let depth_before = depth;
        for word in command_words(code) {
            if Block::opened_by(word).is_some() {
                depth += 1;
            } else if Block::closed_by(word).is_some() {
                depth -= 1;
            }
        }
        depth += code.matches('{').count() as isize - code.matches('}').count() as isize;
        if depth_before == 0 && depth == 0 && code.split_whitespace().next() == Some("exit") {
            exited = true;
        }
    }
}
