//! SQL scanner. Statements are tracked across lines, so a missing `;` is
//! reported on the last line of the unterminated statement.

use crate::engine::lines::LineIndex;
use crate::engine::scan::{
    code_text, report_unterminated, scan_lines, BracketTracker, LexicalRules, StringDelim,
};
use crate::engine::symbols::{count_word_ci, is_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::models::Severity;
use once_cell::sync::Lazy;
use regex::Regex;

const RULES: LexicalRules = LexicalRules {
    line_comments: &["--"],
    block_comments: &[("/*", "*/")],
    strings: &[StringDelim::multi("'"), StringDelim::single("\"")],
    ..LexicalRules::EMPTY
};

static STATEMENT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(SELECT|INSERT|UPDATE|DELETE|CREATE|DROP|ALTER|WITH|TRUNCATE|GRANT|REVOKE|MERGE|REPLACE|USE|SET|EXEC|EXECUTE|COMMIT|ROLLBACK)\b",
    )
    .expect("valid regex")
});
static OPEN_ENDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\bUNION(\s+ALL)?|\bEXCEPT|\bINTERSECT|\bAS|\bIN|\bEXISTS|[(,=])$").expect("valid regex")
});
static SELECT_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bSELECT\s+(DISTINCT\s+)?\*").expect("valid regex"));
static WHERE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bWHERE\b").expect("valid regex"));
static OLD_JOIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*=|=\*").expect("valid regex"));
static DEPRECATED_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(NTEXT|IMAGE)\b").expect("valid regex"));
static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bCREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([\w.]+)",
    )
    .expect("valid regex")
});
static CONSTRAINT_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(PRIMARY|FOREIGN|CONSTRAINT|UNIQUE|CHECK|INDEX|KEY)\b").expect("valid regex")
});
static REFERENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bREFERENCES\s+([\w.]+)").expect("valid regex"));
static CREATE_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bCREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+)\s+ON\s+([\w.]+)",
    )
    .expect("valid regex")
});

/// A statement that has started but not been terminated yet.
#[derive(Debug)]
struct Pending {
    keyword: String,
    first_line: usize,
    last_line: usize,
    text: String,
}

impl Pending {
    /// Whether a statement starting with `keyword` continues this one.
    fn continued_by(&self, keyword: &str) -> bool {
        let owner = self.keyword.as_str();
        match keyword {
            "SELECT" => matches!(owner, "INSERT" | "CREATE" | "WITH" | "REPLACE" | "MERGE")
                || OPEN_ENDED.is_match(self.text.trim_end()),
            "SET" => owner == "UPDATE",
            "INSERT" | "UPDATE" | "DELETE" => owner == "WITH",
            _ => false,
        }
    }

    /// Post-statement checks, run once the statement is complete.
    fn finish(&self, sink: &mut DiagnosticSink) {
        if matches!(self.keyword.as_str(), "DELETE" | "UPDATE") && !WHERE.is_match(&self.text) {
            sink.warning(
                "Missing Where Clause",
                format!("{} without WHERE affects every row", self.keyword),
                self.first_line,
            );
        }
    }
}

pub struct SqlScanner;

impl LanguageScanner for SqlScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Sql
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let mut tracker = BracketTracker::new(&['('], &[')']);
        let mut pending: Option<Pending> = None;

        for line in &lines {
            let n = line.number;
            let depth_before = tracker.depth();
            tracker.feed(&line.code, n, sink);
            let code = line.trimmed();
            if code.is_empty() {
                continue;
            }

            let starts = (depth_before == 0)
                .then(|| STATEMENT_START.captures(code))
                .flatten()
                .map(|caps| caps[1].to_ascii_uppercase());
            if let Some(keyword) = starts {
                let continued = pending.as_ref().is_some_and(|p| p.continued_by(&keyword));
                if !continued {
                    if let Some(open) = pending.take() {
                        sink.warning(
                            "Missing Semicolon",
                            "Statement is not terminated with ';'",
                            open.last_line,
                        );
                        open.finish(sink);
                    }
                    pending = Some(Pending {
                        keyword,
                        first_line: n,
                        last_line: n,
                        text: String::new(),
                    });
                }
            }
            if let Some(open) = pending.as_mut() {
                open.last_line = n;
                open.text.push_str(code);
                open.text.push(' ');
            }
            if code.ends_with(';') {
                if let Some(done) = pending.take() {
                    done.finish(sink);
                }
            }

            if SELECT_STAR.is_match(code) {
                sink.info("Select Star", "Avoid SELECT *; list the columns you need", n);
            }
            if OLD_JOIN.is_match(code) {
                sink.warning(
                    "Deprecated Syntax",
                    "Old-style outer join operator; use an explicit OUTER JOIN",
                    n,
                );
            }
            if let Some(caps) = DEPRECATED_TYPE.captures(code) {
                sink.warning(
                    "Deprecated Syntax",
                    format!("Data type '{}' is deprecated", &caps[1]),
                    n,
                );
            }
        }

        if let Some(open) = pending.take() {
            sink.warning(
                "Missing Semicolon",
                "Statement is not terminated with ';'",
                open.last_line,
            );
            open.finish(sink);
        }
        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let index = LineIndex::new(&code);

        for caps in CREATE_TABLE.captures_iter(&code) {
            let (Some(whole), Some(table)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if count_word_ci(source, table.as_str(), is_word_char) == 1 {
                sink.report(
                    Severity::Info,
                    "Unused Table",
                    format!("Table '{}' is created but never referenced", table.as_str()),
                    None,
                );
            }
            for (offset, column) in column_definitions(&code, whole.end()) {
                if count_word_ci(source, column, is_word_char) == 1 {
                    sink.info(
                        "Unused Column",
                        format!(
                            "Column '{}' in table '{}' is never referenced",
                            column,
                            table.as_str()
                        ),
                        index.line_of(offset),
                    );
                }
            }
        }

        for caps in REFERENCES.captures_iter(&code) {
            let Some(target) = caps.get(1) else { continue };
            sink.info(
                "Foreign Key",
                format!("Foreign key references '{}'", target.as_str()),
                index.line_of(target.start()),
            );
        }
        for caps in CREATE_INDEX.captures_iter(&code) {
            let Some(name) = caps.get(1) else { continue };
            sink.info(
                "Index",
                format!("Index '{}' on table '{}'", name.as_str(), &caps[2]),
                index.line_of(name.start()),
            );
        }
    }
}

/// Column names of the parenthesized definition list that follows `from`,
/// with the byte offset of each name.
fn column_definitions(code: &str, from: usize) -> Vec<(usize, &str)> {
    let Some(open) = code[from..].find('(').map(|i| from + i) else {
        return Vec::new();
    };
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut item_start = open + 1;
    for (i, c) in code[open..].char_indices() {
        let at = open + i;
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    items.push((item_start, &code[item_start..at]));
                    break;
                }
            }
            ',' if depth == 1 => {
                items.push((item_start, &code[item_start..at]));
                item_start = at + 1;
            }
            _ => {}
        }
    }

    items
        .into_iter()
        .filter_map(|(start, item)| {
            let trimmed = item.trim_start();
            let offset = start + item.len() - trimmed.len();
            let name = trimmed.split(|c: char| c.is_whitespace()).next()?;
            if name.is_empty() || CONSTRAINT_ITEM.is_match(trimmed) || !name.chars().all(is_word_char) {
                return None;
            }
            Some((offset, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnostic;

    fn run(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::Sql)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    fn count(diags: &[Diagnostic], kind: &str) -> usize {
        diags.iter().filter(|d| d.kind == kind).count()
    }

    #[test]
    fn test_missing_semicolon_between_statements() {
        let diags = run("SELECT a\nFROM t\nSELECT b FROM t;\n");
        assert!(has(&diags, "Missing Semicolon", 2));
        assert_eq!(count(&diags, "Missing Semicolon"), 1);
    }

    #[test]
    fn test_missing_semicolon_at_end_of_input() {
        let diags = run("SELECT 1");
        assert!(has(&diags, "Missing Semicolon", 1));
    }

    #[test]
    fn test_continuations_are_one_statement() {
        let src = "INSERT INTO t (a)\nSELECT a FROM s;\nUPDATE t\nSET a = 1\nWHERE id = 2;\nSELECT a FROM t\nUNION\nSELECT a FROM s;\n";
        let diags = run(src);
        assert_eq!(count(&diags, "Missing Semicolon"), 0, "{:?}", diags);
        assert_eq!(count(&diags, "Missing Where Clause"), 0);
    }

    #[test]
    fn test_statement_smells() {
        let src = "DELETE FROM t;\nSELECT * FROM t WHERE a *= b;\nCREATE TABLE docs (body NTEXT);\n";
        let diags = run(src);
        assert!(has(&diags, "Missing Where Clause", 1));
        assert!(has(&diags, "Select Star", 2));
        assert!(has(&diags, "Deprecated Syntax", 2));
        assert!(has(&diags, "Deprecated Syntax", 3));
    }

    #[test]
    fn test_parens_in_strings_ignored() {
        let diags = run("SELECT ')' FROM t -- (\nWHERE a IN (1, 2);\n");
        assert_eq!(count(&diags, "Syntax Error"), 0, "{:?}", diags);
        let diags = run("SELECT (1 FROM t;\n");
        assert!(diags.iter().any(|d| d.message.contains("Unmatched opening '('")));
    }

    #[test]
    fn test_schema_findings() {
        let src = "CREATE TABLE users (\n  id INT PRIMARY KEY,\n  name TEXT,\n  created_at TEXT\n);\nCREATE TABLE orders (\n  id INT,\n  user_id INT REFERENCES users(id)\n);\nCREATE INDEX idx_orders_user ON orders(user_id);\nSELECT name FROM users;\n";
        let diags = run(src);
        assert_eq!(count(&diags, "Unused Table"), 0);
        let columns: Vec<_> = diags.iter().filter(|d| d.kind == "Unused Column").collect();
        assert_eq!(columns.len(), 1, "{:?}", columns);
        assert!(columns[0].message.contains("'created_at'"));
        assert_eq!(columns[0].line, Some(4));
        assert!(has(&diags, "Foreign Key", 8));
        assert!(has(&diags, "Index", 10));
    }

    #[test]
    fn test_unused_table_case_insensitive() {
        let diags = run("CREATE TABLE Foo (id INT);\nselect id from foo;\n");
        assert_eq!(count(&diags, "Unused Table"), 0);
        let diags = run("CREATE TABLE foo (id INT);");
        let table = diags.iter().find(|d| d.kind == "Unused Table").expect("unused table");
        assert_eq!(table.line, None);
        assert!(table.message.contains("'foo'"));
    }
}
