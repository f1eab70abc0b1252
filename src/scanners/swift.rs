//! Swift and Monkey C. Both share a C-style lexical layer; Monkey C adds
//! statement terminators and Toybox module imports.

use std::collections::HashSet;

use crate::engine::scan::{
    code_text, last_char, next_code_line, report_open_string, report_unterminated, scan_lines,
    BraceStack, BracketTracker, CodeLine, LexicalRules, StringDelim,
};
use crate::engine::symbols::{count_word, is_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::scanners::javascript::unreachable_after_return;
use once_cell::sync::Lazy;
use regex::Regex;

const SWIFT_RULES: LexicalRules = LexicalRules {
    line_comments: &["//"],
    block_comments: &[("/*", "*/")],
    strings: &[StringDelim::multi("\"\"\""), StringDelim::single("\"")],
    escapes: true,
    ..LexicalRules::EMPTY
};

const MONKEY_C_RULES: LexicalRules = LexicalRules {
    line_comments: &["//"],
    block_comments: &[("/*", "*/")],
    strings: &[StringDelim::single("\"")],
    escapes: true,
    char_literals: true,
    ..LexicalRules::EMPTY
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Swift,
    MonkeyC,
}

pub struct SwiftScanner {
    flavor: Flavor,
}

pub const SWIFT: SwiftScanner = SwiftScanner {
    flavor: Flavor::Swift,
};

pub const MONKEY_C: SwiftScanner = SwiftScanner {
    flavor: Flavor::MonkeyC,
};

static SWIFT_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:private|fileprivate|static|lazy|weak)\s+)*(?:let|var)\s+([A-Za-z_]\w*)")
        .expect("valid regex")
});
static SWIFT_PRINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(print|debugPrint|NSLog)\(").expect("valid regex"));
static IMPLICIT_UNWRAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*[A-Z][\w.<>\[\]]*!").expect("valid regex"));
static FORCE_UNWRAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\w)\]])!(?:[^=]|$)").expect("valid regex"));
static OPTIONAL_CHAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w)\]]\?\.").expect("valid regex"));
static PRIVATE_FUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:@\w+\s+)*(?:private|fileprivate)\s+(?:(?:static|class|final)\s+)*func\s+([A-Za-z_]\w*)")
        .expect("valid regex")
});

static MONKEY_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:private|hidden|static)\s+)*var\s+([A-Za-z_]\w*)").expect("valid regex")
});
static MONKEY_PRINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bSystem\.println\(").expect("valid regex"));
static USING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:using|import)\s+([\w.]+)(?:\s+as\s+(\w+))?\s*;?").expect("valid regex")
});
static TOYBOX_MODULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(Activity|ActivityMonitor|Application|Attention|Communications|Graphics|Lang|Math|Position|Sensor|System|Time|Timer|UserProfile|WatchUi)\.\w")
        .expect("valid regex")
});
static MONKEY_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:hidden|static|private|public|protected)\s+)*function\s+([A-Za-z_]\w*)")
        .expect("valid regex")
});

const MONKEY_NO_TERMINATOR: &[&str] = &[
    "using", "import", "class", "function", "if", "else", "for", "while", "switch", "case",
    "default", "module", "hidden", "try", "catch", "finally", "do",
];

/// Callbacks the device runtime invokes by name.
const MONKEY_LIFECYCLE: &[&str] = &[
    "initialize",
    "onLayout",
    "onShow",
    "onUpdate",
    "onHide",
    "onStart",
    "onStop",
    "getInitialView",
    "compute",
    "onEnterSleep",
    "onExitSleep",
];

fn inside_function(braces: &BraceStack, keyword: &str) -> bool {
    braces.frames().iter().any(|f| {
        f.head
            .split(|c: char| !is_word_char(c))
            .any(|word| word == keyword)
    })
}

fn monkey_needs_semicolon(lines: &[CodeLine<'_>], idx: usize) -> bool {
    let code = lines[idx].trimmed();
    let first = code.split(|c: char| !is_word_char(c)).next().unwrap_or("");
    if MONKEY_NO_TERMINATOR.contains(&first) || code.starts_with('}') {
        return false;
    }
    let open_ended = match last_char(code) {
        Some(c) => ";{},([=+-*/&|.<>?:!".contains(c),
        None => true,
    };
    let continued = next_code_line(lines, idx).is_some_and(|k| {
        let next = lines[k].trimmed();
        [".", "+", "-", "*", "/", "&&", "||", "?", ":"]
            .iter()
            .any(|p| next.starts_with(p))
    });
    !open_ended && !continued
}

impl SwiftScanner {
    fn rules(&self) -> &'static LexicalRules {
        match self.flavor {
            Flavor::Swift => &SWIFT_RULES,
            Flavor::MonkeyC => &MONKEY_C_RULES,
        }
    }

    fn swift_line(&self, line: &CodeLine<'_>, source: &str, braces: &BraceStack, sink: &mut DiagnosticSink) {
        let code = line.trimmed();
        let n = line.number;
        if line.is_plain() && code.ends_with(';') {
            sink.info("Unnecessary Semicolon", "Swift statements do not need ';'", n);
        }
        if let Some(caps) = SWIFT_PRINT.captures(code) {
            sink.info(
                "Debug Statement",
                format!("Debug output '{}' left in code", &caps[1]),
                n,
            );
        }
        if let Some(caps) = SWIFT_BINDING.captures(code) {
            let name = &caps[1];
            if inside_function(braces, "func")
                && !name.starts_with('_')
                && count_word(source, name, is_word_char) == 1
            {
                sink.info(
                    "Unused Variable",
                    format!("Variable '{}' is never used", name),
                    n,
                );
            }
        }
    }

    fn monkey_line(
        &self,
        lines: &[CodeLine<'_>],
        idx: usize,
        source: &str,
        braces: &BraceStack,
        plain_statement: bool,
        sink: &mut DiagnosticSink,
    ) {
        let line = &lines[idx];
        let code = line.trimmed();
        let n = line.number;
        if plain_statement && monkey_needs_semicolon(lines, idx) {
            sink.warning("Missing Semicolon", "Missing semicolon after statement", n);
        }
        if MONKEY_PRINT.is_match(code) {
            sink.info("Debug Statement", "Debug output 'System.println' left in code", n);
        }
        if let Some(caps) = MONKEY_VAR.captures(code) {
            let name = &caps[1];
            if inside_function(braces, "function") && count_word(source, name, is_word_char) == 1 {
                sink.info(
                    "Unused Variable",
                    format!("Variable '{}' is never used", name),
                    n,
                );
            }
        }
    }

    fn swift_semantics(&self, lines: &[CodeLine<'_>], source: &str, sink: &mut DiagnosticSink) {
        let mut previous: Option<&str> = None;
        for line in lines {
            let code = line.trimmed();
            if code.is_empty() {
                continue;
            }
            let n = line.number;
            if IMPLICIT_UNWRAP.is_match(code) {
                sink.warning(
                    "Implicitly Unwrapped Optional",
                    "Implicitly unwrapped optional crashes when accessed as nil",
                    n,
                );
            }
            let rest = IMPLICIT_UNWRAP.replace_all(code, "");
            if rest.contains("try!") {
                sink.warning("Force Unwrap", "'try!' crashes when the call throws", n);
            } else if rest.contains("as!") {
                sink.warning("Force Unwrap", "'as!' crashes when the cast fails", n);
            } else if FORCE_UNWRAP.is_match(&rest) {
                sink.warning("Force Unwrap", "Force unwrap crashes when the value is nil", n);
            }
            if OPTIONAL_CHAIN.is_match(code) {
                sink.info("Optional Chaining", "Optional chaining may silently yield nil", n);
            }
            if let Some(caps) = PRIVATE_FUNC.captures(code) {
                let name = &caps[1];
                let bridged = ["override", "@objc", "@IBAction"]
                    .iter()
                    .any(|m| code.contains(m) || previous.is_some_and(|p| p.starts_with(m)));
                if !bridged && count_word(source, name, is_word_char) == 1 {
                    sink.info(
                        "Unused Function",
                        format!("Private function '{}' is never called", name),
                        n,
                    );
                }
            }
            previous = Some(code);
        }
    }

    fn monkey_semantics(&self, lines: &[CodeLine<'_>], source: &str, sink: &mut DiagnosticSink) {
        let code = code_text(lines);
        let mut imported: HashSet<String> = HashSet::new();

        for line in lines {
            let Some(caps) = USING.captures(line.trimmed()) else {
                continue;
            };
            let path = &caps[1];
            let alias = caps
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or_else(|| path.rsplit('.').next().unwrap_or(path));
            if let Some(module) = path.strip_prefix("Toybox.") {
                imported.insert(module.to_string());
            }
            imported.insert(alias.to_string());
            if count_word(&code, alias, is_word_char) == 1 {
                sink.info(
                    "Unused Import",
                    format!("'{}' is imported but never used", path),
                    line.number,
                );
            }
        }

        let mut reported: HashSet<&str> = HashSet::new();
        for line in lines {
            let trimmed = line.trimmed();
            if USING.is_match(trimmed) {
                continue;
            }
            for caps in TOYBOX_MODULE.captures_iter(trimmed) {
                let Some(module) = caps.get(1) else { continue };
                let qualified = trimmed[..module.start()].ends_with("Toybox.");
                let name = module.as_str();
                if qualified || imported.contains(name) || reported.contains(name) {
                    continue;
                }
                sink.warning(
                    "Missing Import",
                    format!("Module '{}' is used without 'using Toybox.{}'", name, name),
                    line.number,
                );
                reported.insert(name);
            }
        }

        for line in lines {
            let Some(caps) = MONKEY_FUNCTION.captures(line.trimmed()) else {
                continue;
            };
            let name = &caps[1];
            if !MONKEY_LIFECYCLE.contains(&name) && count_word(source, name, is_word_char) == 1 {
                sink.info(
                    "Unused Function",
                    format!("Function '{}' is never called", name),
                    line.number,
                );
            }
        }
    }
}

impl LanguageScanner for SwiftScanner {
    fn language(&self) -> LanguageId {
        match self.flavor {
            Flavor::Swift => LanguageId::Swift,
            Flavor::MonkeyC => LanguageId::MonkeyC,
        }
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, self.rules());
        let mut tracker = BracketTracker::standard();
        let mut braces = BraceStack::new("=(,");

        for (idx, line) in lines.iter().enumerate() {
            let parens_before = tracker.open_count(&['(', '[']);
            report_open_string(line, sink);
            tracker.feed(&line.code, line.number, sink);
            if line.trimmed().is_empty() {
                braces.feed(&line.code, line.number);
                continue;
            }
            match self.flavor {
                Flavor::Swift => self.swift_line(line, source, &braces, sink),
                Flavor::MonkeyC => {
                    let plain = line.is_plain()
                        && parens_before == 0
                        && tracker.open_count(&['(', '[']) == 0;
                    self.monkey_line(&lines, idx, source, &braces, plain, sink)
                }
            }
            braces.feed(&line.code, line.number);
        }

        tracker.finish(sink);
        report_unterminated(&lines, sink);
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, self.rules());
        match self.flavor {
            Flavor::Swift => self.swift_semantics(&lines, source, sink),
            Flavor::MonkeyC => self.monkey_semantics(&lines, source, sink),
        }
        unreachable_after_return(&lines, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnostic;

    fn swift(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::Swift)
    }

    fn monkey(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::MonkeyC)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    #[test]
    fn test_clean_swift_source() {
        let src = "import Foundation\n\nstruct User {\n    let name: String\n    var age: Int\n}\n\nfunc greet(_ user: User) -> String {\n    let message = \"Hi \\(user.name)\"\n    return message\n}\n";
        let diags = swift(src);
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_swift_line_smells() {
        let src = "func run(items: [String]?) {\n    let first = items!.first;\n    let data = try! load()\n    let view = thing as! UIView\n    print(first, data, view)\n    let total = items?.count\n}\n";
        let diags = swift(src);
        assert!(has(&diags, "Unnecessary Semicolon", 2));
        assert!(has(&diags, "Force Unwrap", 2));
        assert!(has(&diags, "Force Unwrap", 3));
        assert!(has(&diags, "Force Unwrap", 4));
        assert!(has(&diags, "Debug Statement", 5));
        assert!(has(&diags, "Optional Chaining", 6));
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Variable" && d.message.contains("'total'") && d.line == Some(6)));
    }

    #[test]
    fn test_implicitly_unwrapped_property() {
        let diags = swift("class VC {\n    var label: UILabel!\n}\n");
        assert!(has(&diags, "Implicitly Unwrapped Optional", 2));
        assert!(!has(&diags, "Force Unwrap", 2));
        assert!(!diags.iter().any(|d| d.kind == "Unused Variable"));
    }

    #[test]
    fn test_swift_unused_private_and_unreachable() {
        let src = "class A {\n    private func unused() {}\n    private func used() {}\n    override func viewDidLoad() {\n        used()\n        return\n        print(\"x\")\n    }\n}\n";
        let diags = swift(src);
        let unused: Vec<_> = diags.iter().filter(|d| d.kind == "Unused Function").collect();
        assert_eq!(unused.len(), 1, "{:?}", unused);
        assert_eq!(unused[0].line, Some(2));
        assert!(has(&diags, "Unreachable Code", 7));
    }

    #[test]
    fn test_clean_monkey_c_source() {
        let src = "using Toybox.WatchUi;\nusing Toybox.System as Sys;\n\nclass MyView extends WatchUi.View {\n    function initialize() {\n        View.initialize();\n        var clock = Sys.getClockTime();\n        draw(clock);\n    }\n}\n";
        let diags = monkey(src);
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_monkey_c_semicolons_and_debug() {
        let src = "function compute() {\n    var x = 1\n    if (x > 0) {\n        x = 2;\n    }\n    System.println(x);\n    return x\n}\n";
        let diags = monkey(src);
        let missing: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == "Missing Semicolon")
            .filter_map(|d| d.line)
            .collect();
        assert_eq!(missing, vec![2, 7]);
        assert!(has(&diags, "Debug Statement", 6));
    }

    #[test]
    fn test_monkey_c_imports_and_functions() {
        let src = "using Toybox.Math;\n\nfunction helper() {\n    var t = Graphics.COLOR_RED;\n    return t;\n}\n";
        let diags = monkey(src);
        assert!(has(&diags, "Unused Import", 1));
        assert!(has(&diags, "Missing Import", 4));
        assert!(diags
            .iter()
            .any(|d| d.kind == "Unused Function" && d.message.contains("'helper'") && d.line == Some(3)));
    }
}
