//! x86 assembly in NASM syntax.

use std::collections::{HashMap, HashSet};

use crate::engine::scan::{
    code_text, report_open_string, scan_lines, BracketTracker, CodeLine, LexicalRules,
    StringDelim,
};
use crate::engine::symbols::{count_word, is_word_char};
use crate::engine::{DiagnosticSink, LanguageScanner};
use crate::language::LanguageId;
use crate::models::Severity;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

const RULES: LexicalRules = LexicalRules {
    line_comments: &[";"],
    strings: &[StringDelim::single("\""), StringDelim::single("'")],
    ..LexicalRules::EMPTY
};

static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z_.$?@][\w.$?@]*):").expect("valid regex"));
static SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_.$?@][\w.$?@]*$").expect("valid regex"));
static REGISTER: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r"^(?:[re]?[abcd]x|[abcd][lh]|[re]?(?:si|di|sp|bp|ip)|(?:si|di|sp|bp)l|r(?:[89]|1[0-5])[dwb]?|[c-gs]s)$",
    )
    .case_insensitive(true)
    .build()
    .expect("valid regex")
});

const DATA_DIRECTIVES: &[&str] = &[
    "db", "dw", "dd", "dq", "dt", "resb", "resw", "resd", "resq", "equ", "times",
];
const DIRECTIVES: &[&str] = &[
    "section", "segment", "global", "extern", "bits", "default", "org", "align", "cpu",
];
const PREFIXES: &[&str] = &["rep", "repe", "repz", "repne", "repnz", "lock"];

const TWO_OPERANDS: &[&str] = &[
    "mov", "add", "sub", "cmp", "and", "or", "xor", "lea", "test", "adc", "sbb", "xchg", "movzx",
    "movsx",
];
const ONE_OPERAND: &[&str] = &[
    "push", "pop", "inc", "dec", "not", "neg", "call", "mul", "div", "int", "loop",
];
const NO_OPERANDS: &[&str] = &[
    "nop", "hlt", "cld", "std", "cli", "sti", "leave", "syscall", "pushad", "popad", "pusha",
    "popa", "cdq", "cqo", "cbw", "cwde",
];

const ENTRY_POINTS: &[&str] = &["_start", "main", "start"];

#[derive(Debug)]
enum Body<'a> {
    Empty,
    Directive { name: String, args: &'a str },
    Data,
    Instruction { mnemonic: String, operands: Vec<&'a str> },
}

/// One source line split into its optional label and what follows it.
#[derive(Debug)]
struct Statement<'a> {
    line: usize,
    label: Option<&'a str>,
    body: Body<'a>,
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], &text[at..]),
        None => (text, ""),
    }
}

/// Split operands on top-level commas.
fn split_operands(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth <= 0 => {
                out.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(text[start..].trim());
    out.retain(|op| !op.is_empty());
    out
}

fn parse<'a>(line: &'a CodeLine<'_>) -> Statement<'a> {
    let mut rest = line.code.as_str();
    let mut label = None;
    if let Some(caps) = LABEL.captures(rest) {
        label = caps.get(1).map(|m| m.as_str());
        rest = &rest[caps.get(0).map_or(0, |m| m.end())..];
    }

    let (mut first, mut after) = split_word(rest);
    let statement = |label, body| Statement {
        line: line.number,
        label,
        body,
    };
    if first.is_empty() {
        return statement(label, Body::Empty);
    }
    let lower = first.to_ascii_lowercase();
    if label.is_none() {
        let second = split_word(after).0.to_ascii_lowercase();
        if DATA_DIRECTIVES.contains(&second.as_str()) {
            return statement(Some(first), Body::Data);
        }
    }
    if DATA_DIRECTIVES.contains(&lower.as_str()) {
        return statement(label, Body::Data);
    }
    if DIRECTIVES.contains(&lower.as_str()) || lower.starts_with('%') || lower.starts_with('[') {
        let body = Body::Directive {
            name: lower,
            args: after.trim(),
        };
        return statement(label, body);
    }
    while PREFIXES.contains(&first.to_ascii_lowercase().as_str()) && !after.trim().is_empty() {
        (first, after) = split_word(after);
    }
    let body = Body::Instruction {
        mnemonic: first.to_ascii_lowercase(),
        operands: split_operands(after),
    };
    statement(label, body)
}

fn expected_operands(mnemonic: &str) -> Option<usize> {
    if TWO_OPERANDS.contains(&mnemonic) {
        Some(2)
    } else if ONE_OPERAND.contains(&mnemonic) || is_jump(mnemonic) {
        Some(1)
    } else if NO_OPERANDS.contains(&mnemonic) {
        Some(0)
    } else {
        None
    }
}

fn is_jump(mnemonic: &str) -> bool {
    mnemonic.starts_with('j') || mnemonic.starts_with("loop")
}

/// The symbol a jump or call operand names, if it is a plain label.
fn branch_target(operand: &str) -> Option<&str> {
    let target = ["short ", "near ", "far "]
        .iter()
        .find_map(|p| operand.strip_prefix(p))
        .unwrap_or(operand)
        .trim();
    (SYMBOL.is_match(target) && !REGISTER.is_match(target)).then_some(target)
}

/// Labels with their qualified names; `.local` labels belong to the
/// preceding non-local label.
#[derive(Debug, Default)]
struct Labels {
    parent: String,
    defined: HashMap<String, usize>,
}

impl Labels {
    fn qualify(&self, name: &str) -> String {
        if name.starts_with('.') {
            format!("{}{}", self.parent, name)
        } else {
            name.to_string()
        }
    }

    fn define(&mut self, name: &str, line: usize) -> Option<usize> {
        let full = self.qualify(name);
        if !name.starts_with('.') {
            self.parent = name.to_string();
        }
        match self.defined.get(&full) {
            Some(first) => Some(*first),
            None => {
                self.defined.insert(full, line);
                None
            }
        }
    }
}

fn declared_symbols(statements: &[Statement<'_>], directive: &str) -> HashSet<String> {
    statements
        .iter()
        .filter_map(|s| match &s.body {
            Body::Directive { name, args } if name == directive => Some(*args),
            _ => None,
        })
        .flat_map(|args| args.split(','))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

pub struct AssemblyScanner;

impl LanguageScanner for AssemblyScanner {
    fn language(&self) -> LanguageId {
        LanguageId::Assembly
    }

    fn syntax_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let statements: Vec<Statement<'_>> = lines.iter().map(parse).collect();
        let externs = declared_symbols(&statements, "extern");
        let mut tracker = BracketTracker::new(&['[', '('], &[']', ')']);
        let mut labels = Labels::default();
        let mut jumps: Vec<(String, String, usize)> = Vec::new();
        let mut calls: Vec<(String, String, usize)> = Vec::new();

        for (line, statement) in lines.iter().zip(&statements) {
            let n = line.number;
            report_open_string(line, sink);
            tracker.feed(&line.code, n, sink);

            if let Some(label) = statement.label {
                if let Some(first) = labels.define(label, n) {
                    sink.error(
                        "Duplicate Label",
                        format!("Label '{}' is already defined on line {}", label, first),
                        n,
                    );
                }
            }

            let Body::Instruction { mnemonic, operands } = &statement.body else {
                continue;
            };
            if let Some(expected) = expected_operands(mnemonic) {
                if operands.len() != expected {
                    sink.error(
                        "Invalid Operand Count",
                        format!(
                            "'{}' expects {} operand{}, found {}",
                            mnemonic,
                            expected,
                            if expected == 1 { "" } else { "s" },
                            operands.len()
                        ),
                        n,
                    );
                }
            }
            if operands.len() == 2 && operands.iter().all(|op| op.contains('[')) {
                sink.error(
                    "Invalid Operand",
                    format!("'{}' cannot take two memory operands", mnemonic),
                    n,
                );
            }

            let Some(target) = operands.first().and_then(|op| branch_target(op)) else {
                continue;
            };
            let entry = (labels.qualify(target), target.to_string(), n);
            if is_jump(mnemonic) {
                jumps.push(entry);
            } else if mnemonic == "call" {
                calls.push(entry);
            }
        }

        tracker.finish(sink);
        for (full, target, line) in jumps {
            if !labels.defined.contains_key(&full) {
                sink.error(
                    "Undefined Label",
                    format!("Jump target '{}' is not defined", target),
                    line,
                );
            }
        }
        for (full, target, line) in calls {
            if !labels.defined.contains_key(&full) && !externs.contains(&target) {
                sink.warning(
                    "Undeclared Symbol",
                    format!("Call target '{}' is neither defined nor declared extern", target),
                    line,
                );
            }
        }
    }

    fn semantic_check(&self, source: &str, sink: &mut DiagnosticSink) {
        let lines = scan_lines(source, &RULES);
        let code = code_text(&lines);
        let statements: Vec<Statement<'_>> = lines.iter().map(parse).collect();
        let globals = declared_symbols(&statements, "global");

        let mut terminal: Option<&str> = None;
        let mut has_text_section = false;
        let mut has_instructions = false;
        let (mut pushes, mut pops) = (0usize, 0usize);

        for statement in &statements {
            if let Some(label) = statement.label {
                terminal = None;
                let exported = globals.contains(label) || ENTRY_POINTS.contains(&label);
                if !exported && count_word(&code, label, is_word_char) == 1 {
                    sink.info(
                        "Unused Label",
                        format!("Label '{}' is never referenced", label),
                        statement.line,
                    );
                }
            }
            match &statement.body {
                Body::Empty => {}
                Body::Data => terminal = None,
                Body::Directive { name, args } => {
                    terminal = None;
                    let args = args.to_ascii_lowercase();
                    if (name == "section" || name == "segment")
                        && (args.contains("text") || args.contains("code"))
                    {
                        has_text_section = true;
                    }
                }
                Body::Instruction { mnemonic, .. } => {
                    has_instructions = true;
                    if let Some(previous) = terminal.take() {
                        sink.warning(
                            "Unreachable Code",
                            format!("Instruction after '{}' is never executed", previous),
                            statement.line,
                        );
                    }
                    match mnemonic.as_str() {
                        "push" => pushes += 1,
                        "pop" => pops += 1,
                        "ret" | "jmp" | "hlt" => terminal = Some(mnemonic.as_str()),
                        _ => {}
                    }
                }
            }
        }

        if has_instructions && !has_text_section {
            sink.report(
                Severity::Info,
                "Missing Section",
                "No 'section .text' directive before the code",
                None,
            );
        }
        if pushes != pops {
            sink.report(
                Severity::Info,
                "Stack Balance",
                format!("{} push vs {} pop instructions", pushes, pops),
                None,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Diagnostic;

    fn run(src: &str) -> Vec<Diagnostic> {
        crate::engine::lint(src, LanguageId::Assembly)
    }

    fn has(diags: &[Diagnostic], kind: &str, line: usize) -> bool {
        diags.iter().any(|d| d.kind == kind && d.line == Some(line))
    }

    #[test]
    fn test_clean_program() {
        let src = "section .data\n    msg db \"Hello\", 10\n    len equ $ - msg\n\nsection .text\n    global _start\n\n_start:\n    mov rax, 1\n    mov rdi, 1\n    mov rsi, msg\n    mov rdx, len\n    syscall\n    cmp rax, 0\n    jl .done\n    call print\n.done:\n    push rax\n    pop rax\n    mov rax, 60\n    xor rdi, rdi\n    syscall\nprint:\n    ret\n";
        let diags = run(src);
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_operand_and_label_errors() {
        let src = "section .text\nstart:\n    mov rax\n    push\n    nop rax\n    mov [rax], [rbx]\nstart:\n    jmp missing\n    call external_fn\n    mov rax, [rbx\n";
        let diags = run(src);
        assert!(has(&diags, "Invalid Operand Count", 3));
        assert!(has(&diags, "Invalid Operand Count", 4));
        assert!(has(&diags, "Invalid Operand Count", 5));
        assert!(has(&diags, "Invalid Operand", 6));
        assert!(!has(&diags, "Invalid Operand Count", 6));
        assert!(has(&diags, "Duplicate Label", 7));
        assert!(has(&diags, "Undefined Label", 8));
        assert!(has(&diags, "Undeclared Symbol", 9));
        assert!(has(&diags, "Syntax Error", 10));
    }

    #[test]
    fn test_local_labels_are_scoped() {
        let src = "section .text\nfirst:\n.loop:\n    dec rcx\n    jnz .loop\n    ret\nsecond:\n.loop:\n    jmp .loop\n";
        let diags = run(src);
        assert!(!diags.iter().any(|d| d.kind == "Duplicate Label"), "{:?}", diags);
        assert!(!diags.iter().any(|d| d.kind == "Undefined Label"));
    }

    #[test]
    fn test_extern_call_is_declared() {
        let src = "section .text\nextern printf\nglobal main\nmain:\n    call printf\n    ret\n";
        let diags = run(src);
        assert!(!diags.iter().any(|d| d.kind == "Undeclared Symbol"), "{:?}", diags);
    }

    #[test]
    fn test_semantic_findings() {
        let src = "section .text\nglobal entry\nentry:\n    push rbx\n    call helper\n    ret\n    nop\nhelper:\n    ret\nunused_label:\n    hlt\n";
        let diags = run(src);
        assert!(has(&diags, "Unreachable Code", 7));
        assert_eq!(diags.iter().filter(|d| d.kind == "Unreachable Code").count(), 1);
        assert!(has(&diags, "Unused Label", 10));
        assert!(!diags.iter().any(|d| d.kind == "Unused Label" && d.line != Some(10)));
        let balance = diags.iter().find(|d| d.kind == "Stack Balance").expect("balance");
        assert_eq!(balance.line, None);
    }

    #[test]
    fn test_missing_text_section() {
        let diags = run("mov eax, 1\nret\n");
        let missing = diags.iter().find(|d| d.kind == "Missing Section").expect("section");
        assert_eq!(missing.line, None);
    }
}
