//! Line-oriented lexical scanning shared by the language scanners.
//!
//! Each language describes its comment and string syntax with a
//! `LexicalRules` constant. `ScanState` is a small `Copy` value recording
//! which region (code, string, block comment) the scan is in at a line
//! boundary; `ScanState::advance` consumes one line and returns the next
//! state together with a `CodeLine` whose `code` has comments removed and
//! string/regex bodies blanked out. `scan_lines` folds that step over a
//! whole text.
//!
//! Bracket balance (`BracketTracker`) and brace classification
//! (`BraceStack`) work on `CodeLine::code`, so brackets inside strings and
//! comments never count.

use crate::engine::DiagnosticSink;

/// A string delimiter. The closing delimiter equals the opening one.
#[derive(Debug, Clone, Copy)]
pub struct StringDelim {
    pub delim: &'static str,
    /// Whether the literal may continue onto the next line.
    pub multiline: bool,
}

impl StringDelim {
    pub const fn single(delim: &'static str) -> Self {
        Self {
            delim,
            multiline: false,
        }
    }

    pub const fn multi(delim: &'static str) -> Self {
        Self {
            delim,
            multiline: true,
        }
    }
}

/// Comment and literal syntax of one language.
#[derive(Debug, Clone, Copy)]
pub struct LexicalRules {
    pub line_comments: &'static [&'static str],
    /// `(open, close)` pairs. Block comments may span lines.
    pub block_comments: &'static [(&'static str, &'static str)],
    /// Checked in order, so list longer delimiters (`"""`) first.
    pub strings: &'static [StringDelim],
    /// Backslash escapes the next character inside strings.
    pub escapes: bool,
    /// `/.../` regex literals in expression position (JavaScript family).
    pub regex_literals: bool,
    /// `'x'` is a char literal, any other `'` is a lifetime or label.
    pub char_literals: bool,
    /// A line comment only starts at line start or after whitespace (`#` in shells).
    pub comment_needs_blank: bool,
}

impl LexicalRules {
    pub const EMPTY: LexicalRules = LexicalRules {
        line_comments: &[],
        block_comments: &[],
        strings: &[],
        escapes: false,
        regex_literals: false,
        char_literals: false,
        comment_needs_blank: false,
    };

    fn is_multiline(&self, delim: &str) -> bool {
        self.strings
            .iter()
            .any(|s| s.delim == delim && s.multiline)
    }
}

/// Lexical region at a given scan position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Code,
    /// Inside a string opened by the given delimiter.
    Str(&'static str),
    /// Inside a block comment closed by the given delimiter.
    Comment(&'static str),
    /// Inside a regex literal. Never survives a line boundary.
    Regex,
}

/// State carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    pub region: Region,
    /// Line on which the current non-code region was opened.
    pub region_line: usize,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            region: Region::Code,
            region_line: 1,
        }
    }
}

/// One source line after lexical scanning.
#[derive(Debug, Clone)]
pub struct CodeLine<'a> {
    /// 1-based line number.
    pub number: usize,
    pub raw: &'a str,
    /// Raw line with comments removed and literal bodies replaced by spaces.
    pub code: String,
    pub starts_in: Region,
    pub ends_in: Region,
    /// A single-line string was still open at the end of this line.
    pub unterminated_string: bool,
    /// Line on which `ends_in` was opened, when it is not `Code`.
    pub region_line: usize,
}

impl CodeLine<'_> {
    /// Whether the line both starts and ends in code.
    pub fn is_plain(&self) -> bool {
        self.starts_in == Region::Code && self.ends_in == Region::Code
    }

    /// Code with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.code.trim()
    }

    /// Leading whitespace of the raw line.
    pub fn indent(&self) -> &str {
        let trimmed = self.raw.trim_start();
        &self.raw[..self.raw.len() - trimmed.len()]
    }
}

fn starts_with_at(chars: &[char], i: usize, pat: &str) -> bool {
    let mut k = i;
    for pc in pat.chars() {
        if k >= chars.len() || chars[k] != pc {
            return false;
        }
        k += 1;
    }
    true
}

/// A `/` starts a regex when the previous code token cannot end an operand.
fn regex_allowed(out: &str) -> bool {
    let before = out.trim_end();
    match before.chars().last() {
        None => true,
        // `</` closes a JSX element rather than starting a regex
        Some(c) if "(,=:[!&|?{};+-*%>~^".contains(c) => true,
        Some(_) => ["return", "typeof", "case", "yield", "in", "of"]
            .iter()
            .any(|kw| {
                before.ends_with(kw)
                    && !before[..before.len() - kw.len()]
                        .chars()
                        .last()
                        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
            }),
    }
}

/// Length (in chars) of a char literal starting at `i`, if there is one.
fn char_literal_len(chars: &[char], i: usize) -> Option<usize> {
    match chars.get(i + 1) {
        Some('\\') => (i + 3..chars.len().min(i + 12))
            .find(|k| chars[*k] == '\'')
            .map(|k| k - i + 1),
        Some(_) if chars.get(i + 2) == Some(&'\'') => Some(3),
        _ => None,
    }
}

impl ScanState {
    /// Consume one line and return the state at the start of the next one.
    pub fn advance<'a>(
        self,
        number: usize,
        raw: &'a str,
        rules: &LexicalRules,
    ) -> (ScanState, CodeLine<'a>) {
        let chars: Vec<char> = raw.chars().collect();
        let mut code = String::with_capacity(raw.len());
        let mut region = self.region;
        let mut region_line = self.region_line;
        let mut in_class = false;
        let mut i = 0;

        'chars: while i < chars.len() {
            let c = chars[i];
            match region {
                Region::Comment(close) => {
                    if starts_with_at(&chars, i, close) {
                        i += close.chars().count();
                        region = Region::Code;
                        code.push(' ');
                    } else {
                        i += 1;
                    }
                }
                Region::Str(delim) => {
                    if rules.escapes && c == '\\' {
                        code.push(' ');
                        if i + 1 < chars.len() {
                            code.push(' ');
                        }
                        i += 2;
                    } else if starts_with_at(&chars, i, delim) {
                        code.push_str(delim);
                        i += delim.chars().count();
                        region = Region::Code;
                    } else {
                        code.push(' ');
                        i += 1;
                    }
                }
                Region::Regex => {
                    if c == '\\' {
                        code.push(' ');
                        if i + 1 < chars.len() {
                            code.push(' ');
                        }
                        i += 2;
                        continue;
                    }
                    match c {
                        '[' => in_class = true,
                        ']' => in_class = false,
                        '/' if !in_class => {
                            code.push('/');
                            region = Region::Code;
                            i += 1;
                            continue;
                        }
                        _ => {}
                    }
                    code.push(' ');
                    i += 1;
                }
                Region::Code => {
                    for lc in rules.line_comments {
                        if starts_with_at(&chars, i, lc)
                            && (!rules.comment_needs_blank || i == 0 || chars[i - 1].is_whitespace())
                        {
                            break 'chars;
                        }
                    }
                    for (open, close) in rules.block_comments {
                        if starts_with_at(&chars, i, open) {
                            region = Region::Comment(close);
                            region_line = number;
                            i += open.chars().count();
                            code.push(' ');
                            continue 'chars;
                        }
                    }
                    for s in rules.strings {
                        if starts_with_at(&chars, i, s.delim) {
                            code.push_str(s.delim);
                            region = Region::Str(s.delim);
                            region_line = number;
                            i += s.delim.chars().count();
                            continue 'chars;
                        }
                    }
                    if rules.char_literals && c == '\'' {
                        if let Some(len) = char_literal_len(&chars, i) {
                            code.push('\'');
                            code.extend(std::iter::repeat(' ').take(len - 2));
                            code.push('\'');
                            i += len;
                            continue;
                        }
                    }
                    if rules.regex_literals
                        && c == '/'
                        && chars.get(i + 1) != Some(&'/')
                        && chars.get(i + 1) != Some(&'*')
                        && regex_allowed(&code)
                    {
                        code.push('/');
                        region = Region::Regex;
                        in_class = false;
                        i += 1;
                        continue;
                    }
                    code.push(c);
                    i += 1;
                }
            }
        }

        let mut unterminated_string = false;
        match region {
            Region::Str(delim) if !rules.is_multiline(delim) => {
                unterminated_string = true;
                region = Region::Code;
            }
            Region::Regex => region = Region::Code,
            _ => {}
        }

        let line = CodeLine {
            number,
            raw,
            code,
            starts_in: self.region,
            ends_in: region,
            unterminated_string,
            region_line,
        };
        (
            ScanState {
                region,
                region_line,
            },
            line,
        )
    }
}

/// Scan every line of `text`, threading `ScanState` from line to line.
pub fn scan_lines<'a>(text: &'a str, rules: &LexicalRules) -> Vec<CodeLine<'a>> {
    text.lines()
        .enumerate()
        .scan(ScanState::default(), |state, (idx, raw)| {
            let (next, line) = state.advance(idx + 1, raw, rules);
            *state = next;
            Some(line)
        })
        .collect()
}

/// Join the code of scanned lines back into one text with the same line
/// structure, for whole-text regex passes that must ignore comments.
pub fn code_text(lines: &[CodeLine<'_>]) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&line.code);
    }
    out
}

/// Report a block comment or multi-line string left open at end of input.
pub fn report_unterminated(lines: &[CodeLine<'_>], sink: &mut DiagnosticSink) {
    let Some(last) = lines.last() else {
        return;
    };
    match last.ends_in {
        Region::Comment(_) => sink.error(
            "Syntax Error",
            "Unterminated block comment",
            last.region_line,
        ),
        Region::Str(delim) => sink.error(
            "Syntax Error",
            format!("Unterminated string literal opened with {}", delim),
            last.region_line,
        ),
        _ => {}
    }
}

/// Report a single-line string left open at the end of `line`.
///
/// Called from the per-line loop so the error keeps its place in line order.
pub fn report_open_string(line: &CodeLine<'_>, sink: &mut DiagnosticSink) {
    if line.unterminated_string {
        sink.error("Syntax Error", "Unterminated string literal", line.number);
    }
}

/// Bracket balance checker using parallel opener/closer arrays.
#[derive(Debug)]
pub struct BracketTracker {
    openers: &'static [char],
    closers: &'static [char],
    stack: Vec<(char, usize)>,
}

impl BracketTracker {
    pub const ALL_OPENERS: &'static [char] = &['(', '[', '{'];
    pub const ALL_CLOSERS: &'static [char] = &[')', ']', '}'];

    pub fn new(openers: &'static [char], closers: &'static [char]) -> Self {
        debug_assert_eq!(openers.len(), closers.len());
        Self {
            openers,
            closers,
            stack: Vec::new(),
        }
    }

    /// Tracker for `()`, `[]` and `{}`.
    pub fn standard() -> Self {
        Self::new(Self::ALL_OPENERS, Self::ALL_CLOSERS)
    }

    /// Feed one line of code.
    pub fn feed(&mut self, code: &str, line: usize, sink: &mut DiagnosticSink) {
        for c in code.chars() {
            if self.openers.contains(&c) {
                self.stack.push((c, line));
            } else if let Some(ci) = self.closers.iter().position(|k| *k == c) {
                match self.stack.pop() {
                    Some((open, open_line)) => {
                        let expected = self.openers[ci];
                        if open != expected {
                            sink.error(
                                "Syntax Error",
                                format!(
                                    "Mismatched '{}' closed by '{}' on line {}",
                                    open, c, line
                                ),
                                open_line,
                            );
                        }
                    }
                    None => sink.error(
                        "Syntax Error",
                        format!("Unexpected closing '{}'", c),
                        line,
                    ),
                }
            }
        }
    }

    /// Total number of open brackets.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of open brackets of the given opener kinds.
    pub fn open_count(&self, kinds: &[char]) -> usize {
        self.stack.iter().filter(|(c, _)| kinds.contains(c)).count()
    }

    /// Report every opener left on the stack.
    pub fn finish(self, sink: &mut DiagnosticSink) {
        for (c, line) in self.stack {
            sink.error(
                "Syntax Error",
                format!("Unmatched opening '{}'", c),
                line,
            );
        }
    }
}

/// An open `{` with the code that preceded it on its line.
#[derive(Debug, Clone)]
pub struct BraceFrame {
    pub line: usize,
    /// Object literal or initializer rather than a statement block.
    pub literal: bool,
    /// Trimmed code before the brace on its line.
    pub head: String,
}

impl BraceFrame {
    /// Whether the block belongs to a conditional or loop statement.
    pub fn is_conditional(&self) -> bool {
        let head = self.head.trim_start_matches('}').trim_start();
        ["if", "else", "for", "while", "switch", "do", "case", "catch"]
            .iter()
            .any(|kw| {
                head.strip_prefix(kw)
                    .is_some_and(|rest| rest.is_empty() || !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
            })
    }
}

/// Stack of open braces classified as literal or block.
#[derive(Debug, Default)]
pub struct BraceStack {
    literal_after: &'static str,
    frames: Vec<BraceFrame>,
}

impl BraceStack {
    /// `literal_after` lists the characters that, directly before a `{`,
    /// make it an object literal or initializer.
    pub fn new(literal_after: &'static str) -> Self {
        Self {
            literal_after,
            frames: Vec::new(),
        }
    }

    pub fn feed(&mut self, code: &str, line: usize) {
        for (i, c) in code.char_indices() {
            match c {
                '{' => {
                    let head = code[..i].trim();
                    let literal = match head.chars().last() {
                        Some(p) => self.literal_after.contains(p) || head.ends_with("return"),
                        None => self
                            .frames
                            .last()
                            .is_some_and(|f| f.literal),
                    };
                    self.frames.push(BraceFrame {
                        line,
                        literal,
                        head: head.to_string(),
                    });
                }
                '}' => {
                    self.frames.pop();
                }
                _ => {}
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&BraceFrame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[BraceFrame] {
        &self.frames
    }

    /// Whether the innermost open brace is a literal.
    pub fn in_literal(&self) -> bool {
        self.top().is_some_and(|f| f.literal)
    }
}

/// Last character of the trimmed code, if any.
pub fn last_char(code: &str) -> Option<char> {
    code.trim_end().chars().last()
}

/// Index of the next line after `idx` whose code is not blank.
pub fn next_code_line(lines: &[CodeLine<'_>], idx: usize) -> Option<usize> {
    (idx + 1..lines.len()).find(|k| !lines[*k].trimmed().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_LIKE: LexicalRules = LexicalRules {
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

    #[test]
    fn test_strips_line_comment_and_blanks_strings() {
        let lines = scan_lines("let s = \"a{b\"; // {", &C_LIKE);
        assert_eq!(lines[0].code, "let s = \"   \"; ");
    }

    #[test]
    fn test_escaped_quote_does_not_close_string() {
        let lines = scan_lines(r#"x = "a\"{"; y"#, &C_LIKE);
        assert!(!lines[0].code.contains('{'));
        assert!(lines[0].code.ends_with("; y"));
    }

    #[test]
    fn test_block_comment_carries_across_lines() {
        let lines = scan_lines("a /* {\n still } \n */ b", &C_LIKE);
        assert_eq!(lines[1].starts_in, Region::Comment("*/"));
        assert!(!lines[1].code.contains('}'));
        assert_eq!(lines[2].trimmed(), "b");
    }

    #[test]
    fn test_template_literal_spans_lines() {
        let lines = scan_lines("const t = `a\n{b\n`;", &C_LIKE);
        assert_eq!(lines[0].ends_in, Region::Str("`"));
        assert!(!lines[1].code.contains('{'));
        assert_eq!(lines[2].ends_in, Region::Code);
    }

    #[test]
    fn test_regex_literal_hides_brackets() {
        let lines = scan_lines("const r = /[(]+/g;", &C_LIKE);
        assert!(!lines[0].code.contains('('));
        let lines = scan_lines("const half = a / b / (c);", &C_LIKE);
        assert!(lines[0].code.contains("(c)"));
    }

    #[test]
    fn test_unterminated_single_line_string_flagged() {
        let lines = scan_lines("let s = \"oops\nnext();", &C_LIKE);
        assert!(lines[0].unterminated_string);
        assert_eq!(lines[1].starts_in, Region::Code);
    }

    #[test]
    fn test_char_literal_vs_lifetime() {
        const STRINGS: &[StringDelim] = &[StringDelim::multi("\"")];
        let rules = LexicalRules {
            strings: STRINGS,
            char_literals: true,
            ..LexicalRules::EMPTY
        };
        let lines = scan_lines("fn f<'a>(x: &'a str) -> char { '{' }", &rules);
        assert_eq!(lines[0].code.matches('{').count(), 1);
        assert!(lines[0].code.contains("<'a>"));
    }

    #[test]
    fn test_comment_needs_blank() {
        let rules = LexicalRules {
            line_comments: &["#"],
            comment_needs_blank: true,
            ..LexicalRules::EMPTY
        };
        let lines = scan_lines("echo ${#arr[@]} # note {", &rules);
        assert!(lines[0].code.contains("${#arr[@]}"));
        assert!(!lines[0].code.contains("note"));
    }

    #[test]
    fn test_bracket_tracker_mismatch_reported_at_opener() {
        let mut sink = DiagnosticSink::new();
        let mut t = BracketTracker::standard();
        t.feed("foo(", 1, &mut sink);
        t.feed("]", 2, &mut sink);
        t.finish(&mut sink);
        let d = sink.into_diagnostics();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].line, Some(1));
        assert!(d[0].message.contains("'('") && d[0].message.contains("']'"));
    }

    #[test]
    fn test_bracket_tracker_balanced_is_silent() {
        let mut sink = DiagnosticSink::new();
        let mut t = BracketTracker::standard();
        for n in 1..=5 {
            t.feed("{([", n, &mut sink);
        }
        for n in 6..=10 {
            t.feed("])}", n, &mut sink);
        }
        assert_eq!(t.depth(), 0);
        t.finish(&mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_brace_stack_classifies_literals() {
        let mut braces = BraceStack::new("=(,:[?");
        braces.feed("const o = {", 1);
        assert!(braces.in_literal());
        braces.feed("};", 2);
        braces.feed("if (x) {", 3);
        assert!(!braces.in_literal());
        assert!(braces.top().unwrap().is_conditional());
    }
}
