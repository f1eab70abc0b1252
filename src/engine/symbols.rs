//! Textual symbol usage counting.
//!
//! "Declared but never used" findings are a textual heuristic: a name whose
//! whole-word occurrence count over the entire source is exactly one (the
//! declaration itself) is reported. There is no scope resolution, so a name
//! reused anywhere else in the file suppresses the finding.

use regex::{Regex, RegexBuilder};

/// Identifier characters for C-like languages.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Identifier characters for JavaScript-like languages (`$` included).
pub fn is_js_word_char(c: char) -> bool {
    is_word_char(c) || c == '$'
}

fn occurrences(text: &str, needle: &Regex, word_char: fn(char) -> bool) -> usize {
    needle
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            let first_is_word = m.as_str().chars().next().is_some_and(word_char);
            let last_is_word = m.as_str().chars().next_back().is_some_and(word_char);
            !(first_is_word && before.is_some_and(word_char))
                && !(last_is_word && after.is_some_and(word_char))
        })
        .count()
}

/// Count whole-word occurrences of `name` in `text`.
pub fn count_word(text: &str, name: &str, word_char: fn(char) -> bool) -> usize {
    match Regex::new(&regex::escape(name)) {
        Ok(re) => occurrences(text, &re, word_char),
        Err(_) => 0,
    }
}

/// Case-insensitive variant of [`count_word`] (SQL identifiers).
pub fn count_word_ci(text: &str, name: &str, word_char: fn(char) -> bool) -> usize {
    match RegexBuilder::new(&regex::escape(name))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => occurrences(text, &re, word_char),
        Err(_) => 0,
    }
}

/// Declared names with the line each was declared on, in declaration order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<(String, Option<usize>)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration. Repeated names keep their first line.
    pub fn declare(&mut self, name: impl Into<String>, line: Option<usize>) {
        let name = name.into();
        if !self.entries.iter().any(|(n, _)| *n == name) {
            self.entries.push((name, line));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declarations whose name occurs exactly once in `text`.
    pub fn unused<'t>(
        &'t self,
        text: &'t str,
        word_char: fn(char) -> bool,
    ) -> impl Iterator<Item = (&'t str, Option<usize>)> + 't {
        self.entries
            .iter()
            .filter(move |(name, _)| count_word(text, name, word_char) == 1)
            .map(|(name, line)| (name.as_str(), *line))
    }
}
