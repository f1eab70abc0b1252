//! Supported language identifiers.

use crate::error::LintError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
/// Closed set of languages with a registered scanner.
pub enum LanguageId {
    #[serde(rename = "assembly")]
    Assembly,
    #[serde(rename = "bash")]
    Bash,
    #[serde(rename = "c-family")]
    CFamily,
    #[serde(rename = "css")]
    Css,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "monkeyc")]
    MonkeyC,
    #[serde(rename = "php")]
    Php,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "rust")]
    Rust,
    #[serde(rename = "sql")]
    Sql,
    #[serde(rename = "swift")]
    Swift,
    #[serde(rename = "typescript")]
    TypeScript,
    #[serde(rename = "xml")]
    Xml,
}

impl LanguageId {
    pub const ALL: [LanguageId; 14] = [
        LanguageId::Assembly,
        LanguageId::Bash,
        LanguageId::CFamily,
        LanguageId::Css,
        LanguageId::Html,
        LanguageId::JavaScript,
        LanguageId::MonkeyC,
        LanguageId::Php,
        LanguageId::Python,
        LanguageId::Rust,
        LanguageId::Sql,
        LanguageId::Swift,
        LanguageId::TypeScript,
        LanguageId::Xml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::Assembly => "assembly",
            LanguageId::Bash => "bash",
            LanguageId::CFamily => "c-family",
            LanguageId::Css => "css",
            LanguageId::Html => "html",
            LanguageId::JavaScript => "javascript",
            LanguageId::MonkeyC => "monkeyc",
            LanguageId::Php => "php",
            LanguageId::Python => "python",
            LanguageId::Rust => "rust",
            LanguageId::Sql => "sql",
            LanguageId::Swift => "swift",
            LanguageId::TypeScript => "typescript",
            LanguageId::Xml => "xml",
        }
    }

    /// File extensions (without the dot) mapped to this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            LanguageId::Assembly => &["asm", "s", "nasm"],
            LanguageId::Bash => &["sh", "bash", "zsh"],
            LanguageId::CFamily => &["c", "h", "cc", "cpp", "cxx", "hpp", "hh", "hxx"],
            LanguageId::Css => &["css"],
            LanguageId::Html => &["html", "htm"],
            LanguageId::JavaScript => &["js", "jsx", "mjs", "cjs"],
            LanguageId::MonkeyC => &["mc"],
            LanguageId::Php => &["php", "phtml"],
            LanguageId::Python => &["py", "pyw"],
            LanguageId::Rust => &["rs"],
            LanguageId::Sql => &["sql"],
            LanguageId::Swift => &["swift"],
            LanguageId::TypeScript => &["ts", "tsx", "mts", "cts"],
            LanguageId::Xml => &["xml", "xsd", "xsl", "svg", "plist"],
        }
    }

    /// Detect the language from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<LanguageId> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        LanguageId::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageId {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        let lang = match id.as_str() {
            "assembly" | "asm" | "nasm" => LanguageId::Assembly,
            "bash" | "sh" | "shell" | "zsh" => LanguageId::Bash,
            "c-family" | "c" | "cpp" | "c++" | "h" | "cfamily" => LanguageId::CFamily,
            "css" => LanguageId::Css,
            "html" | "htm" => LanguageId::Html,
            "javascript" | "js" | "jsx" | "mjs" => LanguageId::JavaScript,
            "monkeyc" | "monkey-c" | "mc" => LanguageId::MonkeyC,
            "php" => LanguageId::Php,
            "python" | "py" => LanguageId::Python,
            "rust" | "rs" => LanguageId::Rust,
            "sql" => LanguageId::Sql,
            "swift" => LanguageId::Swift,
            "typescript" | "ts" | "tsx" => LanguageId::TypeScript,
            "xml" => LanguageId::Xml,
            _ => {
                return Err(LintError::UnsupportedLanguage {
                    id: s.trim().to_string(),
                })
            }
        };
        Ok(lang)
    }
}
