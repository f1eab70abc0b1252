//! Output rendering for the lint and languages commands.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-issue fields and a top-level summary.

use crate::language::LanguageId;
use crate::models::{LintResult, Severity};
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn print_json(value: &JsonVal) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("{} {}", crate::utils::error_prefix(), e),
    }
}

/// Print lint results in the requested format. Run failures go to stderr
/// in human mode and into an `errors` array in JSON mode.
pub fn print_lint(res: &LintResult, output: &str, errors: &[String]) {
    match output {
        "json" => {
            let mut out = compose_lint_json(res);
            if !errors.is_empty() {
                out["errors"] = json!(errors);
            }
            print_json(&out);
        }
        _ => {
            let color = use_colors(output);
            for e in errors {
                eprintln!("{} {}", crate::utils::error_prefix(), e);
            }
            for is in &res.issues {
                let d = &is.diagnostic;
                let tag = format!("⟦{}⟧", short_severity(d.severity));
                let (icon, sev) = match (d.severity, color) {
                    (Severity::Error, true) => ("✖".red().to_string(), tag.red().bold().to_string()),
                    (Severity::Warning, true) => {
                        ("▲".yellow().to_string(), tag.yellow().bold().to_string())
                    }
                    (Severity::Info, true) => ("◆".blue().to_string(), tag.blue().bold().to_string()),
                    (Severity::Error, false) => ("✖".to_string(), tag),
                    (Severity::Warning, false) => ("▲".to_string(), tag),
                    (Severity::Info, false) => ("◆".to_string(), tag),
                };
                let location = match d.line {
                    Some(line) => format!("{}:{}", is.file, line),
                    None => is.file.clone(),
                };
                let location = if color {
                    location.bold().to_string()
                } else {
                    location
                };
                println!("{} {} {} ❲{}❳ {}", icon, sev, location, d.kind, d.message);
            }
            let summary = format!(
                "Summary: errors={} warnings={} infos={} files={}",
                res.summary.errors, res.summary.warnings, res.summary.infos, res.summary.files
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

fn short_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warn",
        Severity::Info => "info",
    }
}

/// Print the supported languages with their extensions.
pub fn print_languages(output: &str) {
    match output {
        "json" => print_json(&compose_languages_json()),
        _ => {
            let color = use_colors(output);
            for lang in LanguageId::ALL {
                let exts = lang
                    .extensions()
                    .iter()
                    .map(|e| format!(".{}", e))
                    .collect::<Vec<_>>()
                    .join(" ");
                if color {
                    println!("{:<12} {}", lang.as_str().bold(), exts.bright_black());
                } else {
                    println!("{:<12} {}", lang.as_str(), exts);
                }
            }
        }
    }
}

/// Compose lint JSON object (pure) for testing/snapshot purposes.
pub fn compose_lint_json(res: &LintResult) -> JsonVal {
    let issues: Vec<JsonVal> = res
        .issues
        .iter()
        .map(|is| {
            json!({
                "file": is.file,
                "language": is.language,
                "type": is.diagnostic.kind,
                "severity": is.diagnostic.severity,
                "message": is.diagnostic.message,
                "line": is.diagnostic.line,
            })
        })
        .collect();
    json!({
        "issues": issues,
        "summary": {
            "errors": res.summary.errors,
            "warnings": res.summary.warnings,
            "infos": res.summary.infos,
            "files": res.summary.files,
        }
    })
}

/// Compose the languages JSON array (pure).
pub fn compose_languages_json() -> JsonVal {
    let items: Vec<JsonVal> = LanguageId::ALL
        .iter()
        .map(|lang| json!({"id": lang, "extensions": lang.extensions()}))
        .collect();
    json!(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Diagnostic, Issue, Summary};

    #[test]
    fn test_compose_lint_json_shape() {
        let issues = vec![
            Issue {
                file: "q.sql".into(),
                language: LanguageId::Sql,
                diagnostic: Diagnostic::new(
                    Severity::Info,
                    "Unused Table",
                    "Table 'foo' is created but never referenced",
                    None,
                ),
            },
            Issue {
                file: "a.js".into(),
                language: LanguageId::JavaScript,
                diagnostic: Diagnostic::new(Severity::Warning, "Missing Semicolon", "m", Some(3)),
            },
        ];
        let summary = Summary::tally(&issues, 2);
        let out = compose_lint_json(&LintResult { issues, summary });
        assert_eq!(out["summary"]["warnings"], 1);
        assert_eq!(out["summary"]["files"], 2);
        assert_eq!(out["issues"][0]["type"], "Unused Table");
        assert_eq!(out["issues"][0]["language"], "sql");
        assert!(out["issues"][0]["line"].is_null());
        assert_eq!(out["issues"][1]["severity"], "warning");
        assert_eq!(out["issues"][1]["line"], 3);
    }

    #[test]
    fn test_compose_languages_json_lists_all() {
        let out = compose_languages_json();
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), LanguageId::ALL.len());
        assert_eq!(items[2]["id"], "c-family");
        assert!(items[2]["extensions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e == "cpp"));
    }
}
