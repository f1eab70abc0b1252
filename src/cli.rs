//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "polylint",
    version,
    about = "Polylint: heuristic multi-language linter",
    long_about = "Polylint: a fast, heuristic linter for assembly, shell, C/C++, CSS, HTML, JavaScript, TypeScript, PHP, Python, Rust, SQL, Swift, Monkey C and XML.\n\nConfiguration precedence: CLI > polylint.toml > defaults.",
    after_help = "Examples:\n  polylint lint src\n  polylint lint app.js --output json\n  cat query.sql | polylint lint --stdin --lang sql",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(
        about = "Show version",
        long_about = "Print the current polylint version."
    )]
    Version,
    /// Lint source files
    #[command(
        about = "Run lint checks",
        long_about = "Lint files or directories. Directories expand to every file below them; files with an unknown extension are skipped unless --lang is given. Error-severity findings make the command exit with 1.",
        after_help = "Examples:\n  polylint lint\n  polylint lint src tests --min-severity warning\n  polylint lint --stdin --lang python < script.py"
    )]
    Lint {
        #[arg(help = "Files, directories or glob patterns (default: config patterns)")]
        paths: Vec<String>,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Force the language id for every input (e.g. js, python, c-family)")]
        lang: Option<String>,
        #[arg(long, value_parser = ["human", "json"], help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, value_parser = ["info", "warning", "warn", "error"], help = "Lowest severity to report (default: info)")]
        min_severity: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Read source from standard input (requires --lang)")]
        stdin: bool,
    },
    /// List supported languages
    #[command(
        about = "List supported languages",
        long_about = "Print every language id with the file extensions mapped to it."
    )]
    Languages {
        #[arg(long, value_parser = ["human", "json"], help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lint_flags() {
        let cli = Cli::try_parse_from([
            "polylint", "lint", "src", "--output", "json", "--min-severity", "warning",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Lint {
                paths,
                output,
                min_severity,
                stdin,
                ..
            } => {
                assert_eq!(paths, vec!["src".to_string()]);
                assert_eq!(output.as_deref(), Some("json"));
                assert_eq!(min_severity.as_deref(), Some("warning"));
                assert!(!stdin);
            }
            _ => panic!("expected lint"),
        }
    }

    #[test]
    fn test_rejects_unknown_output() {
        assert!(Cli::try_parse_from(["polylint", "lint", "--output", "xml"]).is_err());
    }
}
