//! File runner: expands targets, detects languages and lints in parallel.
//!
//! Produces a `LintResult` with issues and a summary plus a list of
//! per-target failures (unreadable files, bad patterns). Failures never
//! abort the run.

use crate::config::Effective;
use crate::engine;
use crate::error::LintError;
use crate::language::LanguageId;
use crate::models::{Diagnostic, Issue, LintResult, Summary};
use glob::{glob_with, MatchOptions, Pattern};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Display name used for standard input.
pub const STDIN_NAME: &str = "<stdin>";

fn match_options() -> MatchOptions {
    MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    }
}

/// Turn CLI paths into glob patterns; directories expand to `dir/**/*`.
fn target_patterns(root: &Path, paths: &[String], defaults: &[String]) -> Vec<String> {
    if paths.is_empty() {
        return defaults.to_vec();
    }
    paths
        .iter()
        .map(|p| {
            let abs = root.join(p);
            if abs.is_dir() {
                format!("{}/**/*", p.trim_end_matches('/'))
            } else {
                p.clone()
            }
        })
        .collect()
}

fn display_path(root: &Path, path: &Path) -> String {
    pathdiff::diff_paths(path, root)
        .unwrap_or_else(|| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

/// Whether a diagnostic survives the severity floor and disabled kinds.
fn keep(diagnostic: &Diagnostic, eff: &Effective) -> bool {
    diagnostic.severity >= eff.min_severity
        && !eff.disable.iter().any(|k| k.eq_ignore_ascii_case(&diagnostic.kind))
}

fn to_issues(file: &str, language: LanguageId, diagnostics: Vec<Diagnostic>, eff: &Effective) -> Vec<Issue> {
    diagnostics
        .into_iter()
        .filter(|d| keep(d, eff))
        .map(|diagnostic| Issue {
            file: file.to_string(),
            language,
            diagnostic,
        })
        .collect()
}

/// Lint every file matched by `paths` (or the configured patterns).
///
/// `forced` overrides language detection for all targets. Issues are
/// ordered by file path; each file keeps its own diagnostic order.
pub fn run_lint(
    eff: &Effective,
    paths: &[String],
    forced: Option<LanguageId>,
) -> (LintResult, Vec<String>) {
    let root = &eff.repo_root;
    let mut errors: Vec<String> = Vec::new();

    let mut excludes: Vec<Pattern> = Vec::new();
    for raw in &eff.exclude {
        match Pattern::new(raw) {
            Ok(p) => excludes.push(p),
            Err(e) => errors.push(
                LintError::Pattern {
                    pattern: raw.clone(),
                    message: e.to_string(),
                }
                .to_string(),
            ),
        }
    }

    let mut targets: BTreeSet<PathBuf> = BTreeSet::new();
    for pat in target_patterns(root, paths, &eff.patterns) {
        let abs = if Path::new(&pat).is_absolute() {
            pat.clone()
        } else {
            root.join(&pat).to_string_lossy().to_string()
        };
        let entries = match glob_with(&abs, match_options()) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push(
                    LintError::Pattern {
                        pattern: pat.clone(),
                        message: e.to_string(),
                    }
                    .to_string(),
                );
                continue;
            }
        };
        targets.extend(entries.flatten().filter(|p| p.is_file()));
    }

    let jobs: Vec<(PathBuf, String, LanguageId)> = targets
        .into_iter()
        .filter_map(|path| {
            let rel = display_path(root, &path);
            if excludes.iter().any(|p| p.matches_with(&rel, match_options())) {
                tracing::trace!(file = %rel, "excluded");
                return None;
            }
            match forced.or_else(|| eff.language_for(&path)) {
                Some(lang) => Some((path, rel, lang)),
                None => {
                    tracing::debug!(file = %rel, "skipping file with unknown language");
                    None
                }
            }
        })
        .collect();
    tracing::debug!(files = jobs.len(), "linting");

    let per_file: Vec<Result<Vec<Issue>, String>> = jobs
        .par_iter()
        .map(|(path, rel, lang)| {
            let source = fs::read_to_string(path).map_err(|source| {
                LintError::Io {
                    path: path.clone(),
                    source,
                }
                .to_string()
            })?;
            Ok(to_issues(rel, *lang, engine::lint(&source, *lang), eff))
        })
        .collect();

    let mut issues: Vec<Issue> = Vec::new();
    let mut files = 0usize;
    for result in per_file {
        match result {
            Ok(found) => {
                files += 1;
                issues.extend(found);
            }
            Err(e) => errors.push(e),
        }
    }
    let summary = Summary::tally(&issues, files);
    (LintResult { issues, summary }, errors)
}

/// Lint an in-memory source (standard input).
pub fn lint_source(source: &str, language: LanguageId, eff: &Effective) -> LintResult {
    let issues = to_issues(STDIN_NAME, language, engine::lint(source, language), eff);
    let summary = Summary::tally(&issues, 1);
    LintResult { issues, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn effective(root: &Path) -> Effective {
        Effective {
            repo_root: root.to_path_buf(),
            config_path: None,
            output: "human".into(),
            patterns: vec!["**/*".into()],
            exclude: vec!["vendor/**".into()],
            min_severity: Severity::Info,
            disable: Vec::new(),
            languages: HashMap::new(),
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("vendor")).unwrap();
        fs::write(root.join("src/a.js"), "let x = 5\nconsole.log(x);\n").unwrap();
        fs::write(root.join("src/b.py"), "def f():\n    return 1\n\nf()\n").unwrap();
        fs::write(root.join("src/notes.txt"), "let x = 5\n").unwrap();
        fs::write(root.join("vendor/lib.js"), "let y = 1\n").unwrap();
        dir
    }

    #[test]
    fn test_run_lint_detects_languages_and_excludes() {
        let dir = fixture();
        let eff = effective(dir.path());
        let (res, errors) = run_lint(&eff, &[], None);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(res.summary.files, 2);
        assert!(res.issues.iter().all(|i| i.file.ends_with("a.js")), "{:?}", res.issues);
        let missing = res
            .issues
            .iter()
            .find(|i| i.diagnostic.kind == "Missing Semicolon")
            .expect("missing semicolon");
        assert_eq!(missing.diagnostic.line, Some(1));
        assert_eq!(missing.language, LanguageId::JavaScript);
    }

    #[test]
    fn test_directory_argument_and_severity_floor() {
        let dir = fixture();
        let mut eff = effective(dir.path());
        eff.min_severity = Severity::Warning;
        let (res, _) = run_lint(&eff, &["src".to_string()], None);
        assert!(res
            .issues
            .iter()
            .all(|i| i.diagnostic.severity >= Severity::Warning));
        assert_eq!(res.summary.infos, 0);

        eff.min_severity = Severity::Info;
        eff.disable = vec!["missing semicolon".into(), "Debug Statement".into()];
        let (res, _) = run_lint(&eff, &["src".to_string()], None);
        assert!(res.issues.is_empty(), "{:?}", res.issues);
    }

    #[test]
    fn test_forced_language_and_bad_patterns() {
        let dir = fixture();
        let mut eff = effective(dir.path());
        eff.exclude = vec!["[".into()];
        let (res, errors) = run_lint(&eff, &["src/notes.txt".to_string()], Some(LanguageId::JavaScript));
        assert_eq!(res.summary.files, 1);
        assert!(res
            .issues
            .iter()
            .any(|i| i.file.ends_with("notes.txt") && i.diagnostic.kind == "Missing Semicolon"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_lint_source_for_stdin() {
        let dir = tempdir().unwrap();
        let eff = effective(dir.path());
        let res = lint_source("CREATE TABLE foo (id INT);\n", LanguageId::Sql, &eff);
        let unused = res
            .issues
            .iter()
            .find(|i| i.diagnostic.kind == "Unused Table")
            .expect("unused table");
        assert_eq!(unused.file, STDIN_NAME);
        assert_eq!(unused.diagnostic.line, None);
    }
}
