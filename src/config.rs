//! Configuration discovery and effective settings resolution.
//!
//! Polylint reads `polylint.toml|yaml|yml` from the repository root (or
//! closest ancestor) and merges it with CLI flags to produce an `Effective`
//! config.
//! Defaults:
//! - `output`: `human`
//! - `patterns`: `["**/*"]`
//! - `exclude`: none
//! - `min_severity`: `info`
//! - `disable`: none
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::{LintError, Result};
use crate::language::LanguageId;
use crate::models::Severity;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file names, in lookup order.
pub const CONFIG_FILES: [&str; 3] = ["polylint.toml", "polylint.yaml", "polylint.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `polylint.toml|yaml`.
pub struct PolylintConfig {
    pub output: Option<String>,
    pub patterns: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub min_severity: Option<String>,
    /// Diagnostic kinds to drop, e.g. "Unused Variable".
    #[serde(default)]
    pub disable: Vec<String>,
    /// Extension -> language id overrides.
    #[serde(default)]
    pub languages: HashMap<String, String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub config_path: Option<PathBuf>,
    pub output: String,
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
    pub min_severity: Severity,
    pub disable: Vec<String>,
    pub languages: HashMap<String, LanguageId>,
}

impl Effective {
    /// Language for `path`: config overrides first, then the extension table.
    pub fn language_for(&self, path: &Path) -> Option<LanguageId> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.languages
            .get(&ext)
            .copied()
            .or_else(|| LanguageId::from_extension(&ext))
    }
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `polylint.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_FILES.iter().any(|f| cur.join(f).exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Path of the config file under `root`, if any.
pub fn config_path(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|f| root.join(f))
        .find(|p| p.exists())
}

/// Load `PolylintConfig` from `root`. `Ok(None)` when no config file exists.
pub fn load_config(root: &Path) -> Result<Option<PolylintConfig>> {
    let Some(path) = config_path(root) else {
        return Ok(None);
    };
    let s = fs::read_to_string(&path).map_err(|source| LintError::Io {
        path: path.clone(),
        source,
    })?;
    let parsed = if path.extension().is_some_and(|e| e == "toml") {
        toml::from_str::<PolylintConfig>(&s).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<PolylintConfig>(&s).map_err(|e| e.to_string())
    };
    let cfg = parsed.map_err(|message| LintError::Config {
        path: path.clone(),
        message,
    })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(Some(cfg))
}

fn parse_severity(raw: &str, path: &Path) -> Result<Severity> {
    raw.parse().map_err(|message| LintError::Config {
        path: path.to_path_buf(),
        message,
    })
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(
    cli_repo_root: Option<&str>,
    cli_output: Option<&str>,
    cli_min_severity: Option<&str>,
) -> Result<Effective> {
    let start = PathBuf::from(cli_repo_root.unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let config_path = config_path(&repo_root);
    let cfg = load_config(&repo_root)?.unwrap_or_default();
    let origin = config_path.clone().unwrap_or_else(|| repo_root.clone());

    let output = cli_output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if output != "human" && output != "json" {
        return Err(LintError::Config {
            path: origin,
            message: format!("unknown output mode '{}' (expected human|json)", output),
        });
    }

    let min_severity = match cli_min_severity.or(cfg.min_severity.as_deref()) {
        Some(raw) => parse_severity(raw, &origin)?,
        None => Severity::Info,
    };

    let mut languages = HashMap::new();
    for (ext, id) in cfg.languages {
        let lang = id.parse::<LanguageId>().map_err(|e| LintError::Config {
            path: origin.clone(),
            message: format!("[languages] {}: {}", ext, e),
        })?;
        languages.insert(ext.trim_start_matches('.').to_ascii_lowercase(), lang);
    }

    Ok(Effective {
        repo_root,
        config_path,
        output,
        patterns: cfg.patterns.unwrap_or_else(|| vec!["**/*".to_string()]),
        exclude: cfg.exclude,
        min_severity,
        disable: cfg.disable,
        languages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_config() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let eff = resolve_effective(dir.path().to_str(), None, None).unwrap();
        assert_eq!(eff.output, "human");
        assert_eq!(eff.patterns, vec!["**/*".to_string()]);
        assert_eq!(eff.min_severity, Severity::Info);
        assert!(eff.config_path.is_none());
    }

    #[test]
    fn test_detect_repo_root_walks_up() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("polylint.toml"), "").unwrap();
        let nested = root.join("a/b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(detect_repo_root(&nested), root.to_path_buf());
    }

    #[test]
    fn test_toml_config_and_cli_precedence() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("polylint.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
output = "json"
patterns = ["src/**/*.js"]
exclude = ["vendor/**"]
min_severity = "warning"
disable = ["Unused Variable"]
[languages]
"inc" = "php"
            "#
        )
        .unwrap();

        let eff = resolve_effective(root.to_str(), None, None).unwrap();
        assert_eq!(eff.output, "json");
        assert_eq!(eff.patterns, vec!["src/**/*.js".to_string()]);
        assert_eq!(eff.exclude, vec!["vendor/**".to_string()]);
        assert_eq!(eff.min_severity, Severity::Warning);
        assert_eq!(eff.disable, vec!["Unused Variable".to_string()]);
        assert_eq!(
            eff.language_for(Path::new("lib/util.inc")),
            Some(LanguageId::Php)
        );
        assert_eq!(
            eff.language_for(Path::new("main.rs")),
            Some(LanguageId::Rust)
        );

        let eff = resolve_effective(root.to_str(), Some("human"), Some("error")).unwrap();
        assert_eq!(eff.output, "human");
        assert_eq!(eff.min_severity, Severity::Error);
    }

    #[test]
    fn test_yaml_config_loaded() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("polylint.yaml"),
            "output: json\nexclude:\n  - build/**\n",
        )
        .unwrap();
        let eff = resolve_effective(root.to_str(), None, None).unwrap();
        assert_eq!(eff.output, "json");
        assert_eq!(eff.exclude, vec!["build/**".to_string()]);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("polylint.toml"), "[languages]\ncob = \"cobol\"\n").unwrap();
        assert!(matches!(
            resolve_effective(root.to_str(), None, None),
            Err(LintError::Config { .. })
        ));

        fs::write(root.join("polylint.toml"), "min_severity = \"fatal\"\n").unwrap();
        assert!(matches!(
            resolve_effective(root.to_str(), None, None),
            Err(LintError::Config { .. })
        ));

        fs::write(root.join("polylint.toml"), "output = [1\n").unwrap();
        assert!(matches!(
            load_config(root),
            Err(LintError::Config { .. })
        ));
    }
}
