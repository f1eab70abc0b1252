//! Polylint CLI binary entry point.
//! Delegates to the library for config, linting and printing.

use clap::Parser;
use polylint::cli::{Cli, Commands};
use polylint::language::LanguageId;
use polylint::{config, lint, output, utils};
use std::io::Read;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("polylint=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn fail(message: impl std::fmt::Display, code: i32) -> ! {
    eprintln!("{} {}", utils::error_prefix(), message);
    std::process::exit(code);
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Languages { output } => {
            output::print_languages(output.as_deref().unwrap_or("human"));
        }
        Commands::Lint {
            paths,
            repo_root,
            lang,
            output,
            min_severity,
            stdin,
        } => {
            let eff = match config::resolve_effective(
                repo_root.as_deref(),
                output.as_deref(),
                min_severity.as_deref(),
            ) {
                Ok(eff) => eff,
                Err(e) => fail(&e, 2),
            };
            let forced = match lang.as_deref().map(str::parse::<LanguageId>) {
                None => None,
                Some(Ok(l)) => Some(l),
                Some(Err(e)) => fail(&e, 2),
            };

            let (result, errors) = if stdin {
                let Some(language) = forced else {
                    fail("--stdin requires --lang", 2);
                };
                let mut source = String::new();
                if let Err(e) = std::io::stdin().read_to_string(&mut source) {
                    fail(format!("failed to read standard input: {}", e), 2);
                }
                (lint::lint_source(&source, language, &eff), Vec::new())
            } else {
                if eff.config_path.is_none() && eff.output != "json" {
                    eprintln!(
                        "{} {}",
                        utils::note_prefix(),
                        "No polylint.toml found; using defaults."
                    );
                }
                lint::run_lint(&eff, &paths, forced)
            };

            output::print_lint(&result, &eff.output, &errors);
            if result.summary.errors > 0 {
                std::process::exit(1);
            }
            if !errors.is_empty() {
                std::process::exit(2);
            }
        }
    }
}
