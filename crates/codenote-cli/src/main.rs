mod cli;

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use codenote_core::{Diagnostic, EmitOptions, SectionRegistry, render};
use codenote_renderer::Renderer;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, DiagnosticsMode};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Renders the input and writes the page. `Ok(false)` means error diagnostics.
fn run(cli: &Cli) -> Result<bool> {
    let cwd = env::current_dir().context("failed to resolve the current directory")?;
    let (source, source_path) = read_input(cli.input.as_deref(), &cwd)?;
    let base_dir = cli
        .base_dir
        .as_ref()
        .map_or_else(|| cwd.clone(), |dir| cwd.join(dir));

    let renderer = Renderer::new(cli.theme.into());
    let highlighter = renderer.highlighter();
    let options = EmitOptions {
        sanitize: cli.sanitized,
        show_errors: cli.show_errors,
    };
    let mut registry = SectionRegistry::with_base_dir(base_dir);
    let result = render(&source, &source_path, &highlighter, &options, &mut registry);
    tracing::info!(
        path = %source_path.display(),
        diagnostics = result.diagnostics.len(),
        "rendered"
    );

    if let Some(mode) = cli.diagnostics {
        emit_diagnostics(&result.diagnostics, mode)?;
    }

    if let Some(dir) = &cli.assets {
        renderer
            .generate_files(dir)
            .with_context(|| format!("failed to write assets to {}", dir.display()))?;
    }

    let html = if cli.raw {
        result.html.clone()
    } else {
        renderer.embed_html(&result.html, cli.assets.is_none(), cli.inline_js)
    };
    let mut stdout = io::stdout().lock();
    stdout.write_all(html.as_bytes())?;
    if cli.raw && !html.is_empty() {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;

    Ok(!result.has_errors())
}

fn read_input(input: Option<&Path>, cwd: &Path) -> Result<(String, PathBuf)> {
    match input {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok((source, cwd.join(path)))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok((buffer, cwd.join("stdin")))
        }
    }
}

fn emit_diagnostics(diagnostics: &[Diagnostic], mode: DiagnosticsMode) -> Result<()> {
    match mode {
        DiagnosticsMode::Json => {
            eprintln!("{}", serde_json::to_string_pretty(diagnostics)?);
        }
        DiagnosticsMode::Pretty => {
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic_to_pretty(diagnostic));
            }
        }
    }
    Ok(())
}

fn diagnostic_to_pretty(diagnostic: &Diagnostic) -> String {
    let start_line = diagnostic.range.start.line + 1;
    let start_col = diagnostic.range.start.character + 1;
    format!(
        "{}:{}:{} {} {}",
        start_line,
        start_col,
        diagnostic.severity.label(),
        diagnostic.code,
        diagnostic.message
    )
}
