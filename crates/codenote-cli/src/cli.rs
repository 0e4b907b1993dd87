use clap::{ArgAction, Parser, ValueEnum};
use codenote_renderer::Theme;
use std::path::PathBuf;

/// Render annotated code listings to HTML
#[derive(Parser, Debug)]
#[command(name = "codenote", version, about = "Render annotated code listings to HTML")]
pub struct Cli {
    /// Document to render (stdin when absent)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Print the HTML fragment instead of a standalone page
    #[arg(long)]
    pub raw: bool,

    #[arg(long, value_enum, default_value_t = ThemeArg::Auto)]
    pub theme: ThemeArg,

    /// Run the output through the HTML sanitizer
    #[arg(long)]
    pub sanitized: bool,

    /// Report diagnostics on stderr
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub diagnostics: Option<DiagnosticsMode>,

    /// Directory section ids are derived relative to (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Write codenote.css and codenote.js to DIR and link them from the page
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Include the caption sync script in the page
    #[arg(long)]
    pub inline_js: bool,

    /// Leave an error box where a failed section would have been
    #[arg(long)]
    pub show_errors: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ThemeArg {
    Auto,
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DiagnosticsMode {
    Json,
    Pretty,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
