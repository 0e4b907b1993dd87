mod syntax;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

pub use syntax::SyntectHighlighter;

const BASE_CSS: &str = include_str!("../assets/codenote.css");
const BASE_JS: &str = include_str!("../assets/codenote.js");

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    theme: Theme,
}

impl Renderer {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    /// A highlighter whose colours match this renderer's theme.
    pub fn highlighter(&self) -> SyntectHighlighter {
        SyntectHighlighter::new(self.theme)
    }

    pub fn stylesheet(&self) -> String {
        let mut out = String::new();
        let (light_vars, dark_vars) = default_theme_vars();

        match self.theme {
            Theme::Auto => {
                out.push_str(&root_block(&light_vars));
                out.push_str("@media (prefers-color-scheme: dark) {\n");
                out.push_str(&indent_root_block(&dark_vars));
                out.push_str("}\n");
            }
            Theme::Light => {
                out.push_str(&root_block(&light_vars));
            }
            Theme::Dark => {
                out.push_str(&root_block(&dark_vars));
            }
        }

        out.push_str(BASE_CSS);
        out
    }

    /// Wraps a rendered fragment into a standalone page.
    pub fn embed_html(&self, html: &str, with_inline_css: bool, with_inline_js: bool) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n");
        out.push_str("<html lang=\"en\">\n");
        out.push_str("<head>\n");
        out.push_str("  <meta charset=\"utf-8\" />\n");
        out.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n");
        if with_inline_css {
            out.push_str("  <style>\n");
            out.push_str(&self.stylesheet());
            out.push_str("\n  </style>\n");
        } else {
            out.push_str("  <link rel=\"stylesheet\" href=\"codenote.css\" />\n");
        }
        out.push_str("</head>\n");
        out.push_str("<body>\n");
        out.push_str(html);
        if !html.ends_with('\n') {
            out.push('\n');
        }
        if with_inline_js {
            out.push_str("  <script>\n");
            out.push_str(BASE_JS);
            out.push_str("\n  </script>\n");
        }
        out.push_str("</body>\n");
        out.push_str("</html>\n");
        out
    }

    pub fn generate_files(&self, out_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(out_dir)?;
        fs::write(out_dir.join("codenote.css"), self.stylesheet())?;
        fs::write(out_dir.join("codenote.js"), BASE_JS)?;
        tracing::debug!(dir = %out_dir.display(), "assets written");
        Ok(())
    }
}

fn default_theme_vars() -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let light = BTreeMap::from([
        ("--codenote-bg".to_string(), "#fbfbf8".to_string()),
        ("--codenote-fg".to_string(), "#1f2328".to_string()),
        ("--codenote-muted".to_string(), "#5f6b76".to_string()),
        ("--codenote-border".to_string(), "#d8dee4".to_string()),
        ("--codenote-accent".to_string(), "#2b6cb0".to_string()),
        ("--codenote-code-bg".to_string(), "#f4f6f8".to_string()),
        ("--codenote-code-fg".to_string(), "#1f2328".to_string()),
        ("--codenote-mark-bg".to_string(), "#fff3bf".to_string()),
        ("--codenote-mark-border".to_string(), "#e0b400".to_string()),
        ("--codenote-error-bg".to_string(), "#fff5f5".to_string()),
        ("--codenote-error-border".to_string(), "#e53e3e".to_string()),
    ]);

    let dark = BTreeMap::from([
        ("--codenote-bg".to_string(), "#0e1116".to_string()),
        ("--codenote-fg".to_string(), "#e6edf3".to_string()),
        ("--codenote-muted".to_string(), "#9aa4af".to_string()),
        ("--codenote-border".to_string(), "#2a313b".to_string()),
        ("--codenote-accent".to_string(), "#63b3ed".to_string()),
        ("--codenote-code-bg".to_string(), "#202634".to_string()),
        ("--codenote-code-fg".to_string(), "#f0f6fc".to_string()),
        ("--codenote-mark-bg".to_string(), "#4a3f12".to_string()),
        ("--codenote-mark-border".to_string(), "#b7950b".to_string()),
        ("--codenote-error-bg".to_string(), "#2d1a1a".to_string()),
        ("--codenote-error-border".to_string(), "#fc8181".to_string()),
    ]);

    (light, dark)
}

fn format_vars(vars: &BTreeMap<String, String>, indent: &str) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        out.push_str(indent);
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push_str(";\n");
    }
    out
}

fn root_block(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str(":root {\n");
    out.push_str("  color-scheme: light dark;\n");
    out.push_str(&format_vars(vars, "  "));
    out.push_str("}\n");
    out
}

fn indent_root_block(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str("  :root {\n");
    out.push_str("    color-scheme: light dark;\n");
    out.push_str(&format_vars(vars, "    "));
    out.push_str("  }\n");
    out
}
