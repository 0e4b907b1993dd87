use codenote_core::{HighlightError, Highlighter, escape_attr};
use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme as SyntectTheme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::Theme;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// Highlights with syntect's bundled grammars, inline `style` colours only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntectHighlighter {
    theme: Theme,
}

impl SyntectHighlighter {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, text: &str, language: &str) -> Result<String, HighlightError> {
        let theme = pick_theme(self.theme, &THEME_SET)?;
        let syntax = find_syntax(language, &SYNTAX_SET);
        let mut lines = HighlightLines::new(syntax, theme);

        let mut body = String::with_capacity(text.len() * 2);
        for line in LinesWithEndings::from(text) {
            let ranges = lines
                .highlight_line(line, &SYNTAX_SET)
                .map_err(|err| HighlightError::Backend(err.to_string()))?;
            let html = styled_line_to_highlighted_html(&ranges, IncludeBackground::No)
                .map_err(|err| HighlightError::Backend(err.to_string()))?;
            // Keep each line's markup on its own line.
            if line.ends_with('\n') {
                body.push_str(&strip_font_weight(&html.replacen('\n', "", 1)));
                body.push('\n');
            } else {
                body.push_str(&strip_font_weight(&html));
            }
        }

        Ok(format!(
            "<pre class=\"highlight language-{}\">{}</pre>",
            escape_attr(language),
            body
        ))
    }
}

fn find_syntax<'a>(language: &str, syntax_set: &'a SyntaxSet) -> &'a SyntaxReference {
    match syntax_set.find_syntax_by_token(language) {
        Some(syntax) => syntax,
        None => {
            tracing::debug!(language, "no grammar for language, using plain text");
            syntax_set.find_syntax_plain_text()
        }
    }
}

fn pick_theme(theme: Theme, theme_set: &ThemeSet) -> Result<&SyntectTheme, HighlightError> {
    let candidates = match theme {
        Theme::Dark => ["Monokai Extended Bright", "Monokai Extended", "base16-ocean.dark"],
        Theme::Light | Theme::Auto => ["InspiredGitHub", "Solarized (light)", "base16-ocean.light"],
    };
    for name in candidates {
        if let Some(found) = theme_set.themes.get(name) {
            return Ok(found);
        }
    }
    theme_set
        .themes
        .values()
        .next()
        .ok_or_else(|| HighlightError::Backend("no syntax themes available".to_string()))
}

fn strip_font_weight(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find("font-weight:") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + "font-weight:".len()..];
        let end = match tail.find(';') {
            Some(index) => index + 1,
            None => {
                rest = "";
                break;
            }
        };
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}
