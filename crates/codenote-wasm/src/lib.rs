use std::path::Path;

use codenote_core::{
    Block, BlockKind, Diagnostic, EmitOptions, PlainHighlighter, SectionRegistry, SourceMap,
    render,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderOptions {
    sanitize: Option<bool>,
    show_errors: Option<bool>,
    base_dir: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderResult {
    html: String,
    diagnostics: Vec<JsDiagnostic>,
    source_map: Vec<JsRange>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsDiagnostic {
    code: String,
    message: String,
    severity: String,
    range: JsRange,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsRange {
    start_line: usize,
    start_col: usize,
    end_line: usize,
    end_col: usize,
}

/// Renders one document. Code is escaped, not coloured; highlighting is left
/// to the page.
#[wasm_bindgen]
pub fn render_html(source: &str, path: &str) -> Result<JsValue, JsValue> {
    render_html_with_options(source, path, JsValue::UNDEFINED)
}

#[wasm_bindgen]
pub fn render_html_with_options(
    source: &str,
    path: &str,
    options: JsValue,
) -> Result<JsValue, JsValue> {
    let options = options_from_js(options)?;
    let result = render_result(source, path, options);
    serde_wasm_bindgen::to_value(&result).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn options_from_js(value: JsValue) -> Result<RenderOptions, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(RenderOptions::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn render_result(source: &str, path: &str, options: RenderOptions) -> RenderResult {
    let emit_options = EmitOptions {
        sanitize: options.sanitize.unwrap_or(false),
        show_errors: options.show_errors.unwrap_or(false),
    };
    let mut registry = match options.base_dir {
        Some(base_dir) => SectionRegistry::with_base_dir(base_dir),
        None => SectionRegistry::new(),
    };

    let result = render(
        source,
        Path::new(path),
        &PlainHighlighter,
        &emit_options,
        &mut registry,
    );

    let parsed = codenote_core::parse(source);
    let mut source_map = Vec::new();
    collect_block_ranges(&parsed.document.blocks, &parsed.source_map, &mut source_map);

    RenderResult {
        html: result.html,
        diagnostics: result.diagnostics.iter().map(js_diagnostic).collect(),
        source_map,
    }
}

fn js_diagnostic(diag: &Diagnostic) -> JsDiagnostic {
    JsDiagnostic {
        code: diag.code.to_string(),
        message: diag.message.clone(),
        severity: diag.severity.label().to_string(),
        range: JsRange {
            start_line: diag.range.start.line,
            start_col: diag.range.start.character,
            end_line: diag.range.end.line,
            end_col: diag.range.end.character,
        },
    }
}

fn collect_block_ranges(blocks: &[Block], source_map: &SourceMap, out: &mut Vec<JsRange>) {
    for block in blocks {
        let range = source_map.range(block.span);
        out.push(JsRange {
            start_line: range.start.line,
            start_col: range.start.character,
            end_line: range.end.line,
            end_col: range.end.character,
        });
        if let BlockKind::Annotated { blocks } = &block.kind {
            collect_block_ranges(blocks, source_map, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderOptions, render_result};

    const SOURCE: &str =
        ".. annotated::\n\n   See 1«here».\n\n   .. annotation::\n\n      Here.\n";

    #[test]
    fn ids_use_the_base_dir() {
        let options = RenderOptions {
            base_dir: Some("/site".to_string()),
            ..Default::default()
        };
        let result = render_result(SOURCE, "/site/docs/page.rst", options);
        assert!(result.html.contains("ex-docspage_1 loc1"), "{}", result.html);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn source_map_lists_nested_blocks() {
        let result = render_result(SOURCE, "page.rst", RenderOptions::default());
        assert_eq!(result.source_map.len(), 3);
        assert_eq!(result.source_map[1].start_line, 2);
        assert_eq!(result.source_map[1].start_col, 3);
    }

    #[test]
    fn diagnostics_carry_code_and_severity() {
        let result = render_result(".. annotation::\n\n   Alone.\n", "page.rst", RenderOptions::default());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "E_NOT_IN_SECTION");
        assert_eq!(result.diagnostics[0].severity, "error");
    }

    #[test]
    fn parser_warnings_precede_section_errors() {
        let source = ".. figure:: x.png\n\n.. annotated::\n\n   Open 1« forever.\n";
        let result = render_result(source, "page.rst", RenderOptions::default());
        let codes: Vec<&str> = result.diagnostics.iter().map(|diag| diag.code.as_str()).collect();
        assert_eq!(codes, vec!["W_DIRECTIVE_UNKNOWN", "E_MARKER_UNBALANCED"]);
        assert_eq!(result.diagnostics[1].range.start_line, 4);
        assert_eq!(result.diagnostics[1].range.start_col, 8);
    }
}
