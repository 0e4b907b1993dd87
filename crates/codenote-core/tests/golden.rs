use std::fs;
use std::path::{Path, PathBuf};

use codenote_core::{
    Diagnostic, EmitOptions, PlainHighlighter, SectionRegistry, render, sanitize_html,
};
use serde_json::{Value, json};

#[test]
fn golden_fixtures() -> Result<(), Box<dyn std::error::Error>> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let fixtures_dir = root.join("tests/fixtures");
    let expect_dir = root.join("tests/expect");

    let mut fixtures = collect_fixtures(&fixtures_dir)?;
    fixtures.sort_by(|a, b| file_name(a).cmp(file_name(b)));
    assert!(!fixtures.is_empty(), "no fixtures in {:?}", fixtures_dir);

    for fixture in fixtures {
        let name = file_stem(&fixture)?;
        let source = fs::read_to_string(&fixture)?;
        let mut registry = SectionRegistry::new();
        let result = render(
            &source,
            Path::new(file_name(&fixture)),
            &PlainHighlighter,
            &EmitOptions::default(),
            &mut registry,
        );

        let html_path = expect_dir.join(format!("{}.html", name));
        let expected = fs::read_to_string(&html_path)?;
        assert_eq!(
            result.html.trim_end(),
            expected.trim_end(),
            "HTML mismatch for fixture {}",
            name
        );

        let diag_path = expect_dir.join(format!("{}.diag.json", name));
        if diag_path.exists() {
            let expected: Value = serde_json::from_str(&fs::read_to_string(&diag_path)?)?;
            assert_eq!(
                diagnostics_to_json(&result.diagnostics),
                expected,
                "Diagnostics mismatch for fixture {}",
                name
            );
        } else if !result.diagnostics.is_empty() {
            panic!(
                "Unexpected diagnostics for fixture {}: {}",
                name,
                diagnostics_to_json(&result.diagnostics)
            );
        }
    }

    Ok(())
}

#[test]
fn sanitizing_golden_output_changes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    for name in ["basic", "failing", "stray"] {
        let expected = fs::read_to_string(root.join(format!("tests/expect/{}.html", name)))?;
        let expected = expected.trim_end();
        assert_eq!(sanitize_html(expected), expected, "fixture {}", name);
    }
    Ok(())
}

fn collect_fixtures(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut fixtures = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("rst") {
            fixtures.push(path);
        }
    }
    Ok(fixtures)
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
}

fn file_stem(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|value| value.to_string())
        .ok_or_else(|| "fixture name is not valid UTF-8".into())
}

/// Messages are left out so wording can change without touching fixtures.
fn diagnostics_to_json(diagnostics: &[Diagnostic]) -> Value {
    Value::Array(
        diagnostics
            .iter()
            .map(|diag| {
                json!({
                    "code": diag.code,
                    "severity": diag.severity.label(),
                    "range": {
                        "start": { "line": diag.range.start.line, "character": diag.range.start.character },
                        "end": { "line": diag.range.end.line, "character": diag.range.end.character },
                    },
                })
            })
            .collect(),
    )
}
