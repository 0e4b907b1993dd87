use std::panic;
use std::path::Path;

use codenote_core::{
    AnnotationTags, EmitOptions, PlainHighlighter, SectionRegistry, build_intervals, overlay,
    overlay_plain, render, scan_text, tokenize,
};

const CASES: usize = 200;
const MAX_LEN: usize = 256;
const CHARSET: &[char] = &[
    'a', 'b', 'x', ' ', ' ', '\n', '\n', '.', ':', '1', '2', '0', '«', '»', '<', '&', '"',
];
const TEXT_CHARS: &[char] = &['a', 'b', 'c', 'x', ' ', '<', '>', '&', 'é'];

#[test]
fn render_never_panics_on_random_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x7f4a_2d91_13b4_55a1);
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_document(&mut rng, len);
        let result = panic::catch_unwind(|| {
            let mut registry = SectionRegistry::new();
            render(
                &source,
                Path::new("random.rst"),
                &PlainHighlighter,
                &EmitOptions::default(),
                &mut registry,
            )
        });
        if result.is_err() {
            return Err(format!("render panicked for case {}: {:?}", case, source).into());
        }
    }
    Ok(())
}

#[test]
fn balanced_markers_overlay_plain_text() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x91d4_2f8e_c1a3_044f);
    for case in 0..CASES {
        let marked = random_marked_text(&mut rng);
        let scanned = scan_text(&marked).map_err(|err| format!("case {}: {}", case, err))?;
        let intervals = build_intervals(&scanned.lines)
            .map_err(|err| format!("case {}: {}: {:?}", case, err, marked))?;
        let cleaned = scanned.cleaned();
        let out = overlay_plain(&cleaned, &intervals, AnnotationTags::new("p_1"))
            .map_err(|err| format!("case {}: {}: {:?}", case, err, marked))?;

        assert_eq!(
            out.matches("<span ").count(),
            intervals.len(),
            "case {}: {:?}",
            case,
            marked
        );
        check_visible_text(&out, &cleaned).map_err(|err| format!("case {}: {}", case, err))?;
    }
    Ok(())
}

#[test]
fn balanced_markers_overlay_highlighted_text() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x0c3e_88a1_5d27_f9b3);
    for case in 0..CASES {
        let marked = random_marked_text(&mut rng);
        let scanned = scan_text(&marked).map_err(|err| format!("case {}: {}", case, err))?;
        let intervals = build_intervals(&scanned.lines)
            .map_err(|err| format!("case {}: {}: {:?}", case, err, marked))?;
        let cleaned = scanned.cleaned();
        let html = random_highlight(&mut rng, &cleaned);
        let tokens = tokenize(&html).map_err(|err| format!("case {}: {}", case, err))?;
        let out = overlay(&tokens, &intervals, AnnotationTags::new("p_1"))
            .map_err(|err| format!("case {}: {}: {:?} / {}", case, err, marked, html))?;

        check_visible_text(&out, &cleaned)
            .map_err(|err| format!("case {}: {}\nmarked: {:?}\nhtml: {}", case, err, marked, html))?;
    }
    Ok(())
}

/// Output must be well-formed and read back as exactly the cleaned text.
fn check_visible_text(html: &str, cleaned: &str) -> Result<(), String> {
    let wrapped = format!("<root>{}</root>", html);
    let doc = roxmltree::Document::parse(&wrapped)
        .map_err(|err| format!("not well-formed: {}\n{}", err, html))?;
    let visible: String = doc
        .descendants()
        .filter(|node| node.is_text())
        .filter_map(|node| node.text())
        .collect();
    if visible != cleaned {
        return Err(format!("visible text {:?} != {:?}", visible, cleaned));
    }
    Ok(())
}

/// Text with properly nested markers. Self-closing markers only start when
/// nothing else is open, and lines only end once everything they opened is
/// closed again.
fn random_marked_text(rng: &mut Lcg) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut line_has_self_closing = false;
    let steps = rng.gen_range(1, 60);
    for _ in 0..steps {
        match rng.gen_range(0, 10) {
            0 | 1 if depth < 3 => {
                out.push(random_digit(rng));
                out.push('«');
                depth += 1;
            }
            2 | 3 if depth > 0 => {
                out.push('»');
                // `n«» ` would read as a self-closing marker.
                if out.ends_with("«»") {
                    out.push('z');
                }
                depth -= 1;
            }
            4 if depth == 0 && !line_has_self_closing => {
                out.push(random_digit(rng));
                out.push_str("«» ");
                line_has_self_closing = true;
            }
            5 if depth == 0 || !line_has_self_closing => {
                out.push('\n');
                line_has_self_closing = false;
            }
            _ => {
                let idx = rng.gen_range(0, TEXT_CHARS.len());
                out.push(TEXT_CHARS[idx]);
            }
        }
    }
    for _ in 0..depth {
        out.push('»');
    }
    out
}

/// Wraps random runs of each line in up to two levels of inline tags.
fn random_highlight(rng: &mut Lcg, text: &str) -> String {
    let mut out = String::new();
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let chars: Vec<char> = line.chars().collect();
        let mut pos = 0;
        while pos < chars.len() {
            let len = rng.gen_range(1, 5).min(chars.len() - pos);
            let run: String = chars[pos..pos + len].iter().map(|ch| escape(*ch)).collect();
            match rng.gen_range(0, 3) {
                0 => out.push_str(&run),
                1 => out.push_str(&format!("<span class=\"k\">{}</span>", run)),
                _ => out.push_str(&format!("<b><i>{}</i></b>", run)),
            }
            pos += len;
        }
    }
    out
}

fn escape(ch: char) -> String {
    match ch {
        '<' => "&lt;".to_string(),
        '>' => "&gt;".to_string(),
        '&' => "&amp;".to_string(),
        other => other.to_string(),
    }
}

fn random_digit(rng: &mut Lcg) -> char {
    char::from(b'1' + rng.gen_range(0, 9) as u8)
}

fn random_document(rng: &mut Lcg, len: usize) -> String {
    let mut out = String::new();
    while out.chars().count() < len {
        match rng.gen_range(0, 12) {
            0 => out.push_str("\n.. annotated::\n\n"),
            1 => out.push_str("   .. annotation::\n\n"),
            2 => out.push_str("   .. code-block:: text\n\n"),
            3 => out.push_str("      "),
            _ => {
                let idx = rng.gen_range(0, CHARSET.len());
                out.push(CHARSET[idx]);
            }
        }
    }
    out
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        let span = max - min;
        let value = (self.next() >> 1) as usize;
        min + (value % span)
    }
}
