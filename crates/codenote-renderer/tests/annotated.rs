use std::path::Path;

use codenote_core::{EmitOptions, SectionRegistry, render};
use codenote_renderer::{Renderer, Theme};

const SOURCE: &str = "\
.. annotated::

   .. code-block:: python

      def 1«greet(name)»:
          2«» return f\"hi {3«name»}\" if name else 'nobody <here>'

   .. annotation::

      The signature.

   .. annotation::

      The whole return line.

   .. annotation::

      The 3«interpolated» value.
";

#[test]
fn highlighted_sections_stay_well_formed() -> Result<(), Box<dyn std::error::Error>> {
    for theme in [Theme::Light, Theme::Dark] {
        let renderer = Renderer::new(theme);
        let result = render(
            SOURCE,
            Path::new("guide.rst"),
            &renderer.highlighter(),
            &EmitOptions::default(),
            &mut SectionRegistry::new(),
        );
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

        let wrapped = format!("<root>{}</root>", result.html);
        let doc = roxmltree::Document::parse(&wrapped)?;
        let marked: Vec<_> = doc
            .descendants()
            .filter(|node| {
                node.attribute("class")
                    .is_some_and(|class| class.starts_with("ex-guide_1 loc"))
            })
            .collect();
        // Tag splitting may repeat a span, never lose one.
        assert!(marked.len() >= 4, "{}", result.html);

        let code: String = doc
            .descendants()
            .find(|node| node.has_tag_name("pre"))
            .map(|pre| {
                pre.descendants()
                    .filter(|node| node.is_text())
                    .filter_map(|node| node.text())
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(
            code,
            "def greet(name):\n    return f\"hi {name}\" if name else 'nobody <here>'"
        );
    }
    Ok(())
}

#[test]
fn embedded_page_carries_the_fragment() {
    let renderer = Renderer::new(Theme::Auto);
    let result = render(
        SOURCE,
        Path::new("guide.rst"),
        &renderer.highlighter(),
        &EmitOptions::default(),
        &mut SectionRegistry::new(),
    );
    let page = renderer.embed_html(&result.html, true, true);
    assert!(page.contains("<div class=\"annotated ex-guide_1\">"));
    assert!(page.contains("comment-guide_1-3"));
}
