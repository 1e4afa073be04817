//! Note-text to Markdown conversion and cleanup passes.
//!
//! Note text arrives either as plain text/Markdown or as HTML. HTML notes are
//! converted with the `htmd` crate; both kinds then go through the same
//! cleanup passes. Glossary markup is replaced by links before conversion so
//! that the converter never escapes its brackets.

mod cleanup;
pub mod links;
pub mod markup;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use vinaya_notes_shared::{Result, VinayaError};

pub use links::{
    Slugger, encode_link_path, heading_anchor, rewrite_links, sanitize_file_name,
    suttacentral_scid,
};
pub use markup::{TermMarkup, glossary_markup, replace_glossary_markup};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for converting one note.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Site that root-relative links in the note point at.
    pub source_url: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            source_url: "https://suttacentral.net".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert one note's text to a clean Markdown block.
///
/// `glossary_link` maps a markup occurrence to its link target; `None` renders
/// the bare term. The returned block has no leading or trailing blank lines.
#[instrument(skip_all, fields(len = text.len()))]
pub fn convert_note<F>(text: &str, opts: &ConvertOptions, glossary_link: F) -> Result<String>
where
    F: Fn(&TermMarkup) -> Option<String>,
{
    let html = is_html(text);

    let with_links = replace_glossary_markup(text, |markup| {
        match glossary_link(markup) {
            Some(href) if html => format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&href),
                escape_html(&markup.term)
            ),
            Some(href) => format!("[{}]({href})", markup.term),
            None => markup.term.clone(),
        }
    });

    let raw_markdown = if html {
        let stripped = strip_note_references(&with_links);
        let converter = htmd::HtmlToMarkdown::builder()
            .skip_tags(vec!["script", "style", "iframe", "noscript", "svg"])
            .build();
        let converted = converter
            .convert(&stripped)
            .map_err(|e| VinayaError::Conversion(format!("htmd conversion failed: {e}")))?;
        debug!(raw_len = converted.len(), "htmd conversion complete");
        converted
    } else {
        with_links
    };

    let base_url = Url::parse(&opts.source_url).ok();
    Ok(cleanup::run_pipeline(&raw_markdown, base_url.as_ref()))
}

/// Whether note text carries HTML markup rather than plain text/Markdown.
pub fn is_html(text: &str) -> bool {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*(?:\s[^>]*)?/?>").expect("valid regex"));

    TAG_RE.is_match(text)
}

/// Remove `<a role="doc-noteref">` anchors, which point at footnotes that are
/// not carried over.
fn strip_note_references(html: &str) -> String {
    let selector = Selector::parse(r#"a[role="doc-noteref"]"#).expect("valid selector");
    let mut doc = Html::parse_fragment(html);

    let ids: Vec<_> = doc.select(&selector).map(|el| el.id()).collect();
    if ids.is_empty() {
        return html.to_string();
    }

    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    doc.root_element().inner_html()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Build a YAML frontmatter block.
pub fn build_frontmatter(title: &str, author: &str) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(title)));
    fm.push_str(&format!("author: \"{}\"\n", escape_yaml_string(author)));
    fm.push_str("---\n");
    fm
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn glossary_href(markup: &TermMarkup) -> Option<String> {
        Some(format!("Glossary.md#{}", heading_anchor(&markup.term)))
    }

    #[test]
    fn detects_html() {
        assert!(is_html("<p>Text</p>"));
        assert!(is_html("a<br/>b"));
        assert!(is_html("<i lang=\"pli\">sikkhā</i>"));
        assert!(!is_html("Plain [[term]] and [link](https://suttacentral.net/dn1)."));
        assert!(!is_html("Counts where 1 < 2 and 3 > 2"));
    }

    #[test]
    fn plain_note_gets_markdown_glossary_links() {
        let out = convert_note("See [[term]].", &ConvertOptions::default(), glossary_href).unwrap();
        assert_eq!(out, "See [term](Glossary.md#term).");
    }

    #[test]
    fn defined_markup_links_the_term_only() {
        let out = convert_note(
            "Refers to [[Saṅghādisesa|an offence entailing suspension]].",
            &ConvertOptions::default(),
            glossary_href,
        )
        .unwrap();
        assert_eq!(out, "Refers to [Saṅghādisesa](Glossary.md#saṅghādisesa).");
    }

    #[test]
    fn missing_glossary_link_renders_bare_term() {
        let out = convert_note("See [[term]].", &ConvertOptions::default(), |_| None).unwrap();
        assert_eq!(out, "See term.");
    }

    #[test]
    fn html_note_is_converted() {
        let html = r#"<p>For <i lang="pli">methunadhamma</i> see [[methuna|sexual intercourse]] and <a href="https://suttacentral.net/pli-tv-bu-vb-pj2/en/brahmali#1.1">Pj 2</a>.</p>"#;
        let out = convert_note(html, &ConvertOptions::default(), glossary_href).unwrap();

        assert!(out.contains("methunadhamma"));
        assert!(out.contains("[methuna](Glossary.md#methuna)"), "got: {out}");
        assert!(
            out.contains("[Pj 2](https://suttacentral.net/pli-tv-bu-vb-pj2/en/brahmali#1.1)"),
            "got: {out}"
        );
        assert!(!out.contains("<p>"));
        assert!(!out.contains("<i"));
    }

    #[test]
    fn html_note_drops_note_references() {
        let html = r##"<p>Text.<a role="doc-noteref" href="#note-1">1</a></p>"##;
        let out = convert_note(html, &ConvertOptions::default(), glossary_href).unwrap();
        assert_eq!(out, "Text.");
    }

    #[test]
    fn html_note_repairs_duplicated_origin() {
        let html = r#"<p><a href="https://suttacentral.nethttps://suttacentral.net/pli-tv-kd1/en/brahmali">Kd 1</a></p>"#;
        let out = convert_note(html, &ConvertOptions::default(), glossary_href).unwrap();
        assert!(out.contains("(https://suttacentral.net/pli-tv-kd1/en/brahmali)"), "got: {out}");
    }

    #[test]
    fn html_note_resolves_root_relative_links() {
        let html = r#"<p>See <a href="/pli-tv-kd1/en/brahmali">Kd 1</a>.</p>"#;
        let out = convert_note(html, &ConvertOptions::default(), glossary_href).unwrap();
        assert!(out.contains("(https://suttacentral.net/pli-tv-kd1/en/brahmali)"), "got: {out}");
    }

    #[test]
    fn note_headings_are_flattened() {
        let out = convert_note("## Origin\n\nText", &ConvertOptions::default(), glossary_href).unwrap();
        assert_eq!(out, "**Origin**\n\nText");
    }

    #[test]
    fn frontmatter_escapes_quotes() {
        let fm = build_frontmatter("The \"Great\" Chapter", "brahmali");
        assert_eq!(
            fm,
            "---\ntitle: \"The \\\"Great\\\" Chapter\"\nauthor: \"brahmali\"\n---\n"
        );
    }

    #[test]
    fn strip_note_references_leaves_other_anchors() {
        let html = r##"<p><a href="https://suttacentral.net/dn1">DN 1</a></p>"##;
        assert_eq!(strip_note_references(html), html);
    }
}
