//! Post-conversion cleanup pipeline for note Markdown.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! The result is a trimmed block ready to be placed under a section heading.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Origin duplicated by the upstream publication for some links.
const DUPLICATED_ORIGIN: &str = "https://suttacentral.nethttps://suttacentral.net";

/// Run the full cleanup pipeline on converted note Markdown.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = md.to_string();

    result = repair_duplicated_origin(&result);
    result = flatten_headings(&result);
    result = strip_leftover_html(&result);
    result = resolve_links(&result, base_url);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);
    result = trim_edges(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Repair duplicated origin
// ---------------------------------------------------------------------------

/// Collapse `https://suttacentral.nethttps://suttacentral.net` into one origin.
fn repair_duplicated_origin(md: &str) -> String {
    md.replace(DUPLICATED_ORIGIN, "https://suttacentral.net")
}

// ---------------------------------------------------------------------------
// Pass 2: Flatten headings
// ---------------------------------------------------------------------------

/// Turn headings inside a note into bold lines.
///
/// Section headings come from the document tree; a note must not add its own
/// or the per-file anchor numbering would shift.
fn flatten_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.+?)\s*#*$").expect("valid regex"));

    let mut in_code_block = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
                return line.to_string();
            }
            if in_code_block {
                return line.to_string();
            }
            match H_RE.captures(line) {
                Some(caps) => format!("**{}**", &caps[1]),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray container tags that survived the conversion, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    let mut lines = Vec::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            lines.push(line.to_string());
            continue;
        }

        if in_code_block {
            lines.push(line.to_string());
            continue;
        }

        lines.push(strip_html_tags(line));
    }

    lines.join("\n")
}

/// Strip HTML tags from a single line, preserving inner text.
fn strip_html_tags(line: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|nav|mark)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Resolve relative links
// ---------------------------------------------------------------------------

/// Resolve root-relative links (`/pli-tv-kd1/en/brahmali`) against the source site.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let text = &caps[1];
            let href = &caps[2];

            // Only root-relative hrefs point back at the source site; plain
            // relative hrefs are local links and anchors stay in-page.
            if !href.starts_with('/') || href.starts_with("//") {
                return caps[0].to_string();
            }

            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 6: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines into a single blank line.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Trim
// ---------------------------------------------------------------------------

fn trim_edges(md: &str) -> String {
    md.trim_matches('\n').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_duplicated_origin() {
        let input = "[Pj 1](https://suttacentral.nethttps://suttacentral.net/pli-tv-bu-vb-pj1)";
        assert_eq!(
            repair_duplicated_origin(input),
            "[Pj 1](https://suttacentral.net/pli-tv-bu-vb-pj1)"
        );
    }

    #[test]
    fn flatten_headings_bolds_note_headings() {
        let input = "### The rule\n\nText\n\n#### Origin story ####";
        assert_eq!(
            flatten_headings(input),
            "**The rule**\n\nText\n\n**Origin story**"
        );
    }

    #[test]
    fn flatten_headings_skips_code_blocks() {
        let input = "```\n# not a heading\n```";
        assert_eq!(flatten_headings(input), input);
    }

    #[test]
    fn strip_leftover_html_removes_span_tags() {
        let input = "A <span class=\"pli\">bhikkhu</span> goes";
        let result = strip_leftover_html(input);
        assert_eq!(result, "A bhikkhu goes");
    }

    #[test]
    fn strip_leftover_html_preserves_code_blocks() {
        let input = "```html\n<div>Preserved</div>\n```";
        assert_eq!(strip_leftover_html(input), input);
    }

    #[test]
    fn resolve_links_root_relative() {
        let base = Url::parse("https://suttacentral.net").unwrap();
        let input = "[Kd 1](/pli-tv-kd1/en/brahmali)";
        assert_eq!(
            resolve_links(input, Some(&base)),
            "[Kd 1](https://suttacentral.net/pli-tv-kd1/en/brahmali)"
        );
    }

    #[test]
    fn resolve_links_leaves_others() {
        let base = Url::parse("https://suttacentral.net").unwrap();
        for input in [
            "[Section](#section-1)",
            "[Ch](./Ch1.md#ch1)",
            "[DN 1](https://suttacentral.net/dn1)",
        ] {
            assert_eq!(resolve_links(input, Some(&base)), input);
        }
    }

    #[test]
    fn clean_blank_lines_collapses_excess() {
        assert_eq!(clean_blank_lines("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn full_pipeline_cleans_note() {
        let input = "\n\n### Heading   \n\n\n\n<div>Some content</div>  \n\n";
        let base = Url::parse("https://suttacentral.net").unwrap();
        let result = run_pipeline(input, Some(&base));
        assert_eq!(result, "**Heading**\n\nSome content");
    }
}
