//! Link rewriting, anchors, and file-name helpers.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Hosts whose links are treated as canonical-text cross-references.
const SUTTACENTRAL_HOSTS: &[&str] = &["suttacentral.net", "www.suttacentral.net"];

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

/// Rewrite the target of every inline Markdown link.
///
/// `rewrite` receives the href and returns the replacement, or `None` to keep
/// the link untouched. Image links are never passed to `rewrite`.
pub fn rewrite_links<F>(md: &str, rewrite: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            if !caps[1].is_empty() {
                return caps[0].to_string();
            }
            match rewrite(&caps[3]) {
                Some(href) => format!("[{}]({href})", &caps[2]),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

/// Segment identifier addressed by a SuttaCentral URL.
///
/// `https://suttacentral.net/pli-tv-kd1/en/brahmali#3.1` yields `pli-tv-kd1`.
pub fn suttacentral_scid(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if !SUTTACENTRAL_HOSTS.contains(&host) {
        return None;
    }
    let first = url.path_segments()?.find(|s| !s.is_empty())?;
    Some(first.to_string())
}

/// Percent-encode the characters that would break a relative Markdown link.
pub fn encode_link_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '(' => out.push_str("%28"),
            ')' => out.push_str("%29"),
            _ => out.push(ch),
        }
    }
    out
}

/// GitHub-style heading slug: lower-cased, punctuation dropped, spaces to hyphens.
pub fn heading_anchor(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

/// Per-file anchor allocator; repeated headings get `-1`, `-2` suffixes.
#[derive(Debug, Default, Clone)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the anchor for the next heading with this text.
    ///
    /// Suffixes skip any slug already handed out, so a literal "Origin 1"
    /// heading and a repeated "Origin" never share an anchor.
    pub fn slug(&mut self, text: &str) -> String {
        let base = heading_anchor(text);
        let mut slug = base.clone();
        while self.seen.contains_key(&slug) {
            let count = self.seen.entry(base.clone()).or_insert(0);
            *count += 1;
            slug = format!("{base}-{count}");
        }
        self.seen.insert(slug.clone(), 0);
        slug
    }
}

/// File-system safe name for a section label.
///
/// Non-breaking spaces become spaces, en and em dashes become hyphens,
/// slashes become spaces, straight double quotes become curly ones,
/// colons, periods and commas are dropped, and whitespace runs collapse.
pub fn sanitize_file_name(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.chars() {
        match ch {
            '\u{00a0}' | '/' | '\\' => out.push(' '),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '"' => out.push('\u{201c}'),
            ':' | '.' | ',' | '?' | '*' | '<' | '>' | '|' => {}
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "Untitled".to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_links_replaces_selected_targets() {
        let md = "See [Kd 1](https://suttacentral.net/pli-tv-kd1/en/brahmali) and [DN 1](https://suttacentral.net/dn1).";
        let result = rewrite_links(md, |href| {
            (suttacentral_scid(href).as_deref() == Some("pli-tv-kd1"))
                .then(|| "./Khandhakas.md#kd-1".to_string())
        });
        assert_eq!(
            result,
            "See [Kd 1](./Khandhakas.md#kd-1) and [DN 1](https://suttacentral.net/dn1)."
        );
    }

    #[test]
    fn rewrite_links_skips_images() {
        let md = "![map](https://suttacentral.net/img/map.png)";
        assert_eq!(rewrite_links(md, |_| Some("x".into())), md);
    }

    #[test]
    fn suttacentral_scid_takes_first_segment() {
        assert_eq!(
            suttacentral_scid("https://suttacentral.net/pli-tv-bu-vb-pj2/en/brahmali#1.1").as_deref(),
            Some("pli-tv-bu-vb-pj2")
        );
        assert_eq!(
            suttacentral_scid("https://www.suttacentral.net/pli-tv-kd1").as_deref(),
            Some("pli-tv-kd1")
        );
        assert_eq!(suttacentral_scid("https://suttacentral.net/"), None);
        assert_eq!(suttacentral_scid("https://example.com/pli-tv-kd1"), None);
        assert_eq!(suttacentral_scid("./Khandhakas.md#kd-1"), None);
    }

    #[test]
    fn encode_link_path_escapes_spaces_and_parens() {
        assert_eq!(encode_link_path("Bhikkhu Vibhanga.md"), "Bhikkhu%20Vibhanga.md");
        assert_eq!(encode_link_path("A (B).md"), "A%20%28B%29.md");
    }

    #[test]
    fn heading_anchor_matches_github() {
        assert_eq!(heading_anchor("Pj 1"), "pj-1");
        assert_eq!(heading_anchor("Saṅghādisesa"), "saṅghādisesa");
        assert_eq!(heading_anchor("What's this? (Part 2)"), "whats-this-part-2");
    }

    #[test]
    fn slugger_deduplicates() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("Origin"), "origin");
        assert_eq!(slugger.slug("Origin"), "origin-1");
        assert_eq!(slugger.slug("Origin"), "origin-2");
        assert_eq!(slugger.slug("Origin 1"), "origin-1-1");
        assert_eq!(slugger.slug("Other"), "other");
    }

    #[test]
    fn slugger_skips_literal_suffixed_headings() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("Origin 1"), "origin-1");
        assert_eq!(slugger.slug("Origin"), "origin");
        assert_eq!(slugger.slug("Origin"), "origin-2");
        assert_eq!(slugger.slug("Origin"), "origin-3");
    }

    #[test]
    fn sanitize_file_name_rules() {
        assert_eq!(sanitize_file_name("Bhikkhu\u{00a0}Vibhanga"), "Bhikkhu Vibhanga");
        assert_eq!(sanitize_file_name("Pj 1\u{2013}4"), "Pj 1-4");
        assert_eq!(sanitize_file_name("Rules/Origin"), "Rules Origin");
        assert_eq!(sanitize_file_name("The \"Great\" Chapter"), "The \u{201c}Great\u{201c} Chapter");
        assert_eq!(sanitize_file_name("Kd 1: The Great Chapter."), "Kd 1 The Great Chapter");
        assert_eq!(sanitize_file_name("  a   b  "), "a b");
        assert_eq!(sanitize_file_name("..."), "Untitled");
    }
}
