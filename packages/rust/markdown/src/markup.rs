//! Glossary markup: `[[term]]` and `[[term|definition]]`.

use std::sync::LazyLock;

use regex::Regex;

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]*))?\]\]").expect("valid regex")
});

/// One occurrence of glossary markup in note text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMarkup {
    /// Term as written, trimmed.
    pub term: String,
    /// Inline definition, if the markup carried a non-empty one.
    pub definition: Option<String>,
}

impl TermMarkup {
    fn from_captures(caps: &regex::Captures) -> Option<Self> {
        let term = caps[1].trim();
        if term.is_empty() {
            return None;
        }
        let definition = caps
            .get(2)
            .map(|d| d.as_str().trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Some(Self {
            term: term.to_string(),
            definition,
        })
    }
}

/// All glossary markup occurrences in `text`, in order.
pub fn glossary_markup(text: &str) -> Vec<TermMarkup> {
    MARKUP_RE
        .captures_iter(text)
        .filter_map(|caps| TermMarkup::from_captures(&caps))
        .collect()
}

/// Replace every markup occurrence with the output of `replace`.
///
/// Markup with a blank term is left as written.
pub fn replace_glossary_markup<F>(text: &str, replace: F) -> String
where
    F: Fn(&TermMarkup) -> String,
{
    MARKUP_RE
        .replace_all(text, |caps: &regex::Captures| {
            match TermMarkup::from_captures(caps) {
                Some(markup) => replace(&markup),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_defined_terms() {
        let found = glossary_markup("On [[methuna]] and [[ Saṅghādisesa | an offence entailing suspension ]].");
        assert_eq!(
            found,
            vec![
                TermMarkup {
                    term: "methuna".into(),
                    definition: None,
                },
                TermMarkup {
                    term: "Saṅghādisesa".into(),
                    definition: Some("an offence entailing suspension".into()),
                },
            ]
        );
    }

    #[test]
    fn empty_definition_is_none() {
        let found = glossary_markup("[[vibbhanta|]]");
        assert_eq!(found[0].definition, None);
    }

    #[test]
    fn blank_term_is_ignored() {
        assert!(glossary_markup("[[ |x]] and [[]]").is_empty());
        assert_eq!(replace_glossary_markup("[[ |x]]", |_| "X".into()), "[[ |x]]");
    }

    #[test]
    fn replace_uses_callback() {
        let out = replace_glossary_markup("See [[term|def]] here.", |m| format!("<{}>", m.term));
        assert_eq!(out, "See <term> here.");
    }

    #[test]
    fn ordinary_links_are_not_markup() {
        assert!(glossary_markup("[Pj 1](https://suttacentral.net/pli-tv-bu-vb-pj1)").is_empty());
    }
}
