//! Glossary accumulation from `[[term]]` markup.
//!
//! Terms are keyed by their normalized form (trimmed, whitespace collapsed,
//! lower-cased). Alternate word forms configured as aliases fold into their
//! canonical term. References always accumulate; definitions merge according
//! to the configured [`MergePolicy`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, instrument};

use vinaya_notes_markdown::glossary_markup;
use vinaya_notes_shared::{GlossaryEntry, MergePolicy, Result, VinayaError};

/// Accumulates glossary entries across the notes of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glossary {
    policy: MergePolicy,
    /// Normalized alternate form → (normalized canonical key, canonical display).
    aliases: HashMap<String, (String, String)>,
    entries: BTreeMap<String, GlossaryEntry>,
}

/// One term as written to `glossary.json`.
#[derive(Serialize)]
struct JsonEntry<'a> {
    definition: Option<&'a str>,
    references: Vec<&'a str>,
}

impl Glossary {
    /// Create an empty glossary.
    ///
    /// `aliases` maps a canonical term to its alternate forms.
    pub fn new(policy: MergePolicy, aliases: &BTreeMap<String, Vec<String>>) -> Self {
        let mut folded = HashMap::new();
        for (canonical, forms) in aliases {
            let canonical_key = normalize_term(canonical);
            if canonical_key.is_empty() {
                continue;
            }
            let display = collapse_whitespace(canonical);
            for form in forms {
                let form_key = normalize_term(form);
                if !form_key.is_empty() && form_key != canonical_key {
                    folded.insert(form_key, (canonical_key.clone(), display.clone()));
                }
            }
        }

        Self {
            policy,
            aliases: folded,
            entries: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Record every markup occurrence in one note's text.
    pub fn scan(&mut self, scid: &str, text: &str) {
        for markup in glossary_markup(text) {
            self.record(&markup.term, markup.definition.as_deref(), scid);
        }
    }

    /// Record one use of `term` by the note `scid`.
    pub fn record(&mut self, term: &str, definition: Option<&str>, scid: &str) {
        let key = normalize_term(term);
        if key.is_empty() {
            return;
        }

        let (key, display) = match self.aliases.get(&key) {
            Some((canonical, display)) => (canonical.clone(), display.clone()),
            None => (key, collapse_whitespace(term)),
        };

        let definition = definition
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let policy = self.policy;
        let entry = self.entries.entry(key).or_insert_with(|| GlossaryEntry {
            term: display,
            definition: None,
            references: Default::default(),
        });

        entry.references.insert(scid.to_string());
        if let Some(new) = definition {
            merge_definition(policy, &mut entry.definition, new);
        }
    }

    /// Normalized lookup key for `term`, after alias folding.
    pub fn key_for(&self, term: &str) -> String {
        let key = normalize_term(term);
        match self.aliases.get(&key) {
            Some((canonical, _)) => canonical.clone(),
            None => key,
        }
    }

    /// Entry for `term` under any spelling or alias.
    pub fn get(&self, term: &str) -> Option<&GlossaryEntry> {
        self.entries.get(&self.key_for(term))
    }

    /// Entries ordered by normalized key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &GlossaryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as the `glossary.json` artifact: an object keyed by display
    /// term, each with `definition` and sorted `references`.
    pub fn to_json(&self) -> Result<String> {
        let doc: BTreeMap<&str, JsonEntry<'_>> = self
            .entries
            .values()
            .map(|entry| {
                (
                    entry.term.as_str(),
                    JsonEntry {
                        definition: entry.definition.as_deref(),
                        references: entry.references.iter().map(String::as_str).collect(),
                    },
                )
            })
            .collect();

        let mut json = serde_json::to_string_pretty(&doc).map_err(|e| {
            VinayaError::validation(format!("glossary serialization failed: {e}"))
        })?;
        json.push('\n');
        Ok(json)
    }

    /// Write `glossary.json` to `path`, via a temp file and rename.
    #[instrument(skip(self), fields(terms = self.entries.len()))]
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, &json)?;
        debug!(path = %path.display(), "wrote glossary");
        Ok(())
    }
}

fn merge_definition(policy: MergePolicy, current: &mut Option<String>, new: String) {
    match current {
        None => *current = Some(new),
        Some(existing) => match policy {
            MergePolicy::FirstWins => {}
            MergePolicy::LastWins => *existing = new,
            MergePolicy::Longest => {
                if new.chars().count() > existing.chars().count() {
                    *existing = new;
                }
            }
        },
    }
}

/// Trim, collapse internal whitespace, lower-case.
pub fn normalize_term(term: &str) -> String {
    collapse_whitespace(term).to_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    stage_file(path, contents)?.commit()
}

/// A file written next to its destination under a temporary name.
#[derive(Debug)]
pub(crate) struct StagedFile {
    temp: PathBuf,
    path: PathBuf,
}

/// Write `contents` to `.{name}.tmp` beside `path`, creating parent
/// directories. `path` itself is untouched until [`StagedFile::commit`].
pub(crate) fn stage_file(path: &Path, contents: &str) -> Result<StagedFile> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| VinayaError::render(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, contents).map_err(|e| VinayaError::render(&temp, e))?;
    Ok(StagedFile {
        temp,
        path: path.to_path_buf(),
    })
}

impl StagedFile {
    pub(crate) fn commit(self) -> Result<()> {
        if let Err(e) = std::fs::rename(&self.temp, &self.path) {
            let _ = std::fs::remove_file(&self.temp);
            return Err(VinayaError::render(&self.path, e));
        }
        Ok(())
    }

    pub(crate) fn discard(self) {
        let _ = std::fs::remove_file(&self.temp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glossary(policy: MergePolicy) -> Glossary {
        Glossary::new(policy, &BTreeMap::new())
    }

    #[test]
    fn term_in_two_notes_has_one_entry() {
        let mut g = glossary(MergePolicy::FirstWins);
        g.scan("pli-tv-bu-vb-pj1", "See [[methuna|sexual intercourse]].");
        g.scan("pli-tv-bu-vb-pj2", "Again [[methuna]].");

        assert_eq!(g.len(), 1);
        let entry = g.get("methuna").unwrap();
        assert_eq!(entry.definition.as_deref(), Some("sexual intercourse"));
        assert_eq!(
            entry.references.iter().collect::<Vec<_>>(),
            ["pli-tv-bu-vb-pj1", "pli-tv-bu-vb-pj2"]
        );
    }

    #[test]
    fn keys_are_normalized_and_display_is_first_spelling() {
        let mut g = glossary(MergePolicy::FirstWins);
        g.record("Saṅgha  Kamma", None, "a1");
        g.record(" saṅgha kamma ", None, "a2");

        assert_eq!(g.len(), 1);
        let entry = g.get("SAṄGHA KAMMA").unwrap();
        assert_eq!(entry.term, "Saṅgha Kamma");
        assert_eq!(entry.references.len(), 2);
    }

    #[test]
    fn first_wins_keeps_first_definition() {
        let mut g = glossary(MergePolicy::FirstWins);
        g.record("term", Some("first"), "a1");
        g.record("term", Some("second, longer"), "a2");
        assert_eq!(g.get("term").unwrap().definition.as_deref(), Some("first"));
    }

    #[test]
    fn last_wins_replaces_definition() {
        let mut g = glossary(MergePolicy::LastWins);
        g.record("term", Some("first"), "a1");
        g.record("term", Some("second"), "a2");
        assert_eq!(g.get("term").unwrap().definition.as_deref(), Some("second"));
    }

    #[test]
    fn longest_keeps_longest_definition() {
        let mut g = glossary(MergePolicy::Longest);
        g.record("term", Some("medium one"), "a1");
        g.record("term", Some("short"), "a2");
        g.record("term", Some("the longest one"), "a3");
        g.record("term", Some("tiny"), "a4");
        assert_eq!(
            g.get("term").unwrap().definition.as_deref(),
            Some("the longest one")
        );
    }

    #[test]
    fn missing_definition_never_replaces() {
        for policy in [MergePolicy::FirstWins, MergePolicy::LastWins, MergePolicy::Longest] {
            let mut g = glossary(policy);
            g.record("term", None, "a1");
            g.record("term", Some("defined"), "a2");
            g.record("term", None, "a3");
            g.record("term", Some("  "), "a4");
            assert_eq!(
                g.get("term").unwrap().definition.as_deref(),
                Some("defined"),
                "policy {policy:?}"
            );
            assert_eq!(g.get("term").unwrap().references.len(), 4);
        }
    }

    #[test]
    fn aliases_fold_into_canonical_term() {
        let aliases = BTreeMap::from([
            ("vibbham".to_string(), vec!["vibbhant".to_string()]),
            (
                "dūs".to_string(),
                vec!["dūsent".to_string(), "dūsess".to_string(), "dūsessant".to_string()],
            ),
        ]);
        let mut g = Glossary::new(MergePolicy::FirstWins, &aliases);
        g.scan("a1", "[[Vibbhant|gone astray]] and [[dūsess]]");
        g.scan("a2", "[[vibbham]] and [[dūs|to corrupt]]");

        assert_eq!(g.len(), 2);
        let vibbham = g.get("vibbhant").unwrap();
        assert_eq!(vibbham.term, "vibbham");
        assert_eq!(vibbham.definition.as_deref(), Some("gone astray"));
        assert_eq!(vibbham.references.len(), 2);

        let dus = g.get("dūs").unwrap();
        assert_eq!(dus.definition.as_deref(), Some("to corrupt"));
        assert_eq!(g.key_for("dūsessant"), "dūs");
    }

    #[test]
    fn to_json_is_sorted_object() {
        let mut g = glossary(MergePolicy::FirstWins);
        g.record("zeta", None, "b2");
        g.record("alpha", Some("first letter"), "b1");
        g.record("alpha", None, "a9");

        let json = g.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["alpha"]["definition"], "first letter");
        assert_eq!(value["alpha"]["references"], serde_json::json!(["a9", "b1"]));
        assert!(value["zeta"]["definition"].is_null());
        assert!(json.find("\"alpha\"").unwrap() < json.find("\"zeta\"").unwrap());
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn write_creates_file() {
        let dir = std::env::temp_dir().join(format!("vn-glossary-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("glossary.json");

        let mut g = glossary(MergePolicy::FirstWins);
        g.record("term", Some("def"), "a1");
        g.write(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, g.to_json().unwrap());
        assert!(!dir.join("nested").join(".glossary.json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
