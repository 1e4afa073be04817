//! Core domain types for the Vinaya Notes conversion.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Current schema version for the `manifest.json` format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// NoteRecord
// ---------------------------------------------------------------------------

/// One annotation anchored to a canonical segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    /// Canonical segment identifier (SuttaCentral ID).
    pub scid: String,
    /// Author of the note (e.g. `brahmali`).
    #[serde(default)]
    pub author: String,
    /// Note body. Plain text, Markdown, or HTML; may carry cross-references
    /// and `[[term]]` glossary markup.
    pub text: String,
}

impl NoteRecord {
    pub fn new(scid: impl Into<String>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            scid: scid.into(),
            author: author.into(),
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// NotePage (API wire format)
// ---------------------------------------------------------------------------

/// A notes payload as served by the content API or stored in a notes file.
///
/// Paged responses carry `page`/`total_pages`; a bare array is treated as a
/// single complete page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotesPayload {
    Paged(NotePage),
    Bare(Vec<NoteRecord>),
}

/// One page of the paginated notes endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePage {
    /// 1-based page number.
    #[serde(default = "first_page")]
    pub page: u32,
    /// Total number of pages for this edition.
    #[serde(default = "first_page")]
    pub total_pages: u32,
    /// Notes on this page.
    pub notes: Vec<NoteRecord>,
}

fn first_page() -> u32 {
    1
}

impl NotesPayload {
    /// Total number of pages announced by the payload.
    pub fn total_pages(&self) -> u32 {
        match self {
            Self::Paged(page) => page.total_pages.max(1),
            Self::Bare(_) => 1,
        }
    }

    /// Consume the payload, returning its notes.
    pub fn into_notes(self) -> Vec<NoteRecord> {
        match self {
            Self::Paged(page) => page.notes,
            Self::Bare(notes) => notes,
        }
    }
}

// ---------------------------------------------------------------------------
// GlossaryEntry
// ---------------------------------------------------------------------------

/// A defined term collected from note text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// Display form of the term (first spelling seen).
    pub term: String,
    /// Definition text, if any note supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Segment identifiers of every note that uses the term.
    pub references: BTreeSet<String>,
}

/// How repeated definitions of the same glossary term are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Keep the first definition encountered.
    #[default]
    FirstWins,
    /// Replace with each later definition.
    LastWins,
    /// Keep whichever definition is longest.
    Longest,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "first-wins" => Ok(Self::FirstWins),
            "last-wins" => Ok(Self::LastWins),
            "longest" => Ok(Self::Longest),
            other => Err(format!(
                "unknown merge policy '{other}': expected first-wins, last-wins, or longest"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` written next to the rendered Markdown.
///
/// Carries no timestamps: identical input must produce identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Edition identifier the notes were fetched for.
    pub edition: String,
    /// Author of the notes.
    pub author: String,
    /// Number of notes placed in the document tree.
    pub note_count: usize,
    /// Number of distinct glossary terms.
    pub glossary_terms: usize,
    /// Every Markdown file in the output directory.
    pub files: Vec<ManifestFile>,
}

/// A single rendered file listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Path relative to the output directory.
    pub path: String,
    /// SHA-256 of the file contents (hex).
    pub sha256: String,
    /// Size in bytes.
    pub size_bytes: usize,
}
