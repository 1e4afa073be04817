//! Markdown rendering of an assembled document tree.
//!
//! [`render`] is pure: it lays out one file per top-level section plus
//! `Glossary.md`, converts every note, and rewrites cross-references to
//! local anchors. [`RenderedDocs::write_to`] and [`RenderedDocs::stage`] are
//! the only steps that touch the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use vinaya_notes_markdown::{
    ConvertOptions, Slugger, TermMarkup, build_frontmatter, convert_note, encode_link_path,
    rewrite_links, sanitize_file_name, suttacentral_scid,
};
use vinaya_notes_shared::{
    BuildManifest, CURRENT_SCHEMA_VERSION, ManifestFile, Result, VinayaError,
};

use crate::assembler::{DocumentTree, NodeId, natural_cmp};
use crate::glossary::Glossary;

/// Name of the glossary page inside the output directory.
pub const GLOSSARY_FILE: &str = "Glossary.md";

/// Name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Deepest heading level Markdown supports.
const MAX_HEADING_LEVEL: usize = 6;

/// Options for [`render`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Edition identifier recorded in the manifest.
    pub edition: String,
    /// Author written into every file's frontmatter.
    pub author: String,
    /// Site that root-relative note links point at.
    pub source_url: String,
    /// Append previous/next links between section files.
    pub navigation: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            edition: String::new(),
            author: "brahmali".into(),
            source_url: ConvertOptions::default().source_url,
            navigation: true,
        }
    }
}

/// One Markdown file ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Path relative to the output directory.
    pub path: String,
    pub title: String,
    pub contents: String,
}

/// The complete output of one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocs {
    pub files: Vec<RenderedFile>,
    pub manifest: BuildManifest,
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// File names and anchors for every section and glossary term.
struct Layout {
    /// `(top-level node, file stem)` per section file.
    files: Vec<(NodeId, String)>,
    file_of: HashMap<NodeId, usize>,
    anchor_of: HashMap<NodeId, String>,
    /// Normalized glossary key → anchor in the glossary page.
    term_anchor: HashMap<String, String>,
}

impl Layout {
    fn new(tree: &DocumentTree, glossary: &Glossary) -> Self {
        let mut used = HashSet::new();
        if !glossary.is_empty() {
            used.insert(stem_key(GLOSSARY_FILE.trim_end_matches(".md")));
        }

        let mut files = Vec::new();
        let mut file_of = HashMap::new();
        let mut anchor_of = HashMap::new();

        for (index, &top) in tree.top_level().iter().enumerate() {
            let stem = unique_stem(&sanitize_file_name(&tree.node(top).label), &mut used);
            let mut slugger = Slugger::new();
            for id in tree.descendants(top) {
                anchor_of.insert(id, slugger.slug(&tree.node(id).label));
                file_of.insert(id, index);
            }
            files.push((top, stem));
        }

        let mut slugger = Slugger::new();
        slugger.slug("Glossary");
        let term_anchor = glossary
            .entries()
            .map(|(key, entry)| (key.to_string(), slugger.slug(&entry.term)))
            .collect();

        Self {
            files,
            file_of,
            anchor_of,
            term_anchor,
        }
    }

    fn file_name(&self, index: usize) -> String {
        format!("{}.md", self.files[index].1)
    }

    /// Link to a section, relative to the file `from`.
    fn section_href(&self, from: Option<usize>, target: NodeId) -> Option<String> {
        let file = *self.file_of.get(&target)?;
        let anchor = self.anchor_of.get(&target)?;
        if from == Some(file) {
            Some(format!("#{anchor}"))
        } else {
            Some(format!(
                "./{}#{anchor}",
                encode_link_path(&self.file_name(file))
            ))
        }
    }

    fn glossary_href(&self, glossary: &Glossary, markup: &TermMarkup) -> Option<String> {
        let anchor = self.term_anchor.get(&glossary.key_for(&markup.term))?;
        Some(format!("./{}#{anchor}", encode_link_path(GLOSSARY_FILE)))
    }
}

fn stem_key(stem: &str) -> String {
    stem.to_lowercase()
}

/// `stem`, or `stem 2`, `stem 3`, ... if already taken (case-insensitively).
fn unique_stem(stem: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = stem.to_string();
    let mut n = 2;
    while !used.insert(stem_key(&candidate)) {
        candidate = format!("{stem} {n}");
        n += 1;
    }
    candidate
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the tree and glossary to Markdown files and a manifest.
#[instrument(skip_all, fields(sections = tree.top_level().len(), terms = glossary.len()))]
pub fn render(
    tree: &DocumentTree,
    glossary: &Glossary,
    opts: &RenderOptions,
) -> Result<RenderedDocs> {
    let layout = Layout::new(tree, glossary);
    let convert_opts = ConvertOptions {
        source_url: opts.source_url.clone(),
    };

    let mut files = Vec::with_capacity(layout.files.len() + 1);
    for index in 0..layout.files.len() {
        let file = render_section_file(tree, glossary, &layout, index, opts, &convert_opts)?;
        debug!(path = %file.path, bytes = file.contents.len(), "rendered section file");
        files.push(file);
    }

    if !glossary.is_empty() {
        files.push(render_glossary_file(tree, glossary, &layout, opts));
    }

    let manifest = BuildManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        edition: opts.edition.clone(),
        author: opts.author.clone(),
        note_count: tree.note_count(),
        glossary_terms: glossary.len(),
        files: files
            .iter()
            .map(|f| ManifestFile {
                path: f.path.clone(),
                sha256: sha256_hex(&f.contents),
                size_bytes: f.contents.len(),
            })
            .collect(),
    };

    info!(files = files.len(), "render complete");

    Ok(RenderedDocs { files, manifest })
}

fn render_section_file(
    tree: &DocumentTree,
    glossary: &Glossary,
    layout: &Layout,
    index: usize,
    opts: &RenderOptions,
    convert_opts: &ConvertOptions,
) -> Result<RenderedFile> {
    let top = layout.files[index].0;
    let title = tree.node(top).label.clone();

    let mut blocks = Vec::new();
    for id in tree.descendants(top) {
        let node = tree.node(id);
        let level = node.depth.min(MAX_HEADING_LEVEL);
        blocks.push(format!("{} {}", "#".repeat(level), node.label));

        for note in &node.notes {
            let converted = convert_note(&note.text, convert_opts, |markup| {
                layout.glossary_href(glossary, markup)
            })?;
            let linked = rewrite_links(&converted, |href| {
                let scid = suttacentral_scid(href)?;
                let target = tree.link_target(&scid)?;
                layout.section_href(Some(index), target)
            });
            if !linked.is_empty() {
                blocks.push(linked);
            }
        }
    }

    if opts.navigation {
        if let Some(nav) = navigation(tree, layout, index) {
            blocks.push(nav);
        }
    }

    let mut contents = build_frontmatter(&title, &opts.author);
    contents.push('\n');
    contents.push_str(&blocks.join("\n\n"));
    contents.push('\n');

    Ok(RenderedFile {
        path: layout.file_name(index),
        title,
        contents,
    })
}

/// Previous/next links between consecutive section files.
fn navigation(tree: &DocumentTree, layout: &Layout, index: usize) -> Option<String> {
    let link = |i: usize| {
        (
            tree.node(layout.files[i].0).label.clone(),
            format!("./{}", encode_link_path(&layout.file_name(i))),
        )
    };

    let mut parts = Vec::new();
    if let Some(prev) = index.checked_sub(1) {
        let (label, href) = link(prev);
        parts.push(format!("[← {label}]({href})"));
    }
    if index + 1 < layout.files.len() {
        let (label, href) = link(index + 1);
        parts.push(format!("[{label} →]({href})"));
    }

    (!parts.is_empty()).then(|| parts.join(" | "))
}

fn render_glossary_file(
    tree: &DocumentTree,
    glossary: &Glossary,
    layout: &Layout,
    opts: &RenderOptions,
) -> RenderedFile {
    let mut blocks = vec!["# Glossary".to_string()];

    for (_, entry) in glossary.entries() {
        blocks.push(format!("## {}", entry.term));
        if let Some(definition) = &entry.definition {
            blocks.push(definition.clone());
        }

        let mut references: Vec<&String> = entry.references.iter().collect();
        references.sort_by(|a, b| natural_cmp(a, b));
        let links: Vec<String> = references
            .into_iter()
            .map(|scid| {
                tree.link_target(scid)
                    .and_then(|id| {
                        let href = layout.section_href(None, id)?;
                        Some(format!("[{}]({href})", tree.node(id).label))
                    })
                    .unwrap_or_else(|| scid.clone())
            })
            .collect();
        if !links.is_empty() {
            blocks.push(format!("Referenced in: {}", links.join(", ")));
        }
    }

    let mut contents = build_frontmatter("Glossary", &opts.author);
    contents.push('\n');
    contents.push_str(&blocks.join("\n\n"));
    contents.push('\n');

    RenderedFile {
        path: GLOSSARY_FILE.to_string(),
        title: "Glossary".to_string(),
        contents,
    }
}

pub(crate) fn sha256_hex(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

impl RenderedDocs {
    /// Pretty-printed `manifest.json`.
    pub fn manifest_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(&self.manifest).map_err(|e| {
            VinayaError::validation(format!("manifest serialization failed: {e}"))
        })?;
        json.push('\n');
        Ok(json)
    }

    /// Replace `dir` with exactly these files and the manifest.
    ///
    /// Everything is written to a staging directory next to `dir` first and
    /// then swapped in, so a failed write leaves the previous output intact.
    #[instrument(skip(self), fields(files = self.files.len()))]
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let mut staged = self.stage(dir)?;
        staged.publish()?;
        staged.finish();
        Ok(())
    }

    /// Write the files into a staging directory next to `dir`.
    ///
    /// `dir` itself is untouched until [`StagedOutput::publish`].
    pub fn stage(&self, dir: &Path) -> Result<StagedOutput> {
        let name = dir
            .file_name()
            .ok_or_else(|| {
                VinayaError::render(
                    dir,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "output path has no directory name",
                    ),
                )
            })?
            .to_string_lossy()
            .to_string();
        let parent = dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| VinayaError::render(parent, e))?;

        let staging = parent.join(format!(".{name}.staging"));
        let previous = parent.join(format!(".{name}.previous"));
        remove_dir_if_exists(&staging)?;
        remove_dir_if_exists(&previous)?;

        if let Err(e) = self.write_into(&staging) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
        debug!(staging = %staging.display(), "output staged");

        Ok(StagedOutput {
            dir: dir.to_path_buf(),
            staging,
            previous,
            published: false,
        })
    }

    fn write_into(&self, staging: &Path) -> Result<()> {
        std::fs::create_dir_all(staging).map_err(|e| VinayaError::render(staging, e))?;

        for file in &self.files {
            let path: PathBuf = staging.join(&file.path);
            std::fs::write(&path, &file.contents).map_err(|e| VinayaError::render(&path, e))?;
            debug!(path = %file.path, "wrote file");
        }

        let manifest_path = staging.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, self.manifest_json()?)
            .map_err(|e| VinayaError::render(&manifest_path, e))?;
        Ok(())
    }
}

/// Rendered output sitting in a staging directory, not yet visible at `dir`.
#[derive(Debug)]
pub struct StagedOutput {
    dir: PathBuf,
    staging: PathBuf,
    previous: PathBuf,
    published: bool,
}

impl StagedOutput {
    /// Swap the staged files into `dir`, keeping the old output aside until
    /// [`finish`](Self::finish) or [`rollback`](Self::rollback).
    pub fn publish(&mut self) -> Result<()> {
        if self.dir.exists() {
            std::fs::rename(&self.dir, &self.previous)
                .map_err(|e| VinayaError::render(&self.dir, e))?;
        }
        if let Err(e) = std::fs::rename(&self.staging, &self.dir) {
            if self.previous.exists() {
                let _ = std::fs::rename(&self.previous, &self.dir);
            }
            let _ = std::fs::remove_dir_all(&self.staging);
            return Err(VinayaError::render(&self.dir, e));
        }
        self.published = true;
        info!(dir = %self.dir.display(), "output written");
        Ok(())
    }

    /// Drop the old output kept aside by `publish`.
    pub fn finish(self) {
        if self.previous.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.previous) {
                warn!(path = %self.previous.display(), error = %e, "failed to remove previous output");
            }
        }
    }

    /// Undo `publish` (or discard the staging directory if never published),
    /// restoring whatever was at `dir` before.
    pub fn rollback(self) {
        if !self.published {
            let _ = std::fs::remove_dir_all(&self.staging);
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            warn!(path = %self.dir.display(), error = %e, "failed to remove new output");
            return;
        }
        if self.previous.exists() {
            if let Err(e) = std::fs::rename(&self.previous, &self.dir) {
                warn!(path = %self.previous.display(), error = %e, "failed to restore previous output");
                return;
            }
        }
        info!(dir = %self.dir.display(), "output rolled back");
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| VinayaError::render(path, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
