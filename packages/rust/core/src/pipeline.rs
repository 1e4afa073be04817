//! End-to-end `build` pipeline: (scid map ∥ notes) → assemble → render → write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument};
use url::Url;

use vinaya_notes_fetcher::{NoteFetcher, NoteStream, RetryingClient, load_notes_file};
use vinaya_notes_shared::{
    AppConfig, BuildManifest, CURRENT_SCHEMA_VERSION, FetchConfig, MergePolicy, Result,
    VinayaError,
};

use crate::assembler::assemble;
use crate::glossary::{Glossary, stage_file};
use crate::render::{MANIFEST_FILE, RenderOptions, render, sha256_hex};
use crate::resolver::ScidMap;

/// Site used for root-relative note links when `api_base` has no usable origin.
const DEFAULT_SITE: &str = "https://suttacentral.net";

/// Configuration for one `build` run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Edition identifier to fetch notes for.
    pub edition: String,
    /// Author written into frontmatter and the manifest.
    pub author: String,
    /// Scid map location: a local path or an `http(s)` URL.
    pub scidmap: String,
    /// Read notes from this file instead of the API.
    pub notes_file: Option<PathBuf>,
    /// Directory receiving the Markdown files and `manifest.json`.
    pub output_dir: PathBuf,
    /// Where `glossary.json` is written.
    pub glossary_path: PathBuf,
    pub merge_policy: MergePolicy,
    /// Canonical term → alternate forms.
    pub aliases: BTreeMap<String, Vec<String>>,
    pub navigation: bool,
    pub fetch: FetchConfig,
}

impl From<&AppConfig> for BuildConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            edition: config.source.edition.clone(),
            author: config.source.author.clone(),
            scidmap: config.output.scidmap.clone(),
            notes_file: None,
            output_dir: PathBuf::from(&config.output.dir),
            glossary_path: PathBuf::from(&config.output.glossary_path),
            merge_policy: config.glossary.merge_policy,
            aliases: config.glossary.aliases.clone(),
            navigation: true,
            fetch: FetchConfig::from(config),
        }
    }
}

impl BuildConfig {
    /// Origin of the content site, derived from the API base URL.
    fn site_url(&self) -> String {
        Url::parse(&self.fetch.api_base)
            .ok()
            .map(|u| u.origin().ascii_serialization())
            .filter(|origin| origin != "null")
            .unwrap_or_else(|| DEFAULT_SITE.to_string())
    }
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildResult {
    pub output_dir: PathBuf,
    pub glossary_path: PathBuf,
    /// Markdown files written.
    pub file_count: usize,
    pub note_count: usize,
    pub glossary_terms: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the notes are in memory.
    fn notes_loaded(&self, count: usize);
    /// Called when the build completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn notes_loaded(&self, _count: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the full build.
///
/// Nothing is written unless the scid map and notes load, every note
/// resolves, and every file and the glossary render.
#[instrument(skip_all, fields(edition = %config.edition, out = %config.output_dir.display()))]
pub async fn run_build(
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();

    // --- Phase 1: Load inputs ---
    progress.phase("Loading scid map and notes");
    let client = RetryingClient::new(&config.fetch)?;
    let (map, notes) = tokio::join!(
        ScidMap::load_source(&config.scidmap, &client),
        load_notes(config),
    );
    let map = map?;
    let notes = notes?;
    progress.notes_loaded(notes.len());
    info!(scid_map = map.len(), notes = notes.len(), "inputs loaded");

    // --- Phase 2: Assemble ---
    progress.phase("Assembling document tree");
    let mut glossary = Glossary::new(config.merge_policy, &config.aliases);
    let tree = assemble(notes, &map, &mut glossary)?;

    // --- Phase 3: Render ---
    progress.phase("Rendering Markdown");
    let opts = RenderOptions {
        edition: config.edition.clone(),
        author: config.author.clone(),
        source_url: config.site_url(),
        navigation: config.navigation,
    };
    let docs = render(&tree, &glossary, &opts)?;
    let glossary_json = glossary.to_json()?;

    // --- Phase 4: Write ---
    progress.phase("Writing output");
    // Both artifacts are staged before either is published; a failed
    // glossary commit rolls the output directory back.
    let staged_glossary = stage_file(&config.glossary_path, &glossary_json)?;
    let mut staged_docs = match docs.stage(&config.output_dir) {
        Ok(staged) => staged,
        Err(e) => {
            staged_glossary.discard();
            return Err(e);
        }
    };
    if let Err(e) = staged_docs.publish() {
        staged_glossary.discard();
        return Err(e);
    }
    if let Err(e) = staged_glossary.commit() {
        staged_docs.rollback();
        return Err(e);
    }
    staged_docs.finish();

    let result = BuildResult {
        output_dir: config.output_dir.clone(),
        glossary_path: config.glossary_path.clone(),
        file_count: docs.files.len(),
        note_count: tree.note_count(),
        glossary_terms: glossary.len(),
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        files = result.file_count,
        notes = result.note_count,
        glossary_terms = result.glossary_terms,
        elapsed_ms = result.elapsed.as_millis(),
        "build complete"
    );

    Ok(result)
}

async fn load_notes(config: &BuildConfig) -> Result<NoteStream> {
    match &config.notes_file {
        Some(path) => load_notes_file(path),
        None => NoteFetcher::new(&config.fetch)?.fetch(&config.edition).await,
    }
}

/// Check an output directory against its `manifest.json`.
///
/// Every listed file must exist with the recorded size and hash, and no
/// unlisted Markdown file may be present.
#[instrument]
pub fn verify_output(dir: &Path) -> Result<BuildManifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(VinayaError::validation(format!(
            "missing {MANIFEST_FILE} in {}",
            dir.display()
        )));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| VinayaError::io(&manifest_path, e))?;
    let manifest: BuildManifest = serde_json::from_str(&content)
        .map_err(|e| VinayaError::validation(format!("invalid {MANIFEST_FILE}: {e}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(VinayaError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    for file in &manifest.files {
        let path = dir.join(&file.path);
        let contents = std::fs::read_to_string(&path).map_err(|_| {
            VinayaError::validation(format!("missing or unreadable file: {}", file.path))
        })?;
        if contents.len() != file.size_bytes || sha256_hex(&contents) != file.sha256 {
            return Err(VinayaError::validation(format!(
                "file does not match manifest: {}",
                file.path
            )));
        }
    }

    let listed: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
    let entries = std::fs::read_dir(dir).map_err(|e| VinayaError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| VinayaError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".md") && !listed.contains(&name.as_str()) {
            return Err(VinayaError::validation(format!(
                "file not listed in manifest: {name}"
            )));
        }
    }

    info!(files = manifest.files.len(), "output verified");
    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
