//! Segment ID resolution: scid → structural path.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use vinaya_notes_fetcher::RetryingClient;
use vinaya_notes_shared::{Result, VinayaError};

/// Label separator accepted in the joined-string form of a path.
const PATH_SEPARATOR: char = '/';

/// A path as written in `scidmap.json`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPath {
    Labels(Vec<String>),
    Joined(String),
}

impl RawPath {
    fn into_labels(self) -> Vec<String> {
        match self {
            Self::Labels(labels) => labels.into_iter().map(|l| l.trim().to_string()).collect(),
            Self::Joined(joined) => joined
                .split(PATH_SEPARATOR)
                .map(|l| l.trim().to_string())
                .collect(),
        }
    }
}

/// Immutable map from canonical segment identifier to structural path.
///
/// Lookups are exact-match and never touch the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScidMap {
    paths: HashMap<String, Vec<String>>,
}

impl ScidMap {
    /// Parse a `scidmap.json` document.
    ///
    /// Each value is either an array of labels or a single `/`-joined string.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, RawPath> = serde_json::from_str(json)
            .map_err(|e| VinayaError::parse(format!("invalid scid map: {e}")))?;

        Self::from_paths(raw.into_iter().map(|(scid, path)| (scid, path.into_labels())))
    }

    /// Build a map from `(scid, path)` pairs, rejecting empty paths and labels.
    pub fn from_paths<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: Into<String>,
    {
        let mut paths = HashMap::new();
        for (scid, path) in entries {
            let scid = scid.into();
            if path.is_empty() {
                return Err(VinayaError::parse(format!(
                    "invalid scid map: '{scid}' has an empty path"
                )));
            }
            if path.iter().any(|label| label.trim().is_empty()) {
                return Err(VinayaError::parse(format!(
                    "invalid scid map: '{scid}' has an empty section label"
                )));
            }
            paths.insert(scid, path);
        }
        Ok(Self { paths })
    }

    /// Read and parse a scid map from a local file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VinayaError::io(path, e))?;
        let map = Self::from_json(&content)?;
        debug!(path = %path.display(), entries = map.len(), "loaded scid map");
        Ok(map)
    }

    /// Load a scid map from a local path or an `http(s)` URL.
    #[instrument(skip(client))]
    pub async fn load_source(source: &str, client: &RetryingClient) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let body = client.get_text(source).await?;
            let map = Self::from_json(&body)?;
            info!(entries = map.len(), "downloaded scid map");
            Ok(map)
        } else {
            Self::load(Path::new(source))
        }
    }

    /// Structural path for `scid`.
    pub fn resolve(&self, scid: &str) -> Result<&[String]> {
        self.paths
            .get(scid)
            .map(Vec::as_slice)
            .ok_or_else(|| VinayaError::unresolved(scid))
    }

    pub fn contains(&self, scid: &str) -> bool {
        self.paths.contains_key(scid)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All `(scid, path)` entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
