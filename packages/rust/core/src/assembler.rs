//! Document tree assembly.
//!
//! Places each note at the structural position its scid resolves to. The
//! tree is an arena of [`DocumentNode`]s with an explicit path index;
//! intermediate sections are created on first use and reused afterwards.
//!
//! Assembly is all-or-nothing: every note is resolved before the tree or the
//! glossary is touched.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, info, instrument};

use vinaya_notes_shared::{NoteRecord, Result};

use crate::glossary::Glossary;
use crate::resolver::ScidMap;

/// Index of a node in a [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A section in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    /// Section label; empty for the root.
    pub label: String,
    /// 0 for the root, 1 for top-level sections.
    pub depth: usize,
    /// Labels from the first level down to this node.
    pub path: Vec<String>,
    pub children: Vec<NodeId>,
    pub notes: Vec<NoteRecord>,
}

impl DocumentNode {
    fn new(path: Vec<String>) -> Self {
        Self {
            label: path.last().cloned().unwrap_or_default(),
            depth: path.len(),
            path,
            children: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// Arena-backed section tree.
///
/// After assembly the arena is laid out in depth-first pre-order, so two trees
/// built from the same notes compare equal whatever the input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    nodes: Vec<DocumentNode>,
    index: HashMap<Vec<String>, NodeId>,
    /// Scids from the scid map whose section exists in this tree.
    targets: HashMap<String, NodeId>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// A tree holding only the root.
    pub fn new() -> Self {
        let root = DocumentNode::new(Vec::new());
        let mut index = HashMap::new();
        index.insert(Vec::new(), NodeId(0));
        Self {
            nodes: vec![root],
            index,
            targets: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Node by id.
    ///
    /// Ids are only handed out by this tree, so indexing cannot go out of bounds.
    pub fn node(&self, id: NodeId) -> &DocumentNode {
        &self.nodes[id.0]
    }

    /// Node at exactly `path`, if one was created.
    pub fn find(&self, path: &[String]) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    /// Top-level sections, in order.
    pub fn top_level(&self) -> &[NodeId] {
        &self.nodes[0].children
    }

    /// Every node in depth-first pre-order, root first.
    pub fn walk(&self) -> Vec<NodeId> {
        self.descendants(self.root())
    }

    /// `id` and everything below it, depth-first pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.node(current).children.iter().rev().copied());
        }
        out
    }

    /// Total number of notes placed in the tree.
    pub fn note_count(&self) -> usize {
        self.nodes.iter().map(|n| n.notes.len()).sum()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Section a cross-reference to `scid` should point at.
    pub fn link_target(&self, scid: &str) -> Option<NodeId> {
        self.targets.get(scid).copied()
    }

    /// Create `path` and any missing ancestors; existing nodes are reused.
    fn ensure_path(&mut self, path: &[String]) -> NodeId {
        if let Some(id) = self.find(path) {
            return id;
        }

        let parent = self.ensure_path(&path[..path.len() - 1]);
        let id = NodeId(self.nodes.len());
        self.nodes.push(DocumentNode::new(path.to_vec()));
        self.nodes[parent.0].children.push(id);
        self.index.insert(path.to_vec(), id);
        id
    }

    /// Order children and notes, then lay the arena out in pre-order.
    fn finalize(mut self, map: &ScidMap) -> Self {
        for node in &mut self.nodes {
            node.notes.sort_by(|a, b| {
                natural_cmp(&a.scid, &b.scid)
                    .then_with(|| a.text.cmp(&b.text))
                    .then_with(|| a.author.cmp(&b.author))
            });
        }

        let labels: Vec<String> = self.nodes.iter().map(|n| n.label.clone()).collect();
        for node in &mut self.nodes {
            node.children
                .sort_by(|a, b| natural_cmp(&labels[a.0], &labels[b.0]));
        }

        let order = self.walk();
        let mut remap = vec![NodeId(0); self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            remap[old.0] = NodeId(new);
        }

        let mut old_nodes: Vec<Option<DocumentNode>> = self.nodes.into_iter().map(Some).collect();
        let mut nodes = Vec::with_capacity(old_nodes.len());
        for old in &order {
            if let Some(mut node) = old_nodes[old.0].take() {
                node.children = node.children.iter().map(|c| remap[c.0]).collect();
                nodes.push(node);
            }
        }

        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.path.clone(), NodeId(i)))
            .collect::<HashMap<_, _>>();

        let targets = map
            .iter()
            .filter_map(|(scid, path)| index.get(path).map(|id| (scid.to_string(), *id)))
            .collect();

        Self {
            nodes,
            index,
            targets,
        }
    }
}

/// Build the document tree for `notes`, recording glossary markup as it goes.
///
/// Fails with `UnresolvedSegment` before anything is built if any note's scid
/// is absent from `map`. Glossary scanning follows the final tree order, so
/// first-seen semantics do not depend on the order notes arrived in.
#[instrument(skip_all, fields(scid_map = map.len()))]
pub fn assemble<I>(notes: I, map: &ScidMap, glossary: &mut Glossary) -> Result<DocumentTree>
where
    I: IntoIterator<Item = NoteRecord>,
{
    // Pass 1: resolve everything.
    let resolved = notes
        .into_iter()
        .map(|note| {
            let path = map.resolve(&note.scid)?.to_vec();
            Ok((path, note))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(notes = resolved.len(), "all notes resolved");

    // Pass 2: build.
    let mut tree = DocumentTree::new();
    for (path, note) in resolved {
        let id = tree.ensure_path(&path);
        tree.nodes[id.0].notes.push(note);
    }
    let tree = tree.finalize(map);

    for id in tree.walk() {
        for note in &tree.node(id).notes {
            glossary.scan(&note.scid, &note.text);
        }
    }

    info!(
        sections = tree.node_count() - 1,
        notes = tree.note_count(),
        glossary_terms = glossary.len(),
        "document tree assembled"
    );

    Ok(tree)
}

/// Compare strings with digit runs ordered numerically (`Pj 2` < `Pj 10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_numeric(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Split into alternating runs of ASCII digits and non-digits.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

fn is_digits(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit())
}

fn cmp_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}
