//! Core domain logic and pipeline orchestration for vinaya-notes.
//!
//! This crate resolves notes to their structural positions, assembles the
//! document tree, accumulates the glossary, renders Markdown, and ties those
//! steps into the end-to-end `build` workflow.

pub mod assembler;
pub mod glossary;
pub mod pipeline;
pub mod render;
pub mod resolver;

pub use assembler::{DocumentNode, DocumentTree, NodeId, assemble, natural_cmp};
pub use glossary::{Glossary, normalize_term};
pub use pipeline::{
    BuildConfig, BuildResult, ProgressReporter, SilentProgress, run_build, verify_output,
};
pub use render::{RenderOptions, RenderedDocs, RenderedFile, StagedOutput, render};
pub use resolver::ScidMap;
