//! Shared types, error model, and configuration for vinaya-notes.
//!
//! This crate is the foundation depended on by all other vinaya-notes crates.
//! It provides:
//! - [`VinayaError`]: the unified error type
//! - Domain types ([`NoteRecord`], [`GlossaryEntry`], [`BuildManifest`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, FetchSettings, GlossaryConfig, OutputConfig, SourceConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, VinayaError};
pub use types::{
    BuildManifest, CURRENT_SCHEMA_VERSION, GlossaryEntry, ManifestFile, MergePolicy, NotePage,
    NoteRecord, NotesPayload,
};
