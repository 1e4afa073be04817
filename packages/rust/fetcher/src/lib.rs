//! Note retrieval from the content API.
//!
//! This crate provides:
//! - [`NoteFetcher`]: paginated, concurrent note download for one edition
//! - [`RetryingClient`]: GET with bounded retries for transient failures
//! - [`ResponseCache`]: on-disk response cache keyed by URL
//! - [`load_notes_file`]: the same payloads read from disk

pub mod cache;
pub mod client;
pub mod notes;

pub use cache::ResponseCache;
pub use client::RetryingClient;
pub use notes::{MAX_PAGES, NoteFetcher, NoteStream, load_notes_file};
