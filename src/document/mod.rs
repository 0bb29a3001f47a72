//! Document state management and text utilities.
//!
//! This module provides:
//! - `LineIndex` and `TextDocument` for byte offset <-> LSP position conversion
//! - `RegionIndex` for embedded-language regions and per-language projections
//! - `DocumentCache` for bounded memoisation of derived artifacts
//! - `DocumentStore` for open document lifecycle management

mod cache;
mod region;
mod state;
mod text;

pub use cache::{CacheConfig, DocumentCache};
pub use region::{DocumentRegions, LanguageRange, Region, RegionIndex};
pub use state::DocumentStore;
pub use text::{LineIndex, TextDocument};
