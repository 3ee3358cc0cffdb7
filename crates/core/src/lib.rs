//! Workspace Engine Core
//!
//! Dependency-light building blocks shared by the workspace engine. Nothing in
//! this crate touches processes, storage, or the network.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `symbols` - Per-language tokenizers that extract `(name, kind, line)` tuples
//! - `manifest` - Dependency manifest parsing (npm, cargo, pip, go)
//! - `chunking` - Line-boundary content chunking for embeddings

pub mod chunking;
pub mod error;
pub mod manifest;
pub mod symbols;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Symbols ────────────────────────────────────────────────────────────
pub use symbols::{
    detect_language, LanguageTokenizer, RegexTokenizer, Symbol, SymbolKind, SymbolToken,
    TokenizerRegistry,
};

// ── Manifests ──────────────────────────────────────────────────────────
pub use manifest::{parse_manifest, Dependency, DependencyType, MANIFEST_FILES};

// ── Chunking ───────────────────────────────────────────────────────────
pub use chunking::{chunk_by_lines, TextChunk};
