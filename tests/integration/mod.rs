//! Integration Tests Module
//!
//! End-to-end tests that drive the engine through `dispatch`, the same entry
//! point the CLI uses. Every test builds its own `EngineState` over an
//! in-memory database and temporary workspace directories.

// Shared engine fixture
mod support;

// Command execution and scoped file access
mod sandbox_test;

// Background task lifecycle
mod task_test;

// Codebase index builds, status and symbol lookup
mod index_test;

// Embedding generation and semantic search
mod search_test;

// File change feed
mod changes_test;
