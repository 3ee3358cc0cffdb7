//! Workspace Engine
//!
//! Executes commands inside per-workspace sandboxes and maintains code
//! intelligence for them. It includes:
//! - Sandbox executor with scoped file access and preset commands
//! - Background task scheduler with persisted status and output
//! - Codebase indexer (files, symbols, dependencies)
//! - Semantic search over embedded file chunks
//! - File change feed with watermark polling
//! - A tagged `Request` dispatcher shared by the CLI and any embedding host

pub mod commands;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use commands::{dispatch, dispatch_json, Request};
pub use models::response::CommandResponse;
pub use models::settings::EngineConfig;
pub use state::EngineState;
pub use utils::error::{AppError, AppResult, ErrorKind};
