//! Path Utilities
//!
//! Engine directories (`~/.workspace-engine/`), workspace id validation, and
//! confinement of caller-supplied paths to a workspace root.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the engine directory (~/.workspace-engine/)
pub fn engine_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".workspace-engine"))
}

/// Get the config file path (~/.workspace-engine/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(engine_dir()?.join("config.json"))
}

/// Get the database file path (~/.workspace-engine/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(engine_dir()?.join("data.db"))
}

fn workspace_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]{1,128}$").ok())
        .as_ref()
}

/// Workspace ids are non-empty, `[A-Za-z0-9_.-]` only, and never contain `..`.
pub fn validate_workspace_id(id: &str) -> AppResult<()> {
    let pattern = workspace_id_pattern()
        .ok_or_else(|| AppError::internal("workspace id pattern failed to compile"))?;
    if !pattern.is_match(id) || id.contains("..") {
        return Err(AppError::validation(format!("invalid workspace id: {:?}", id)));
    }
    Ok(())
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// Returns `None` when `..` would climb above the filesystem root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Resolve `relative` against the workspace `root`, refusing anything that
/// lands outside it.
///
/// Rejects `..` escapes, absolute paths outside the root, and symlinks (on the
/// path itself or any existing ancestor) whose target is outside the root. The
/// target does not need to exist.
pub fn resolve_within_root(root: &Path, relative: &str) -> AppResult<PathBuf> {
    let canonical_root = root.canonicalize().map_err(|e| {
        AppError::not_found(format!("workspace root {}: {}", root.display(), e))
    })?;

    let requested = Path::new(relative);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        canonical_root.join(requested)
    };

    let normalized = normalize_lexically(&joined)
        .filter(|p| p.starts_with(&canonical_root))
        .ok_or_else(|| AppError::path_violation(format!("{} escapes the workspace", relative)))?;

    // Walk up to the deepest existing ancestor and check where it really points.
    let mut probe = normalized.as_path();
    loop {
        if let Ok(meta) = std::fs::symlink_metadata(probe) {
            let real = probe.canonicalize().map_err(|_| {
                if meta.file_type().is_symlink() {
                    AppError::path_violation(format!("{} is a dangling symlink", relative))
                } else {
                    AppError::path_violation(format!("{} cannot be resolved", relative))
                }
            })?;
            if !real.starts_with(&canonical_root) {
                return Err(AppError::path_violation(format!(
                    "{} resolves outside the workspace",
                    relative
                )));
            }
            break;
        }
        match probe.parent() {
            Some(parent) => probe = parent,
            None => break,
        }
    }

    Ok(normalized)
}

/// Express `path` relative to `root` with forward slashes.
pub fn relative_to_root(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
