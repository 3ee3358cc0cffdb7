//! Workspace Directory
//!
//! Maps workspace ids to their owner and root directory. Workspaces are
//! created externally; the engine only registers and looks them up.
//!
//! Resolution order for `authorize`:
//! 1. explicitly registered workspaces
//! 2. `<workspaces_root>/<owner>/<id>` when a workspaces root is configured,
//!    registered on first successful lookup

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::settings::WorkspaceEntry;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::validate_workspace_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub owner: String,
    /// Canonical root directory
    pub root: PathBuf,
}

#[derive(Debug, Default)]
pub struct WorkspaceDirectory {
    registered: DashMap<String, Workspace>,
    workspaces_root: Option<PathBuf>,
}

impl WorkspaceDirectory {
    pub fn new(workspaces_root: Option<PathBuf>) -> Self {
        Self {
            registered: DashMap::new(),
            workspaces_root,
        }
    }

    /// Build a directory pre-populated from config entries.
    pub fn from_entries(
        workspaces_root: Option<PathBuf>,
        entries: &[WorkspaceEntry],
    ) -> AppResult<Self> {
        let directory = Self::new(workspaces_root);
        for entry in entries {
            directory.register(&entry.id, &entry.owner, &entry.root)?;
        }
        Ok(directory)
    }

    /// Register a workspace. The root must exist.
    pub fn register(&self, id: &str, owner: &str, root: &Path) -> AppResult<Workspace> {
        validate_workspace_id(id)?;
        if owner.trim().is_empty() {
            return Err(AppError::validation("workspace owner must not be empty"));
        }
        let root = root.canonicalize().map_err(|e| {
            AppError::not_found(format!("workspace root {}: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(AppError::validation(format!(
                "workspace root {} is not a directory",
                root.display()
            )));
        }

        let workspace = Workspace {
            id: id.to_string(),
            owner: owner.to_string(),
            root,
        };
        self.registered.insert(id.to_string(), workspace.clone());
        debug!(workspace_id = %id, root = %workspace.root.display(), "Registered workspace");
        Ok(workspace)
    }

    /// Look up a workspace by id without an ownership check.
    pub fn resolve(&self, id: &str) -> AppResult<Workspace> {
        validate_workspace_id(id)?;
        self.registered
            .get(id)
            .map(|ws| ws.clone())
            .ok_or_else(|| AppError::not_found(format!("workspace {}", id)))
    }

    /// Look up a workspace on behalf of `owner`.
    ///
    /// A workspace owned by someone else is reported exactly like a missing one.
    pub fn authorize(&self, id: &str, owner: &str) -> AppResult<Workspace> {
        validate_workspace_id(id)?;

        if let Some(ws) = self.registered.get(id) {
            return if ws.owner == owner {
                Ok(ws.clone())
            } else {
                Err(AppError::not_found(format!("workspace {}", id)))
            };
        }

        let candidate = self
            .workspaces_root
            .as_ref()
            .filter(|_| validate_workspace_id(owner).is_ok())
            .map(|root| root.join(owner).join(id))
            .filter(|path| path.is_dir());

        match candidate {
            Some(path) => self.register(id, owner, &path),
            None => Err(AppError::not_found(format!("workspace {}", id))),
        }
    }

    pub fn list(&self) -> Vec<Workspace> {
        let mut all: Vec<Workspace> = self.registered.iter().map(|ws| ws.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}
