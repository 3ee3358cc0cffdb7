//! File Change Commands

use crate::models::change::FileChangeEvent;
use crate::models::response::CommandResponse;
use crate::state::EngineState;

/// Changes recorded after the caller's watermark, oldest first. Pass the last
/// returned `timestamp` as `since` on the next call.
pub async fn poll_changes(
    state: &EngineState,
    owner: &str,
    workspace_id: &str,
    since: i64,
) -> CommandResponse<Vec<FileChangeEvent>> {
    let result = async {
        state.directory().authorize(workspace_id, owner)?;
        state.watcher().changes_since(workspace_id, since).await
    }
    .await;
    result.into()
}
