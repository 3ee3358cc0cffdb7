//! In-flight Task Registry
//!
//! Tracks cancellation handles for tasks that are pending or running. The
//! registry is injected into the scheduler; the default implementation is a
//! TTL cache so handles of tasks that never report back are evicted.

use mini_moka::sync::Cache;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub workspace_id: String,
    pub cancel: CancellationToken,
}

pub trait TaskRegistry: Send + Sync {
    fn insert(&self, task_id: &str, handle: TaskHandle);
    fn get(&self, task_id: &str) -> Option<TaskHandle>;
    fn remove(&self, task_id: &str);
}

/// `TaskRegistry` backed by `mini_moka::sync::Cache`.
#[derive(Clone)]
pub struct MokaTaskRegistry {
    cache: Cache<String, TaskHandle>,
}

impl MokaTaskRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl TaskRegistry for MokaTaskRegistry {
    fn insert(&self, task_id: &str, handle: TaskHandle) {
        self.cache.insert(task_id.to_string(), handle);
    }

    fn get(&self, task_id: &str) -> Option<TaskHandle> {
        self.cache.get(&task_id.to_string())
    }

    fn remove(&self, task_id: &str) {
        self.cache.invalidate(&task_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> TaskHandle {
        TaskHandle {
            workspace_id: "ws1".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = MokaTaskRegistry::new(Duration::from_secs(60));
        registry.insert("t1", handle());

        let found = registry.get("t1").unwrap();
        assert_eq!(found.workspace_id, "ws1");

        registry.remove("t1");
        assert!(registry.get("t1").is_none());
    }

    #[test]
    fn test_cloned_handle_shares_token() {
        let registry = MokaTaskRegistry::new(Duration::from_secs(60));
        let original = handle();
        registry.insert("t1", original.clone());

        registry.get("t1").unwrap().cancel.cancel();
        assert!(original.cancel.is_cancelled());
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let registry = MokaTaskRegistry::new(Duration::from_millis(50));
        registry.insert("t1", handle());
        std::thread::sleep(Duration::from_millis(120));
        assert!(registry.get("t1").is_none());
    }
}
