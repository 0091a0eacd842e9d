use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{log_migration, plan_migration, Migration, StoreError, ViewStore};

/// Volatile store with the same semantics as the log store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewStore for MemoryStore {
    fn get_views(&self, id: &str) -> Result<u64, StoreError> {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(counters.get(id).copied().unwrap_or(0))
    }

    fn inc_views(&self, id: &str) -> Result<u64, StoreError> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let views = counters.entry(id.to_string()).or_insert(0);
        *views += 1;
        Ok(*views)
    }

    fn migrate(&self, old_id: &str, new_id: &str) -> Result<Migration, StoreError> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = plan_migration(
            old_id,
            counters.get(old_id).copied(),
            new_id,
            counters.get(new_id).copied(),
        );
        if let Migration::Moved(views) = outcome {
            counters.remove(old_id);
            counters.insert(new_id.to_string(), views);
        }
        log_migration(old_id, new_id, outcome);
        Ok(outcome)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(counters.remove(id).is_some())
    }
}
