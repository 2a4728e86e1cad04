//! crates/learning_module_core/src/memory.rs
//!
//! An in-process `ModuleStore`. Used by the test suites and by the API when no
//! database is configured.

use crate::domain::{GeneratedAssets, Module, ModuleStatus, NewModule};
use crate::ports::{ModuleStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Modules are kept in insertion order, so `list` only has to reverse.
#[derive(Default)]
pub struct InMemoryModuleStore {
    modules: RwLock<Vec<Module>>,
}

impl InMemoryModuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: Uuid) -> PortError {
    PortError::NotFound(format!("Module {} not found", id))
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    async fn list(&self) -> PortResult<Vec<Module>> {
        let modules = self.modules.read().await;
        Ok(modules.iter().rev().cloned().collect())
    }

    async fn get(&self, id: Uuid) -> PortResult<Module> {
        let modules = self.modules.read().await;
        modules
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create(&self, new_module: NewModule) -> PortResult<Module> {
        if new_module.title.trim().is_empty() {
            return Err(PortError::Invalid("Module validation failed: title is required".to_string()));
        }
        let module = Module::new_draft(new_module);
        self.modules.write().await.push(module.clone());
        Ok(module)
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        let mut modules = self.modules.write().await;
        let before = modules.len();
        modules.retain(|m| m.id != id);
        if modules.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ModuleStatus) -> PortResult<Module> {
        let mut modules = self.modules.write().await;
        let module = modules
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(id))?;
        module.status = status;
        module.updated_at = Utc::now();
        Ok(module.clone())
    }

    async fn commit_assets(&self, id: Uuid, assets: GeneratedAssets) -> PortResult<Module> {
        let mut modules = self.modules.write().await;
        let module = modules
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(id))?;
        module.apply_assets(assets);
        Ok(module.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_module(title: &str) -> NewModule {
        NewModule {
            title: title.to_string(),
            description: String::new(),
            original_content: "Some text.".to_string(),
        }
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = InMemoryModuleStore::new();
        let first = store.create(new_module("first")).await.unwrap();
        let second = store.create(new_module("second")).await.unwrap();

        let ids: Vec<Uuid> = store.list().await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn rejects_blank_title() {
        let store = InMemoryModuleStore::new();
        let err = store.create(new_module("   ")).await.unwrap_err();
        assert!(matches!(err, PortError::Invalid(_)));
    }

    #[tokio::test]
    async fn missing_module_is_not_found() {
        let store = InMemoryModuleStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id).await, Err(PortError::NotFound(_))));
        assert!(matches!(store.delete(id).await, Err(PortError::NotFound(_))));
    }
}
