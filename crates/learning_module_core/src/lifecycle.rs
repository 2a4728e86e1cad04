//! crates/learning_module_core/src/lifecycle.rs
//!
//! Owns the module `status` field. Every status write goes through
//! [`ModuleLifecycle::transition`], which rejects transitions the state machine
//! does not allow.

use crate::domain::{GeneratedAssets, Module, ModuleStatus};
use crate::ports::{ModuleStore, PortError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Events that drive the module status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// First generation run starts for a draft module.
    Start,
    /// A new run starts for a module that already has a committed artifact set.
    Regenerate,
    /// The run committed its artifacts.
    Succeed,
    /// A stage failed.
    Fail,
    /// The run was cancelled and the module had no committed artifacts.
    Cancel,
    /// The run was cancelled while the previous artifact set is still committed.
    Abandon,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::Start => "start",
            LifecycleEvent::Regenerate => "regenerate",
            LifecycleEvent::Succeed => "succeed",
            LifecycleEvent::Fail => "fail",
            LifecycleEvent::Cancel => "cancel",
            LifecycleEvent::Abandon => "abandon",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid transition: cannot apply '{event}' to a module in '{from}'")]
    InvalidTransition {
        from: ModuleStatus,
        event: LifecycleEvent,
    },
    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

/// Returns the status reached by applying `event` in `from`.
pub fn next_status(
    from: ModuleStatus,
    event: LifecycleEvent,
) -> Result<ModuleStatus, LifecycleError> {
    use LifecycleEvent::*;
    use ModuleStatus::*;

    match (from, event) {
        (Draft, Start) => Ok(Processing),
        (Completed, Regenerate) => Ok(Processing),
        (Processing, Succeed) => Ok(Completed),
        (Processing, Fail) | (Processing, Cancel) => Ok(Draft),
        (Processing, Abandon) => Ok(Completed),
        _ => Err(LifecycleError::InvalidTransition { from, event }),
    }
}

/// Applies validated status transitions to modules held by a [`ModuleStore`].
#[derive(Clone)]
pub struct ModuleLifecycle {
    store: Arc<dyn ModuleStore>,
}

impl ModuleLifecycle {
    pub fn new(store: Arc<dyn ModuleStore>) -> Self {
        Self { store }
    }

    /// Validates the transition against the module's current status and
    /// persists the new status.
    pub async fn transition(
        &self,
        module: &Module,
        event: LifecycleEvent,
    ) -> Result<ModuleStatus, LifecycleError> {
        let next = next_status(module.status, event).map_err(|e| {
            warn!(module_id = %module.id, "{}", e);
            e
        })?;
        self.store.set_status(module.id, next).await?;
        debug!(module_id = %module.id, from = %module.status, to = %next, %event, "Module status changed");
        Ok(next)
    }

    /// Reloads the module from the store and applies the transition.
    pub async fn transition_by_id(
        &self,
        module_id: uuid::Uuid,
        event: LifecycleEvent,
    ) -> Result<ModuleStatus, LifecycleError> {
        let module = self.store.get(module_id).await?;
        self.transition(&module, event).await
    }

    /// Commits a full artifact set, moving the module from `processing` to `completed`
    /// in the same store write.
    pub async fn complete(
        &self,
        module_id: uuid::Uuid,
        assets: GeneratedAssets,
    ) -> Result<Module, LifecycleError> {
        let module = self.store.get(module_id).await?;
        next_status(module.status, LifecycleEvent::Succeed)?;
        let module = self.store.commit_assets(module_id, assets).await?;
        debug!(%module_id, "Module assets committed");
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewModule;
    use crate::memory::InMemoryModuleStore;

    #[test]
    fn allowed_transitions() {
        use LifecycleEvent::*;
        use ModuleStatus::*;
        assert_eq!(next_status(Draft, Start), Ok(Processing));
        assert_eq!(next_status(Completed, Regenerate), Ok(Processing));
        assert_eq!(next_status(Processing, Succeed), Ok(Completed));
        assert_eq!(next_status(Processing, Fail), Ok(Draft));
        assert_eq!(next_status(Processing, Cancel), Ok(Draft));
        assert_eq!(next_status(Processing, Abandon), Ok(Completed));
    }

    #[test]
    fn everything_else_is_rejected() {
        use LifecycleEvent::*;
        use ModuleStatus::*;
        let rejected = [
            (Draft, Succeed),
            (Draft, Fail),
            (Draft, Regenerate),
            (Draft, Cancel),
            (Completed, Start),
            (Completed, Succeed),
            (Completed, Fail),
            (Processing, Start),
            (Processing, Regenerate),
        ];
        for (from, event) in rejected {
            assert_eq!(
                next_status(from, event),
                Err(LifecycleError::InvalidTransition { from, event })
            );
        }
    }

    #[tokio::test]
    async fn transition_persists_status() {
        let store = Arc::new(InMemoryModuleStore::new());
        let module = store
            .create(NewModule {
                title: "Cells".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let lifecycle = ModuleLifecycle::new(store.clone());

        let status = lifecycle.transition(&module, LifecycleEvent::Start).await.unwrap();
        assert_eq!(status, ModuleStatus::Processing);
        assert_eq!(store.get(module.id).await.unwrap().status, ModuleStatus::Processing);

        let err = lifecycle
            .transition_by_id(module.id, LifecycleEvent::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert_eq!(store.get(module.id).await.unwrap().status, ModuleStatus::Processing);
    }
}
