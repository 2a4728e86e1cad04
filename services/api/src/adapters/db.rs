//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ModuleStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learning_module_core::domain::{
    Flashcard, GeneratedAssets, Module, ModuleStatus, NewModule, QuizQuestion,
};
use learning_module_core::ports::{ModuleStore, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const MODULE_COLUMNS: &str = "id, title, description, original_content, summary, concepts, \
     flashcards, quiz, status, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ModuleStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ModuleRecord {
    id: Uuid,
    title: String,
    description: String,
    original_content: String,
    summary: String,
    concepts: Json<Vec<String>>,
    flashcards: Json<Vec<Flashcard>>,
    quiz: Json<Vec<QuizQuestion>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ModuleRecord {
    fn to_domain(self) -> PortResult<Module> {
        let status = ModuleStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Module {} has an unknown status '{}'",
                self.id, self.status
            ))
        })?;
        Ok(Module {
            id: self.id,
            title: self.title,
            description: self.description,
            original_content: self.original_content,
            summary: self.summary,
            concepts: self.concepts.0,
            flashcards: self.flashcards.0,
            quiz: self.quiz.0,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn map_fetch_error(id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("Module {} not found", id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `ModuleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModuleStore for DbAdapter {
    async fn list(&self) -> PortResult<Vec<Module>> {
        let records = sqlx::query_as::<_, ModuleRecord>(&format!(
            "SELECT {} FROM modules ORDER BY created_at DESC",
            MODULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get(&self, id: Uuid) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "SELECT {} FROM modules WHERE id = $1",
            MODULE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fetch_error(id))?;
        record.to_domain()
    }

    async fn create(&self, new_module: NewModule) -> PortResult<Module> {
        if new_module.title.trim().is_empty() {
            return Err(PortError::Invalid(
                "Module validation failed: title is required".to_string(),
            ));
        }
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "INSERT INTO modules (id, title, description, original_content, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            MODULE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_module.title)
        .bind(&new_module.description)
        .bind(&new_module.original_content)
        .bind(ModuleStatus::Draft.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        record.to_domain()
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM modules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Module {} not found", id)));
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ModuleStatus) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "UPDATE modules SET status = $1, updated_at = now() WHERE id = $2 RETURNING {}",
            MODULE_COLUMNS
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fetch_error(id))?;
        record.to_domain()
    }

    async fn commit_assets(&self, id: Uuid, assets: GeneratedAssets) -> PortResult<Module> {
        // A single UPDATE, so readers see either the old artifact set or the new one.
        let record = sqlx::query_as::<_, ModuleRecord>(&format!(
            "UPDATE modules SET summary = $1, concepts = $2, flashcards = $3, quiz = $4, \
             status = $5, updated_at = now() WHERE id = $6 RETURNING {}",
            MODULE_COLUMNS
        ))
        .bind(&assets.summary)
        .bind(Json(&assets.concepts))
        .bind(Json(&assets.flashcards))
        .bind(Json(&assets.quiz))
        .bind(ModuleStatus::Completed.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_fetch_error(id))?;
        record.to_domain()
    }
}
