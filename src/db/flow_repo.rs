// src/db/flow_repo.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use crate::{common::error::AppError, models::flow::Flow};

/// O colaborador de persistência: CRUD de agregados Flow inteiros.
///
/// O agregado é lido e gravado por completo; `save` faz a checagem
/// otimista de versão e devolve `VersionConflict` se outra operação
/// gravou no meio do caminho.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Flow>, AppError>;
    async fn get(&self, id: Uuid) -> Result<Option<Flow>, AppError>;
    async fn insert(&self, flow: &Flow) -> Result<(), AppError>;
    /// Espera `flow.version` já incrementado; grava somente se a versão
    /// armazenada for a imediatamente anterior.
    async fn save(&self, flow: &Flow) -> Result<(), AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

// O repositório de flows, responsável por todas as interações com a
// tabela 'flows'. Cada flow é um documento JSONB; a coluna `version`
// existe só para o UPDATE condicional.
#[derive(Clone)]
pub struct FlowRepository {
    pool: PgPool,
}

impl FlowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlowStore for FlowRepository {
    async fn list(&self) -> Result<Vec<Flow>, AppError> {
        let rows: Vec<Json<Flow>> =
            sqlx::query_scalar("SELECT data FROM flows ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Flow>, AppError> {
        let row: Option<Json<Flow>> = sqlx::query_scalar("SELECT data FROM flows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.0))
    }

    async fn insert(&self, flow: &Flow) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO flows (id, data, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(flow.id)
        .bind(Json(flow))
        .bind(flow.version)
        .bind(flow.created_at)
        .bind(flow.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, flow: &Flow) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE flows SET data = $2, version = $3, updated_at = $4 \
             WHERE id = $1 AND version = $5",
        )
        .bind(flow.id)
        .bind(Json(flow))
        .bind(flow.version)
        .bind(flow.updated_at)
        .bind(flow.version - 1)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distingue "não existe" de "alguém gravou antes".
            let atual: Option<i64> = sqlx::query_scalar("SELECT version FROM flows WHERE id = $1")
                .bind(flow.id)
                .fetch_optional(&self.pool)
                .await?;
            return match atual {
                Some(_) => Err(AppError::VersionConflict),
                None => Err(AppError::FlowNotFound),
            };
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM flows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
