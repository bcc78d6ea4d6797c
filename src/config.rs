// src/config.rs

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{env, sync::Arc, time::Duration};

use crate::{db::flow_repo::FlowRepository, services::flow_service::FlowService};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub flow_service: FlowService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let flow_repo = FlowRepository::new(db_pool.clone());
        let flow_service = FlowService::new(Arc::new(flow_repo));

        Ok(Self {
            db_pool,
            flow_service,
        })
    }
}
