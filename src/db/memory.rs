// src/db/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{common::error::AppError, db::flow_repo::FlowStore};
use crate::models::flow::Flow;

/// Armazenamento em memória, substituto do antigo array global de flows.
/// Usado pelos testes; obedece ao mesmo contrato de versão do repositório
/// de verdade.
#[derive(Default)]
pub struct MemoryFlowStore {
    flows: RwLock<HashMap<Uuid, Flow>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn list(&self) -> Result<Vec<Flow>, AppError> {
        let flows = self.flows.read().await;
        let mut todos: Vec<Flow> = flows.values().cloned().collect();
        todos.sort_by_key(|f| f.created_at);
        Ok(todos)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Flow>, AppError> {
        Ok(self.flows.read().await.get(&id).cloned())
    }

    async fn insert(&self, flow: &Flow) -> Result<(), AppError> {
        self.flows.write().await.insert(flow.id, flow.clone());
        Ok(())
    }

    async fn save(&self, flow: &Flow) -> Result<(), AppError> {
        let mut flows = self.flows.write().await;
        let atual = flows.get(&flow.id).ok_or(AppError::FlowNotFound)?;
        if atual.version != flow.version - 1 {
            return Err(AppError::VersionConflict);
        }
        flows.insert(flow.id, flow.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.flows.write().await.remove(&id).is_some())
    }
}
