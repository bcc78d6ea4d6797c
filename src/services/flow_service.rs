// src/services/flow_service.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::flow_repo::FlowStore,
    models::field::Field,
    models::flow::{Card, FieldValues, Flow, Stage, StageDeletePolicy, StageUpdate},
};

/// Orquestra as operações sobre agregados Flow: carrega do armazenamento,
/// aplica a mutação no agregado e grava de volta.
///
/// O flow é a unidade de consistência, então cada flow admite UMA mutação
/// em voo por vez: o cadeado do flow é segurado durante todo o ciclo
/// carregar-mutar-salvar. A checagem otimista de versão no armazenamento
/// cobre o caso de mais de um processo atrás do mesmo banco.
#[derive(Clone)]
pub struct FlowService {
    store: Arc<dyn FlowStore>,
    locks: Arc<StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl FlowService {
    pub fn new(store: Arc<dyn FlowStore>) -> Self {
        Self {
            store,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, flow_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(flow_id).or_default().clone()
    }

    /// Ciclo padrão de mutação: serializa por flow, recarrega o agregado,
    /// aplica `op`, incrementa a versão e grava. Se `op` falhar, nada é
    /// gravado — sem efeito parcial.
    async fn mutate<R>(
        &self,
        flow_id: Uuid,
        op: impl FnOnce(&mut Flow) -> Result<R, AppError>,
    ) -> Result<(Flow, R), AppError> {
        let lock = self.lock_for(flow_id);
        let _guard = lock.lock().await;

        let mut flow = self
            .store
            .get(flow_id)
            .await?
            .ok_or(AppError::FlowNotFound)?;
        let resultado = op(&mut flow)?;
        flow.version += 1;
        self.store.save(&flow).await?;

        Ok((flow, resultado))
    }

    // --- FLOWS ---

    pub async fn create_flow(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Flow, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::NameRequired);
        }
        let flow = Flow::new(name.trim(), description);
        self.store.insert(&flow).await?;
        tracing::info!(flow_id = %flow.id, "Flow criado");
        Ok(flow)
    }

    pub async fn list_flows(&self) -> Result<Vec<Flow>, AppError> {
        self.store.list().await
    }

    pub async fn get_flow(&self, flow_id: Uuid) -> Result<Flow, AppError> {
        self.store
            .get(flow_id)
            .await?
            .ok_or(AppError::FlowNotFound)
    }

    pub async fn update_flow(
        &self,
        flow_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        members: Option<u32>,
    ) -> Result<Flow, AppError> {
        let (flow, _) = self
            .mutate(flow_id, |flow| {
                if let Some(name) = name {
                    if name.trim().is_empty() {
                        return Err(AppError::NameRequired);
                    }
                    flow.name = name.trim().to_string();
                }
                if let Some(description) = description {
                    flow.description = description.to_string();
                }
                if let Some(members) = members {
                    flow.members = members;
                }
                Ok(())
            })
            .await?;
        Ok(flow)
    }

    pub async fn delete_flow(&self, flow_id: Uuid) -> Result<(), AppError> {
        let lock = self.lock_for(flow_id);
        let _guard = lock.lock().await;

        if !self.store.delete(flow_id).await? {
            return Err(AppError::FlowNotFound);
        }

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&flow_id);
        Ok(())
    }

    // --- STAGES ---

    pub async fn add_stage(&self, flow_id: Uuid, name: &str) -> Result<(Flow, Uuid), AppError> {
        self.mutate(flow_id, |flow| flow.add_stage(name)).await
    }

    pub async fn list_stages(&self, flow_id: Uuid) -> Result<Vec<Stage>, AppError> {
        Ok(self.get_flow(flow_id).await?.ordered_stages())
    }

    pub async fn update_stage(
        &self,
        flow_id: Uuid,
        stage_id: Uuid,
        update: StageUpdate,
    ) -> Result<Flow, AppError> {
        let (flow, _) = self
            .mutate(flow_id, |flow| flow.update_stage(stage_id, update))
            .await?;
        Ok(flow)
    }

    pub async fn remove_stage(
        &self,
        flow_id: Uuid,
        stage_id: Uuid,
        policy: StageDeletePolicy,
    ) -> Result<Flow, AppError> {
        let (flow, _) = self
            .mutate(flow_id, |flow| flow.remove_stage(stage_id, policy))
            .await?;
        Ok(flow)
    }

    // --- CAMPOS ---

    pub async fn add_flow_field(&self, flow_id: Uuid, field: Field) -> Result<Flow, AppError> {
        let (flow, _) = self.mutate(flow_id, |flow| flow.add_field(field)).await?;
        Ok(flow)
    }

    pub async fn add_stage_field(
        &self,
        flow_id: Uuid,
        stage_id: Uuid,
        field: Field,
    ) -> Result<Flow, AppError> {
        let (flow, _) = self
            .mutate(flow_id, |flow| flow.add_stage_field(stage_id, field))
            .await?;
        Ok(flow)
    }

    /// Visão derivada, calculada na hora: não passa pelo ciclo de mutação.
    pub async fn effective_fields(
        &self,
        flow_id: Uuid,
        stage_id: Uuid,
    ) -> Result<Vec<Field>, AppError> {
        self.get_flow(flow_id).await?.effective_fields(stage_id)
    }

    // --- CARDS ---

    pub async fn list_cards(&self, flow_id: Uuid, stage_id: Uuid) -> Result<Vec<Card>, AppError> {
        let flow = self.get_flow(flow_id).await?;
        Ok(flow.stage(stage_id)?.cards.clone())
    }

    pub async fn create_card(
        &self,
        flow_id: Uuid,
        stage_id: Uuid,
        title: &str,
        values: FieldValues,
    ) -> Result<(Flow, Uuid), AppError> {
        self.mutate(flow_id, |flow| flow.create_card(stage_id, title, values))
            .await
    }

    pub async fn update_card(
        &self,
        flow_id: Uuid,
        card_id: Uuid,
        title: Option<&str>,
        values: Option<FieldValues>,
    ) -> Result<Flow, AppError> {
        let (flow, _) = self
            .mutate(flow_id, |flow| flow.update_card(card_id, title, values))
            .await?;
        Ok(flow)
    }

    pub async fn delete_card(&self, flow_id: Uuid, card_id: Uuid) -> Result<Flow, AppError> {
        let (flow, _) = self
            .mutate(flow_id, |flow| flow.delete_card(card_id))
            .await?;
        Ok(flow)
    }

    pub async fn move_card(
        &self,
        flow_id: Uuid,
        card_id: Uuid,
        from_stage_id: Uuid,
        to_stage_id: Uuid,
    ) -> Result<Flow, AppError> {
        let (flow, _) = self
            .mutate(flow_id, |flow| {
                flow.move_card(card_id, from_stage_id, to_stage_id)
            })
            .await?;
        tracing::info!(%flow_id, %card_id, %from_stage_id, %to_stage_id, "Card movido");
        Ok(flow)
    }
}
