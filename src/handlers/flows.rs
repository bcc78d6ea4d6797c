// src/handlers/flows.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::field::{Field, FieldType, FieldValidation, FieldValue, Visibility},
    models::flow::Flow,
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlowPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Funil de Vendas")]
    pub name: String,

    #[schema(example = "Fluxo padrão dos pedidos da loja")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlowPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub members: Option<u32>,
}

/// Payload de criação de campo, compartilhado entre campos de flow e de stage.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFieldPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Prioridade")]
    pub name: String,

    #[serde(rename = "type")]
    #[schema(example = "dropdown")]
    pub field_type: FieldType,

    #[serde(default)]
    #[schema(example = true)]
    pub required: bool,

    #[schema(example = json!(["Alta", "Média", "Baixa"]))]
    pub options: Option<Vec<String>>,

    pub default_value: Option<FieldValue>,
    pub validation: Option<FieldValidation>,
    pub visibility: Option<Visibility>,
    pub depends_on: Option<Uuid>,

    #[serde(default)]
    pub order: i32,
}

impl CreateFieldPayload {
    /// Materializa a definição com um id novo. A validação da definição
    /// em si (opções, valor padrão compatível) acontece no agregado.
    pub fn into_field(self) -> Field {
        Field {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            field_type: self.field_type,
            required: self.required,
            options: self.options,
            default_value: self.default_value,
            validation: self.validation,
            visibility: self.visibility,
            depends_on: self.depends_on,
            order: self.order,
            source_stage: None,
            read_only: false,
        }
    }
}

// =============================================================================
//  HANDLERS
// =============================================================================

// GET /api/flows
#[utoipa::path(
    get,
    path = "/api/flows",
    tag = "Flows",
    responses(
        (status = 200, description = "Lista de flows", body = Vec<Flow>)
    )
)]
pub async fn list_flows(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let flows = app_state.flow_service.list_flows().await?;
    Ok((StatusCode::OK, Json(flows)))
}

// POST /api/flows
#[utoipa::path(
    post,
    path = "/api/flows",
    tag = "Flows",
    request_body = CreateFlowPayload,
    responses(
        (status = 201, description = "Flow criado", body = Flow),
        (status = 400, description = "Dados inválidos")
    )
)]
pub async fn create_flow(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateFlowPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let flow = app_state
        .flow_service
        .create_flow(&payload.name, payload.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(flow)))
}

// GET /api/flows/{flowId}
#[utoipa::path(
    get,
    path = "/api/flows/{flowId}",
    tag = "Flows",
    params(("flowId" = Uuid, Path, description = "ID do flow")),
    responses(
        (status = 200, description = "Flow encontrado", body = Flow),
        (status = 404, description = "Flow não encontrado")
    )
)]
pub async fn get_flow(
    State(app_state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let flow = app_state.flow_service.get_flow(flow_id).await?;
    Ok((StatusCode::OK, Json(flow)))
}

// PUT /api/flows/{flowId}
#[utoipa::path(
    put,
    path = "/api/flows/{flowId}",
    tag = "Flows",
    params(("flowId" = Uuid, Path, description = "ID do flow")),
    request_body = UpdateFlowPayload,
    responses(
        (status = 200, description = "Flow atualizado", body = Flow),
        (status = 404, description = "Flow não encontrado")
    )
)]
pub async fn update_flow(
    State(app_state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(payload): Json<UpdateFlowPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let flow = app_state
        .flow_service
        .update_flow(
            flow_id,
            payload.name.as_deref(),
            payload.description.as_deref(),
            payload.members,
        )
        .await?;

    Ok((StatusCode::OK, Json(flow)))
}

// DELETE /api/flows/{flowId}
#[utoipa::path(
    delete,
    path = "/api/flows/{flowId}",
    tag = "Flows",
    params(("flowId" = Uuid, Path, description = "ID do flow")),
    responses(
        (status = 204, description = "Flow excluído"),
        (status = 404, description = "Flow não encontrado")
    )
)]
pub async fn delete_flow(
    State(app_state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.flow_service.delete_flow(flow_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/flows/{flowId}/fields
#[utoipa::path(
    post,
    path = "/api/flows/{flowId}/fields",
    tag = "Flows",
    params(("flowId" = Uuid, Path, description = "ID do flow")),
    request_body = CreateFieldPayload,
    responses(
        (status = 201, description = "Campo de flow criado", body = Flow),
        (status = 400, description = "Definição inválida"),
        (status = 404, description = "Flow não encontrado")
    )
)]
pub async fn create_flow_field(
    State(app_state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(payload): Json<CreateFieldPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let flow = app_state
        .flow_service
        .add_flow_field(flow_id, payload.into_field())
        .await?;

    Ok((StatusCode::CREATED, Json(flow)))
}
