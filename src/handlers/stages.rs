// src/handlers/stages.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::flows::CreateFieldPayload,
    models::field::Field,
    models::flow::{Flow, Stage, StageDeletePolicy, StageUpdate},
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddStagePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Em Produção")]
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStageParams {
    /// O que fazer com os cards do stage: cascade (padrão), reject ou migrate.
    #[serde(default)]
    pub policy: StageDeletePolicy,
}

// =============================================================================
//  HANDLERS
// =============================================================================

// GET /api/flows/{flowId}/stages
#[utoipa::path(
    get,
    path = "/api/flows/{flowId}/stages",
    tag = "Stages",
    params(("flowId" = Uuid, Path, description = "ID do flow")),
    responses(
        (status = 200, description = "Stages do flow em ordem de exibição", body = Vec<Stage>),
        (status = 404, description = "Flow não encontrado")
    )
)]
pub async fn list_stages(
    State(app_state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let stages = app_state.flow_service.list_stages(flow_id).await?;
    Ok((StatusCode::OK, Json(stages)))
}

// POST /api/flows/{flowId}/stages
#[utoipa::path(
    post,
    path = "/api/flows/{flowId}/stages",
    tag = "Stages",
    params(("flowId" = Uuid, Path, description = "ID do flow")),
    request_body = AddStagePayload,
    responses(
        (status = 201, description = "Stage criado no fim do fluxo", body = Flow),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Flow não encontrado")
    )
)]
pub async fn add_stage(
    State(app_state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(payload): Json<AddStagePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (flow, _stage_id) = app_state
        .flow_service
        .add_stage(flow_id, &payload.name)
        .await?;

    Ok((StatusCode::CREATED, Json(flow)))
}

// PUT /api/flows/{flowId}/stages/{stageId}
#[utoipa::path(
    put,
    path = "/api/flows/{flowId}/stages/{stageId}",
    tag = "Stages",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("stageId" = Uuid, Path, description = "ID do stage")
    ),
    request_body = StageUpdate,
    responses(
        (status = 200, description = "Stage atualizado", body = Flow),
        (status = 404, description = "Flow ou stage não encontrado")
    )
)]
pub async fn update_stage(
    State(app_state): State<AppState>,
    Path((flow_id, stage_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<StageUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let flow = app_state
        .flow_service
        .update_stage(flow_id, stage_id, payload)
        .await?;

    Ok((StatusCode::OK, Json(flow)))
}

// DELETE /api/flows/{flowId}/stages/{stageId}?policy=...
#[utoipa::path(
    delete,
    path = "/api/flows/{flowId}/stages/{stageId}",
    tag = "Stages",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("stageId" = Uuid, Path, description = "ID do stage"),
        DeleteStageParams
    ),
    responses(
        (status = 204, description = "Stage excluído"),
        (status = 404, description = "Flow ou stage não encontrado"),
        (status = 409, description = "Política reject: o stage ainda possui cards")
    )
)]
pub async fn delete_stage(
    State(app_state): State<AppState>,
    Path((flow_id, stage_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<DeleteStageParams>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .flow_service
        .remove_stage(flow_id, stage_id, params.policy)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/flows/{flowId}/stages/{stageId}/fields
#[utoipa::path(
    get,
    path = "/api/flows/{flowId}/stages/{stageId}/fields",
    tag = "Stages",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("stageId" = Uuid, Path, description = "ID do stage")
    ),
    responses(
        (status = 200, description = "Conjunto efetivo de campos (próprios, do flow e herdados)", body = Vec<Field>),
        (status = 404, description = "Flow ou stage não encontrado")
    )
)]
pub async fn get_effective_fields(
    State(app_state): State<AppState>,
    Path((flow_id, stage_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let fields = app_state
        .flow_service
        .effective_fields(flow_id, stage_id)
        .await?;

    Ok((StatusCode::OK, Json(fields)))
}

// POST /api/flows/{flowId}/stages/{stageId}/fields
#[utoipa::path(
    post,
    path = "/api/flows/{flowId}/stages/{stageId}/fields",
    tag = "Stages",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("stageId" = Uuid, Path, description = "ID do stage")
    ),
    request_body = CreateFieldPayload,
    responses(
        (status = 201, description = "Campo de stage criado", body = Flow),
        (status = 400, description = "Definição inválida"),
        (status = 404, description = "Flow ou stage não encontrado")
    )
)]
pub async fn create_stage_field(
    State(app_state): State<AppState>,
    Path((flow_id, stage_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateFieldPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let flow = app_state
        .flow_service
        .add_stage_field(flow_id, stage_id, payload.into_field())
        .await?;

    Ok((StatusCode::CREATED, Json(flow)))
}
