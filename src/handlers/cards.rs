// src/handlers/cards.rs

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
    models::flow::{Card, FieldValues, Flow},
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Pedido #1042")]
    pub title: String,

    /// Valores iniciais, por nome do campo. Campos ausentes recebem o
    /// valor padrão da definição.
    #[serde(default)]
    pub fields: FieldValues,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardPayload {
    #[validate(length(min = 1, message = "required"))]
    pub title: Option<String>,
    pub fields: Option<FieldValues>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveCardPayload {
    pub from_stage_id: Uuid,
    pub to_stage_id: Uuid,
}

// =============================================================================
//  HANDLERS
// =============================================================================

// GET /api/flows/{flowId}/stages/{stageId}/cards
#[utoipa::path(
    get,
    path = "/api/flows/{flowId}/stages/{stageId}/cards",
    tag = "Cards",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("stageId" = Uuid, Path, description = "ID do stage")
    ),
    responses(
        (status = 200, description = "Cards do stage", body = Vec<Card>),
        (status = 404, description = "Flow ou stage não encontrado")
    )
)]
pub async fn list_cards(
    State(app_state): State<AppState>,
    Path((flow_id, stage_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let cards = app_state.flow_service.list_cards(flow_id, stage_id).await?;
    Ok((StatusCode::OK, Json(cards)))
}

// POST /api/flows/{flowId}/stages/{stageId}/cards
#[utoipa::path(
    post,
    path = "/api/flows/{flowId}/stages/{stageId}/cards",
    tag = "Cards",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("stageId" = Uuid, Path, description = "ID do stage")
    ),
    request_body = CreateCardPayload,
    responses(
        (status = 201, description = "Card criado", body = Flow),
        (status = 400, description = "Título ausente, campo obrigatório vazio ou valor incompatível"),
        (status = 404, description = "Flow ou stage não encontrado")
    )
)]
pub async fn create_card(
    State(app_state): State<AppState>,
    Path((flow_id, stage_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateCardPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (flow, _card_id) = app_state
        .flow_service
        .create_card(flow_id, stage_id, &payload.title, payload.fields)
        .await?;

    Ok((StatusCode::CREATED, Json(flow)))
}

// PUT /api/flows/{flowId}/cards/{cardId}
#[utoipa::path(
    put,
    path = "/api/flows/{flowId}/cards/{cardId}",
    tag = "Cards",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("cardId" = Uuid, Path, description = "ID do card")
    ),
    request_body = UpdateCardPayload,
    responses(
        (status = 200, description = "Card atualizado", body = Flow),
        (status = 400, description = "Valor incompatível com a definição do campo"),
        (status = 404, description = "Flow ou card não encontrado")
    )
)]
pub async fn update_card(
    State(app_state): State<AppState>,
    Path((flow_id, card_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCardPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let flow = app_state
        .flow_service
        .update_card(flow_id, card_id, payload.title.as_deref(), payload.fields)
        .await?;

    Ok((StatusCode::OK, Json(flow)))
}

// DELETE /api/flows/{flowId}/cards/{cardId}
#[utoipa::path(
    delete,
    path = "/api/flows/{flowId}/cards/{cardId}",
    tag = "Cards",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("cardId" = Uuid, Path, description = "ID do card")
    ),
    responses(
        (status = 204, description = "Card excluído"),
        (status = 404, description = "Flow ou card não encontrado")
    )
)]
pub async fn delete_card(
    State(app_state): State<AppState>,
    Path((flow_id, card_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    app_state.flow_service.delete_card(flow_id, card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/flows/{flowId}/cards/{cardId}/move
#[utoipa::path(
    post,
    path = "/api/flows/{flowId}/cards/{cardId}/move",
    tag = "Cards",
    params(
        ("flowId" = Uuid, Path, description = "ID do flow"),
        ("cardId" = Uuid, Path, description = "ID do card")
    ),
    request_body = MoveCardPayload,
    responses(
        (status = 200, description = "Card movido, com histórico registrado", body = Flow),
        (status = 400, description = "Movimento não permitido ou campos obrigatórios do destino vazios"),
        (status = 404, description = "Flow, stage ou card não encontrado")
    )
)]
pub async fn move_card(
    State(app_state): State<AppState>,
    Path((flow_id, card_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MoveCardPayload>,
) -> Result<impl IntoResponse, AppError> {
    let flow = app_state
        .flow_service
        .move_card(flow_id, card_id, payload.from_stage_id, payload.to_stage_id)
        .await?;

    Ok((StatusCode::OK, Json(flow)))
}
