// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Flows ---
        handlers::flows::list_flows,
        handlers::flows::create_flow,
        handlers::flows::get_flow,
        handlers::flows::update_flow,
        handlers::flows::delete_flow,
        handlers::flows::create_flow_field,

        // --- Stages ---
        handlers::stages::list_stages,
        handlers::stages::add_stage,
        handlers::stages::update_stage,
        handlers::stages::delete_stage,
        handlers::stages::get_effective_fields,
        handlers::stages::create_stage_field,

        // --- Cards ---
        handlers::cards::list_cards,
        handlers::cards::create_card,
        handlers::cards::update_card,
        handlers::cards::delete_card,
        handlers::cards::move_card,
    ),
    components(
        schemas(
            // --- Campos ---
            models::field::FieldType,
            models::field::Visibility,
            models::field::FieldValue,
            models::field::FieldValidation,
            models::field::Field,

            // --- Flow ---
            models::flow::Flow,
            models::flow::Stage,
            models::flow::StageUpdate,
            models::flow::StageDeletePolicy,
            models::flow::FieldConfig,
            models::flow::Card,
            models::flow::CardHistory,
            models::flow::StageRef,

            // --- Payloads ---
            handlers::flows::CreateFlowPayload,
            handlers::flows::UpdateFlowPayload,
            handlers::flows::CreateFieldPayload,
            handlers::stages::AddStagePayload,
            handlers::cards::CreateCardPayload,
            handlers::cards::UpdateCardPayload,
            handlers::cards::MoveCardPayload,
        )
    ),
    tags(
        (name = "Flows", description = "Gestão dos fluxos de trabalho"),
        (name = "Stages", description = "Etapas ordenadas e seus campos"),
        (name = "Cards", description = "Cards, valores de campos e movimentações")
    )
)]
pub struct ApiDoc;
