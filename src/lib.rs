// src/lib.rs

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{
    Router,
    routing::{get, post, put},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppState;

/// Monta o router completo da aplicação sobre o estado recebido.
/// O binário e os testes de integração usam a mesma montagem.
pub fn app(app_state: AppState) -> Router {
    let flow_routes = Router::new()
        .route(
            "/",
            post(handlers::flows::create_flow).get(handlers::flows::list_flows),
        )
        .route(
            "/{flowId}",
            get(handlers::flows::get_flow)
                .put(handlers::flows::update_flow)
                .delete(handlers::flows::delete_flow),
        )
        // Campos de flow, visíveis em todos os stages
        .route("/{flowId}/fields", post(handlers::flows::create_flow_field))
        // Stages
        .route(
            "/{flowId}/stages",
            get(handlers::stages::list_stages).post(handlers::stages::add_stage),
        )
        .route(
            "/{flowId}/stages/{stageId}",
            put(handlers::stages::update_stage).delete(handlers::stages::delete_stage),
        )
        .route(
            "/{flowId}/stages/{stageId}/fields",
            get(handlers::stages::get_effective_fields).post(handlers::stages::create_stage_field),
        )
        // Cards
        .route(
            "/{flowId}/stages/{stageId}/cards",
            get(handlers::cards::list_cards).post(handlers::cards::create_card),
        )
        .route(
            "/{flowId}/cards/{cardId}",
            put(handlers::cards::update_card).delete(handlers::cards::delete_card),
        )
        .route(
            "/{flowId}/cards/{cardId}/move",
            post(handlers::cards::move_card),
        );

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/flows", flow_routes)
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
        .with_state(app_state)
}
