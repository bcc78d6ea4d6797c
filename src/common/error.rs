// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// O transporte decide o status HTTP; o domínio só sabe qual erro é.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Nome é obrigatório")]
    NameRequired,

    #[error("Título é obrigatório")]
    TitleRequired,

    #[error("Campos obrigatórios não preenchidos: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("Valor inválido para o campo '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Definição de campo inválida: {0}")]
    InvalidFieldDefinition(String),

    #[error("Flow não encontrado")]
    FlowNotFound,

    #[error("Stage não encontrado")]
    StageNotFound,

    #[error("Card não encontrado")]
    CardNotFound,

    #[error("Movimento de '{from}' para '{to}' não é permitido")]
    TransitionNotAllowed { from: String, to: String },

    #[error("O stage ainda possui cards")]
    StageNotEmpty,

    #[error("O flow foi modificado por outra operação")]
    VersionConflict,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação do payload.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            // Validação de domínio: 400 listando os campos ofensores.
            AppError::MissingRequiredFields(fields) => {
                let body = Json(json!({
                    "error": "Campos obrigatórios não preenchidos.",
                    "fields": fields,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            ref e @ (AppError::NameRequired
            | AppError::TitleRequired
            | AppError::InvalidFieldValue { .. }
            | AppError::InvalidFieldDefinition(_)
            | AppError::TransitionNotAllowed { .. }) => {
                let body = Json(json!({ "error": e.to_string() }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            AppError::FlowNotFound => (StatusCode::NOT_FOUND, "Flow não encontrado."),
            AppError::StageNotFound => (StatusCode::NOT_FOUND, "Stage não encontrado."),
            AppError::CardNotFound => (StatusCode::NOT_FOUND, "Card não encontrado."),

            // Sem conceito de auth aqui: conflito é 409, nunca 403.
            AppError::StageNotEmpty => (
                StatusCode::CONFLICT,
                "O stage ainda possui cards. Escolha outra política de exclusão.",
            ),
            AppError::VersionConflict => (
                StatusCode::CONFLICT,
                "O flow foi modificado por outra operação. Recarregue e tente de novo.",
            ),

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` vai logar a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
