// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// Erros da aplicação. Os erros de negócio (estoque insuficiente, transição
// inválida, não encontrado) são condições esperadas e viram 4xx com mensagem
// clara; o resto é falha de sistema e vira 5xx genérico.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Item de inventário não encontrado")]
    ItemNotFound,

    #[error("Solicitação não encontrada")]
    DemandNotFound,

    #[error("Já existe um lote ativo {lot} para o produto {product_code}")]
    DuplicateLot { product_code: String, lot: String },

    #[error("Item de solicitação inválido: {0}")]
    InvalidLineItem(String),

    #[error(
        "Estoque insuficiente para o lote {item_id}: solicitado {requested}, disponível {available}"
    )]
    InsufficientStock {
        item_id: Uuid,
        requested: i64,
        available: i64,
    },

    #[error("Transição de status inválida: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("O lote possui {0} unidades reservadas e não pode ser desativado")]
    ItemHasActiveReservation(i64),

    #[error("Conflito de concorrência no banco de dados")]
    TransactionConflict,

    // Nunca deve acontecer em operação correta; indica que a contabilidade
    // contínua e a auditoria divergem. Sempre logado antes de subir.
    #[error("Violação de invariante de estoque: {0}")]
    InvariantViolation(String),

    #[error("Cabeçalho X-Tenant-ID ausente ou inválido")]
    InvalidTenantHeader,

    #[error("Cabeçalho X-Actor-ID ausente ou inválido")]
    InvalidActorHeader,

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Conflitos de serialização/deadlock do Postgres podem ser re-tentados.
    pub fn is_retryable_conflict(&self) -> bool {
        match self {
            AppError::DatabaseError(sqlx::Error::Database(db_err)) => {
                matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
            }
            AppError::TransactionConflict => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
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

            AppError::ItemNotFound | AppError::DemandNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }

            AppError::DuplicateLot { .. } => (StatusCode::CONFLICT, self.to_string()),

            AppError::InvalidLineItem(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),

            AppError::InsufficientStock { .. } => (StatusCode::CONFLICT, self.to_string()),

            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, self.to_string()),

            AppError::ItemHasActiveReservation(_) => (StatusCode::CONFLICT, self.to_string()),

            AppError::InvalidTenantHeader | AppError::InvalidActorHeader => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }

            // Esgotamos as tentativas de commit. O chamador pode repetir a
            // requisição; não expomos detalhe de implementação.
            AppError::TransactionConflict => (
                StatusCode::SERVICE_UNAVAILABLE,
                "O sistema está ocupado. Tente novamente.".to_string(),
            ),

            // Sinal de corrupção: loga com tag de alerta operacional e
            // responde genérico.
            AppError::InvariantViolation(detail) => {
                tracing::error!(target: "invariant_violation", "{}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Inconsistência interna de estoque detectada. A equipe foi notificada."
                        .to_string(),
                )
            }

            e => {
                tracing::error!("Erro interno do servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
