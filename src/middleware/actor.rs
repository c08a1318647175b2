// src/middleware/actor.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalho HTTP com o usuário que executa a ação; vai para a trilha de
// auditoria (performed_by, committed_by etc.).
const ACTOR_ID_HEADER: &str = "x-actor-id";

#[derive(Debug, Clone, Copy)]
pub struct ActorContext(pub Uuid);

impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or(AppError::InvalidActorHeader)?;

        Ok(ActorContext(actor_id))
    }
}
