// src/common/db_utils.rs

use std::time::Duration;

use crate::common::error::AppError;

// ---
// Política de retry para transações
// ---
// O Postgres serializa escritas no mesmo item via lock de linha
// (SELECT ... FOR UPDATE). Quando duas transações disputam linhas em ordem
// ruim, o banco aborta uma delas com 40001/40P01; essas tentativas podem ser
// repetidas porque a transação abortada não deixa nada para trás (nem
// movimentação no livro-razão).

/// Número máximo de tentativas de uma transação antes de subir
/// `TransactionConflict` para o chamador.
pub const MAX_TX_ATTEMPTS: u32 = 3;

/// Backoff exponencial simples entre tentativas.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(40u64 * 2u64.pow(attempt.saturating_sub(1)))
}

/// Decide o destino de um erro dentro do loop de retry: `true` = dorme e
/// tenta de novo, `false` = o erro deve subir.
pub fn should_retry(err: &AppError, attempt: u32) -> bool {
    err.is_retryable_conflict() && attempt < MAX_TX_ATTEMPTS
}

/// Converte um conflito persistente no erro público `TransactionConflict`;
/// qualquer outro erro passa intacto.
pub fn surface_conflict(err: AppError) -> AppError {
    if err.is_retryable_conflict() {
        AppError::TransactionConflict
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(1), Duration::from_millis(40));
        assert_eq!(backoff_delay(2), Duration::from_millis(80));
        assert_eq!(backoff_delay(3), Duration::from_millis(160));
    }

    #[test]
    fn business_errors_are_not_retried() {
        let err = AppError::InsufficientStock {
            item_id: uuid::Uuid::nil(),
            requested: 10,
            available: 4,
        };
        assert!(!should_retry(&err, 1));
        // e não são mascarados como conflito
        assert!(matches!(
            surface_conflict(err),
            AppError::InsufficientStock { .. }
        ));
    }

    #[test]
    fn persistent_conflict_surfaces_as_transaction_conflict() {
        assert!(matches!(
            surface_conflict(AppError::TransactionConflict),
            AppError::TransactionConflict
        ));
        assert!(!should_retry(&AppError::TransactionConflict, MAX_TX_ATTEMPTS));
    }
}
