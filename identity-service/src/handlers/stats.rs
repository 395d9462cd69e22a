use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{middleware::Authenticated, models::AccountStats, AppState};

/// Dashboard counters.
pub async fn stats(
    State(state): State<AppState>,
    _caller: Authenticated,
) -> Result<Json<AccountStats>, AppError> {
    Ok(Json(state.credentials.stats().await?))
}
