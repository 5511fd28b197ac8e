use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/orders/:id", get(get_order))
}

/// Order detail, passed through from the delivery API unchanged.
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, AppError> {
    match state.board.backend().order(id).await {
        Ok(order) => Ok(Json(order)),
        Err(err) if err.status() == Some(404) => {
            Err(AppError::NotFound(format!("order {id} not found")))
        }
        Err(err) => Err(err.into()),
    }
}
