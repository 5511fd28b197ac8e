use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::get;

use crate::api::rest::SearchQuery;
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::resources::Loaded;
use crate::resources::personnel::{courier_detail, load_personnel};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/personnel", get(list_personnel))
        .route("/personnel/:id", get(get_courier))
}

async fn list_personnel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Json<Loaded<Vec<Courier>>> {
    Json(load_personnel(state.board.backend(), query.search.as_deref()).await)
}

async fn get_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Courier>, AppError> {
    let detail = courier_detail(state.board.backend(), &id).await;
    if let Some(message) = detail.error {
        return Err(AppError::BadGateway(message));
    }

    detail
        .data
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))
}
