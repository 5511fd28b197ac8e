use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use serde::Deserialize;

use crate::api::rest::SizeQuery;
use crate::error::AppError;
use crate::state::AppState;
use crate::views::map::{MapView, MarkerKind, Popup};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/map", get(get_map))
        .route("/map/select", post(select_marker))
}

#[derive(Deserialize)]
pub struct SelectMarkerRequest {
    pub kind: MarkerKind,
    pub id: u64,
}

async fn get_map(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SizeQuery>,
) -> Json<MapView> {
    let (deliveries, personnel) = tokio::join!(
        state.board.refresh_deliveries(),
        state.board.refresh_personnel()
    );

    Json(state.map.render(&personnel, &deliveries, query.map_size()))
}

/// Marker click. Resolves against the most recently loaded collections.
async fn select_marker(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SelectMarkerRequest>,
) -> Result<Json<Popup>, AppError> {
    let personnel = state.board.personnel();
    let deliveries = state.board.deliveries();

    state
        .map
        .select(payload.kind, payload.id, &personnel.data, &deliveries.data)
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("no marker for {:?} {}", payload.kind, payload.id))
        })
}
