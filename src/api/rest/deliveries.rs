use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::Value;

use crate::api::rest::SearchQuery;
use crate::board::AssignmentOutcome;
use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::resources::deliveries::delivery_detail;
use crate::state::AppState;
use crate::views::editor::{DeliveryEditForm, DeliveryEditView, SaveOutcome};
use crate::views::table::{DeliveryTableView, parse_selection};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", get(list_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/assignment", post(assign_courier))
        .route("/deliveries/:id/edit", get(edit_delivery).post(save_delivery))
}

#[derive(Deserialize)]
pub struct AssignCourierRequest {
    #[serde(default)]
    pub delivery_person_id: Value,
    /// Search of the table the assignment was made from.
    #[serde(default)]
    pub search: Option<String>,
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Json<DeliveryTableView> {
    Json(state.board.load(query.search.as_deref()).await)
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Delivery>, AppError> {
    let detail = delivery_detail(state.board.backend(), &id).await;
    if let Some(message) = detail.error {
        return Err(AppError::BadGateway(message));
    }

    detail
        .data
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
}

async fn assign_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<AssignCourierRequest>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    let courier_id = parse_selection(&payload.delivery_person_id)?;
    Ok(Json(
        state
            .board
            .assign(id, courier_id, payload.search.as_deref())
            .await,
    ))
}

async fn edit_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryEditView>, AppError> {
    state
        .board
        .edit_view(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
}

async fn save_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(form): Json<DeliveryEditForm>,
) -> Result<Json<SaveOutcome>, AppError> {
    Ok(Json(state.board.save(id, &form).await?))
}
