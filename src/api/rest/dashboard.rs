use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use serde::Deserialize;

use crate::api::rest::SizeQuery;
use crate::board::BoardOverview;
use crate::state::AppState;
use crate::views::page::{DeliveryPage, PageBody, PageHeader, PersonnelTableView, ViewMode};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard/deliveries", get(delivery_page))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryPageQuery {
    #[serde(default)]
    pub view: ViewMode,
    pub search: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

async fn delivery_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeliveryPageQuery>,
) -> Json<DeliveryPage> {
    let BoardOverview {
        table,
        deliveries,
        personnel,
    } = state.board.overview(query.search.as_deref()).await;

    let size = SizeQuery {
        width: query.width,
        height: query.height,
    }
    .map_size();

    let body = match query.view {
        ViewMode::Deliveries => PageBody::Deliveries(table),
        ViewMode::Personnel => PageBody::Personnel(PersonnelTableView::build(&personnel)),
    };

    Json(DeliveryPage {
        header: PageHeader::build(&deliveries.data, &personnel.data),
        map: state.map.render(&personnel, &deliveries, size),
        body,
    })
}
