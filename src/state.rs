use std::sync::Arc;

use tracing::{info, warn};

use crate::board::DeliveryBoard;
use crate::config::{Config, MapConfig};
use crate::error::AppError;
use crate::observability::metrics::Metrics;
use crate::upstream::SharedBackend;
use crate::upstream::http::HttpBackend;
use crate::upstream::memory::InMemoryBackend;
use crate::views::map::DeliveryMap;

pub struct AppState {
    pub board: DeliveryBoard,
    pub map: DeliveryMap,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        backend: SharedBackend,
        metrics: Metrics,
        map_config: MapConfig,
        event_buffer_size: usize,
    ) -> Self {
        let map = DeliveryMap::new(map_config)
            .on_select_personnel(|courier| {
                info!(courier_id = courier.id, name = %courier.name, "courier selected on map");
            })
            .on_select_delivery(|delivery| {
                info!(
                    delivery_id = delivery.id,
                    tracking_code = %delivery.tracking_label(),
                    "delivery selected on map"
                );
            });

        Self {
            board: DeliveryBoard::new(backend, metrics.clone(), event_buffer_size),
            map,
            metrics,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let metrics = Metrics::new();

        let backend: SharedBackend = match &config.api_base_url {
            Some(base_url) => {
                info!(base_url = %base_url, "using delivery api");
                Arc::new(
                    HttpBackend::new(
                        base_url,
                        config.api_token.clone(),
                        config.request_timeout,
                        metrics.clone(),
                    )
                    .map_err(|err| {
                        AppError::Internal(format!("failed to build http client: {err}"))
                    })?,
                )
            }
            None => {
                warn!("API_BASE_URL is not set; using the in-memory delivery backend");
                Arc::new(InMemoryBackend::new())
            }
        };

        Ok(Self::new(
            backend,
            metrics,
            config.map,
            config.event_buffer_size,
        ))
    }
}
