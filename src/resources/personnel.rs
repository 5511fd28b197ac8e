use tracing::warn;

use crate::error::AppError;
use crate::models::courier::Courier;
use crate::resources::Loaded;
use crate::upstream::DeliveryBackend;
use crate::upstream::envelope::normalize_personnel;

pub const LOAD_FAILED: &str = "Could not load delivery personnel";

pub async fn fetch_personnel(
    backend: &dyn DeliveryBackend,
    search: Option<&str>,
) -> Result<Vec<Courier>, AppError> {
    let payload = backend.personnel(search).await?;
    normalize_personnel(payload).map_err(|err| AppError::Internal(err.to_string()))
}

pub async fn load_personnel(
    backend: &dyn DeliveryBackend,
    search: Option<&str>,
) -> Loaded<Vec<Courier>> {
    match fetch_personnel(backend, search).await {
        Ok(personnel) => Loaded::ready(personnel),
        Err(err) => {
            warn!(error = %err, "failed to load delivery personnel");
            Loaded::failed(LOAD_FAILED)
        }
    }
}

/// Finds a courier by numeric id or `#COU-{id}`.
pub fn find_courier<'a>(personnel: &'a [Courier], ident: &str) -> Option<&'a Courier> {
    let ident = ident.trim();
    personnel
        .iter()
        .find(|courier| courier.id.to_string() == ident || courier.formatted_id() == ident)
}

pub async fn courier_detail(backend: &dyn DeliveryBackend, ident: &str) -> Loaded<Option<Courier>> {
    let loaded = load_personnel(backend, None).await;
    match loaded.error {
        Some(message) => Loaded::failed(message),
        None => Loaded::ready(find_courier(&loaded.data, ident).cloned()),
    }
}
