use tracing::warn;

use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::resources::Loaded;
use crate::upstream::DeliveryBackend;
use crate::upstream::envelope::normalize_deliveries;

pub const LOAD_FAILED: &str = "Could not load active deliveries";

pub async fn fetch_active_deliveries(
    backend: &dyn DeliveryBackend,
    search: Option<&str>,
) -> Result<Vec<Delivery>, AppError> {
    let payload = backend.active_deliveries(search).await?;
    normalize_deliveries(payload).map_err(|err| AppError::Internal(err.to_string()))
}

pub async fn load_active_deliveries(
    backend: &dyn DeliveryBackend,
    search: Option<&str>,
) -> Loaded<Vec<Delivery>> {
    match fetch_active_deliveries(backend, search).await {
        Ok(deliveries) => Loaded::ready(deliveries),
        Err(err) => {
            warn!(error = %err, "failed to load active deliveries");
            Loaded::failed(LOAD_FAILED)
        }
    }
}

/// Finds a delivery by numeric id, tracking code or `#DEL-{id}`.
pub fn find_delivery<'a>(deliveries: &'a [Delivery], ident: &str) -> Option<&'a Delivery> {
    let ident = ident.trim();
    deliveries.iter().find(|delivery| {
        delivery.id.to_string() == ident
            || delivery.tracking_code.as_deref() == Some(ident)
            || delivery.formatted_id() == ident
    })
}

/// Refetches the whole active list and looks `ident` up in it.
pub async fn delivery_detail(
    backend: &dyn DeliveryBackend,
    ident: &str,
) -> Loaded<Option<Delivery>> {
    let loaded = load_active_deliveries(backend, None).await;
    match loaded.error {
        Some(message) => Loaded::failed(message),
        None => Loaded::ready(find_delivery(&loaded.data, ident).cloned()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{LOAD_FAILED, delivery_detail, find_delivery, load_active_deliveries};
    use crate::models::delivery::Delivery;
    use crate::upstream::Endpoint;
    use crate::upstream::memory::InMemoryBackend;

    fn deliveries() -> Vec<Delivery> {
        let mut by_code = Delivery::new(11, "42");
        by_code.shipping_name = "by tracking code".to_string();
        vec![Delivery::new(42, "TRK-42"), by_code, Delivery::new(5, "TRK-5")]
    }

    #[test]
    fn lookup_matches_id_tracking_code_and_formatted_id() {
        let list = vec![Delivery::new(42, "TRK-42")];
        for ident in ["42", "TRK-42", "#DEL-42", " 42 "] {
            assert_eq!(find_delivery(&list, ident).map(|d| d.id), Some(42), "{ident}");
        }

        let list = vec![Delivery::new(9, "42")];
        assert_eq!(find_delivery(&list, "42").map(|d| d.id), Some(9));
    }

    #[test]
    fn first_match_in_list_order_wins() {
        let list = deliveries();
        assert_eq!(find_delivery(&list, "42").map(|d| d.id), Some(42));
    }

    #[test]
    fn lookup_without_match_is_none() {
        assert!(find_delivery(&deliveries(), "#DEL-999").is_none());
        assert!(find_delivery(&[], "1").is_none());
    }

    #[tokio::test]
    async fn detail_resolves_to_none_when_missing() {
        let backend = InMemoryBackend::new().with_deliveries(deliveries());

        let found = delivery_detail(&backend, "#DEL-5").await;
        assert_eq!(found.data.map(|d| d.id), Some(5));

        let missing = delivery_detail(&backend, "77").await;
        assert!(missing.data.is_none());
        assert!(missing.error.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_becomes_message() {
        let backend = InMemoryBackend::new().with_deliveries(deliveries());
        backend.fail_next(Endpoint::ActiveDeliveries, 500, None);

        let loaded = load_active_deliveries(&backend, None).await;
        assert!(loaded.data.is_empty());
        assert!(!loaded.loading);
        assert_eq!(loaded.error.as_deref(), Some(LOAD_FAILED));
    }

    #[tokio::test]
    async fn non_array_payload_loads_as_empty() {
        let backend = InMemoryBackend::new().with_deliveries(deliveries());
        backend.set_raw_payload(Some(json!({ "deliveries": "none today" })));

        let loaded = load_active_deliveries(&backend, None).await;
        assert!(loaded.data.is_empty());
        assert!(loaded.error.is_none());
    }
}
