pub mod envelope;
pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::delivery::DeliveryStatus;

/// Upstream endpoints, used for URLs, logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Personnel,
    ActiveDeliveries,
    AssignCourier,
    UpdateStatus,
    Order,
}

impl Endpoint {
    pub fn label(self) -> &'static str {
        match self {
            Endpoint::Personnel => "delivery_personnel",
            Endpoint::ActiveDeliveries => "delivery_active",
            Endpoint::AssignCourier => "delivery_assign",
            Endpoint::UpdateStatus => "delivery_status",
            Endpoint::Order => "order",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("{} request failed: {message}", .endpoint.label())]
    Transport { endpoint: Endpoint, message: String },

    #[error("{} returned status {status}", .endpoint.label())]
    Status {
        endpoint: Endpoint,
        status: u16,
        message: Option<String>,
    },

    #[error("{} response could not be decoded: {message}", .endpoint.label())]
    Decode { endpoint: Endpoint, message: String },
}

impl UpstreamError {
    /// Message the backend put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            UpstreamError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn operator_message(&self) -> String {
        self.server_message()
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AssignCourierBody {
    pub delivery_person_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpdateStatusBody {
    pub status: String,
}

/// The remote delivery API.
///
/// List calls return the raw payload; callers normalize it with
/// [`envelope`] since the wrapping differs between deployments.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    async fn personnel(&self, search: Option<&str>) -> Result<Value, UpstreamError>;

    async fn active_deliveries(&self, search: Option<&str>) -> Result<Value, UpstreamError>;

    async fn assign_courier(
        &self,
        delivery_id: u64,
        courier_id: Option<u64>,
    ) -> Result<(), UpstreamError>;

    async fn update_status(
        &self,
        delivery_id: u64,
        status: &DeliveryStatus,
    ) -> Result<(), UpstreamError>;

    async fn order(&self, order_id: u64) -> Result<Value, UpstreamError>;
}

pub type SharedBackend = Arc<dyn DeliveryBackend>;

/// Drops blank search terms so they are never sent upstream.
pub fn search_term(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|term| !term.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{AssignCourierBody, Endpoint, UpstreamError, search_term};

    #[test]
    fn unassign_body_serializes_null() {
        let body = serde_json::to_value(AssignCourierBody {
            delivery_person_id: None,
        })
        .unwrap();
        assert!(body["delivery_person_id"].is_null());
    }

    #[test]
    fn operator_message_prefers_server_text() {
        let err = UpstreamError::Status {
            endpoint: Endpoint::AssignCourier,
            status: 422,
            message: Some("Courier is offline".to_string()),
        };
        assert_eq!(err.operator_message(), "Courier is offline");

        let err = UpstreamError::Transport {
            endpoint: Endpoint::AssignCourier,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.operator_message(),
            "delivery_assign request failed: connection refused"
        );
    }

    #[test]
    fn blank_search_terms_are_dropped() {
        assert_eq!(search_term(Some("  ")), None);
        assert_eq!(search_term(Some(" trk ")), Some("trk"));
        assert_eq!(search_term(None), None);
    }
}
