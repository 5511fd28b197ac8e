use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::models::courier::Courier;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::upstream::envelope::{EnvelopeShape, ListKind};
use crate::upstream::{DeliveryBackend, Endpoint, UpstreamError, search_term};

/// A call received by [`InMemoryBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Personnel {
        search: Option<String>,
    },
    ActiveDeliveries {
        search: Option<String>,
    },
    AssignCourier {
        delivery_id: u64,
        courier_id: Option<u64>,
    },
    UpdateStatus {
        delivery_id: u64,
        status: String,
    },
    Order {
        order_id: u64,
    },
}

/// Backend that keeps deliveries and personnel in memory.
///
/// Used when no API base URL is configured, and by the tests. Every call is
/// recorded; failures can be scheduled per endpoint.
pub struct InMemoryBackend {
    deliveries: DashMap<u64, Delivery>,
    personnel: DashMap<u64, Courier>,
    orders: DashMap<u64, Value>,
    failures: DashMap<Endpoint, UpstreamError>,
    calls: Mutex<Vec<BackendCall>>,
    shape: Mutex<EnvelopeShape>,
    raw_payload: Mutex<Option<Value>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            deliveries: DashMap::new(),
            personnel: DashMap::new(),
            orders: DashMap::new(),
            failures: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            shape: Mutex::new(EnvelopeShape::Keyed),
            raw_payload: Mutex::new(None),
        }
    }

    pub fn with_personnel(self, personnel: impl IntoIterator<Item = Courier>) -> Self {
        for courier in personnel {
            self.personnel.insert(courier.id, courier);
        }
        self
    }

    pub fn with_deliveries(self, deliveries: impl IntoIterator<Item = Delivery>) -> Self {
        for delivery in deliveries {
            self.deliveries.insert(delivery.id, delivery);
        }
        self
    }

    pub fn with_order(self, order_id: u64, order: Value) -> Self {
        self.orders.insert(order_id, order);
        self
    }

    /// Envelope used for list responses.
    pub fn set_envelope(&self, shape: EnvelopeShape) {
        *self.shape.lock().unwrap_or_else(|err| err.into_inner()) = shape;
    }

    /// Returns `payload` verbatim from every list call until cleared.
    pub fn set_raw_payload(&self, payload: Option<Value>) {
        *self.raw_payload.lock().unwrap_or_else(|err| err.into_inner()) = payload;
    }

    /// Makes the next call to `endpoint` fail with a status error.
    pub fn fail_next(&self, endpoint: Endpoint, status: u16, message: Option<&str>) {
        self.failures.insert(
            endpoint,
            UpstreamError::Status {
                endpoint,
                status,
                message: message.map(str::to_string),
            },
        );
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
    }

    pub fn delivery(&self, delivery_id: u64) -> Option<Delivery> {
        self.deliveries
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
    }

    /// Takes a delivery off the active list, as closing it upstream would.
    pub fn remove_delivery(&self, delivery_id: u64) -> Option<Delivery> {
        self.deliveries
            .remove(&delivery_id)
            .map(|(_, delivery)| delivery)
    }

    fn record(&self, call: BackendCall, endpoint: Endpoint) -> Result<(), UpstreamError> {
        self.calls
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(call);

        match self.failures.remove(&endpoint) {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }

    fn list_payload<T: serde::Serialize>(&self, kind: ListKind, items: &[T]) -> Value {
        if let Some(raw) = self
            .raw_payload
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
        {
            return raw;
        }

        let shape = *self.shape.lock().unwrap_or_else(|err| err.into_inner());
        shape.wrap(kind, items)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_term(term: &str, fields: &[&str]) -> bool {
    let term = term.to_lowercase();
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
}

fn not_found(endpoint: Endpoint, message: &str) -> UpstreamError {
    UpstreamError::Status {
        endpoint,
        status: 404,
        message: Some(message.to_string()),
    }
}

#[async_trait]
impl DeliveryBackend for InMemoryBackend {
    async fn personnel(&self, search: Option<&str>) -> Result<Value, UpstreamError> {
        let term = search_term(search);
        self.record(
            BackendCall::Personnel {
                search: term.map(str::to_string),
            },
            Endpoint::Personnel,
        )?;

        let mut personnel: Vec<Courier> = self
            .personnel
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|courier| {
                term.is_none_or(|term| {
                    matches_term(term, &[courier.name.as_str(), courier.email.as_str()])
                })
            })
            .collect();
        personnel.sort_by_key(|courier| courier.id);

        Ok(self.list_payload(ListKind::Personnel, &personnel))
    }

    async fn active_deliveries(&self, search: Option<&str>) -> Result<Value, UpstreamError> {
        let term = search_term(search);
        self.record(
            BackendCall::ActiveDeliveries {
                search: term.map(str::to_string),
            },
            Endpoint::ActiveDeliveries,
        )?;

        let mut deliveries: Vec<Delivery> = self
            .deliveries
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|delivery| {
                term.is_none_or(|term| {
                    matches_term(
                        term,
                        &[
                            delivery.tracking_code.as_deref().unwrap_or_default(),
                            delivery.shipping_name.as_str(),
                            delivery.shipping_city.as_str(),
                        ],
                    )
                })
            })
            .collect();
        deliveries.sort_by_key(|delivery| delivery.id);

        Ok(self.list_payload(ListKind::Deliveries, &deliveries))
    }

    async fn assign_courier(
        &self,
        delivery_id: u64,
        courier_id: Option<u64>,
    ) -> Result<(), UpstreamError> {
        self.record(
            BackendCall::AssignCourier {
                delivery_id,
                courier_id,
            },
            Endpoint::AssignCourier,
        )?;

        let courier = match courier_id {
            Some(id) => Some(
                self.personnel
                    .get(&id)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| {
                        not_found(Endpoint::AssignCourier, "Delivery person not found")
                    })?,
            ),
            None => None,
        };

        let previous = {
            let mut delivery = self
                .deliveries
                .get_mut(&delivery_id)
                .ok_or_else(|| not_found(Endpoint::AssignCourier, "Delivery not found"))?;
            let previous = delivery.assigned_courier_id();
            delivery.assign(courier);
            previous
        };

        if previous != courier_id {
            if let Some(mut courier) = previous.and_then(|id| self.personnel.get_mut(&id)) {
                courier.active_deliveries = courier.active_deliveries.saturating_sub(1);
            }
            if let Some(mut courier) = courier_id.and_then(|id| self.personnel.get_mut(&id)) {
                courier.active_deliveries = courier.active_deliveries.saturating_add(1);
            }
        }

        Ok(())
    }

    async fn update_status(
        &self,
        delivery_id: u64,
        status: &DeliveryStatus,
    ) -> Result<(), UpstreamError> {
        self.record(
            BackendCall::UpdateStatus {
                delivery_id,
                status: status.as_str().to_string(),
            },
            Endpoint::UpdateStatus,
        )?;

        let mut delivery = self
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| not_found(Endpoint::UpdateStatus, "Delivery not found"))?;
        delivery.order_status = status.clone();

        Ok(())
    }

    async fn order(&self, order_id: u64) -> Result<Value, UpstreamError> {
        self.record(BackendCall::Order { order_id }, Endpoint::Order)?;

        self.orders
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found(Endpoint::Order, "Order not found"))
    }
}
