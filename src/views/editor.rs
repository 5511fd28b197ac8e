use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::observability::metrics::Metrics;
use crate::upstream::{DeliveryBackend, UpstreamError};
use crate::views::table::CourierOption;

pub const SAVE_FAILED: &str = "Could not save delivery changes";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryEditForm {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub courier_id: String,
    #[serde(default)]
    pub notes: String,
}

/// The writes a form submission turns into, in the order they are sent.
#[derive(Debug, Clone, PartialEq)]
pub struct EditPlan {
    pub courier_id: Option<u64>,
    pub status: Option<DeliveryStatus>,
}

impl DeliveryEditForm {
    pub fn for_delivery(delivery: &Delivery) -> Self {
        Self {
            status: delivery.order_status.to_string(),
            courier_id: delivery
                .assigned_courier_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            notes: String::new(),
        }
    }

    /// Validates the form without touching the network.
    ///
    /// An empty courier field means "leave the assignment alone", not
    /// "unassign".
    pub fn plan(&self) -> Result<EditPlan, AppError> {
        let courier_id = match self.courier_id.trim() {
            "" => None,
            raw => Some(raw.parse::<u64>().map_err(|_| {
                AppError::BadRequest(format!("invalid courier id: {raw}"))
            })?),
        };

        let status = match self.status.trim() {
            "" => None,
            _ => {
                let status = DeliveryStatus::new(self.status.clone());
                if !status.is_menu_option() {
                    return Err(AppError::BadRequest(format!(
                        "unknown status: {}",
                        self.status
                    )));
                }
                Some(status)
            }
        };

        if !self.notes.trim().is_empty() {
            debug!("delivery notes are accepted but not stored");
        }

        Ok(EditPlan { courier_id, status })
    }
}

/// Sends the planned writes: assignment first, then status.
///
/// The calls are not atomic. A failed assignment stops before the status
/// call, so nothing after the failing write is applied.
pub async fn apply_edit(
    backend: &dyn DeliveryBackend,
    metrics: &Metrics,
    delivery_id: u64,
    plan: &EditPlan,
) -> Result<(), UpstreamError> {
    if let Some(courier_id) = plan.courier_id {
        let result = backend.assign_courier(delivery_id, Some(courier_id)).await;
        Metrics::record_outcome(&metrics.assignments_total, result.is_ok());
        result?;
    }

    if let Some(status) = &plan.status {
        let result = backend.update_status(delivery_id, status).await;
        Metrics::record_outcome(&metrics.status_updates_total, result.is_ok());
        result?;
    }

    Ok(())
}

pub fn save_error(err: &UpstreamError) -> AppError {
    AppError::BadGateway(err.server_message().unwrap_or(SAVE_FAILED).to_string())
}

/// Deliveries with a save in flight.
#[derive(Debug, Default)]
pub struct SavingSet {
    inner: DashSet<u64>,
}

impl SavingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, delivery_id: u64) -> Result<SavingGuard<'_>, AppError> {
        if !self.inner.insert(delivery_id) {
            return Err(AppError::Conflict(format!(
                "delivery {delivery_id} is already being saved"
            )));
        }

        Ok(SavingGuard {
            set: self,
            delivery_id,
        })
    }

    pub fn is_saving(&self, delivery_id: u64) -> bool {
        self.inner.contains(&delivery_id)
    }
}

/// Clears the saving flag when dropped, whatever the save's outcome.
pub struct SavingGuard<'a> {
    set: &'a SavingSet,
    delivery_id: u64,
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.set.inner.remove(&self.delivery_id);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryEditView {
    pub delivery: Delivery,
    pub form: DeliveryEditForm,
    pub status_options: Vec<&'static str>,
    pub courier_options: Vec<CourierOption>,
    pub saving: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SaveOutcome {
    pub delivery_id: u64,
    pub courier_id: Option<u64>,
    pub status: Option<String>,
    pub redirect: String,
}

impl SaveOutcome {
    pub fn new(delivery_id: u64, plan: &EditPlan) -> Self {
        Self {
            delivery_id,
            courier_id: plan.courier_id,
            status: plan.status.as_ref().map(|status| status.to_string()),
            redirect: format!("/deliveries/{delivery_id}"),
        }
    }
}
