use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::models::assignment::AssignmentState;
use crate::models::courier::Courier;
use crate::models::delivery::{ChipColor, Delivery};
use crate::resources::Loaded;

pub const UNASSIGNED_LABEL: &str = "Unassigned";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourierOption {
    pub value: Option<u64>,
    pub label: String,
}

/// Selector options: "Unassigned" first, then every courier.
pub fn courier_options(personnel: &[Courier]) -> Vec<CourierOption> {
    std::iter::once(CourierOption {
        value: None,
        label: UNASSIGNED_LABEL.to_string(),
    })
    .chain(personnel.iter().map(|courier| CourierOption {
        value: Some(courier.id),
        label: courier.name.clone(),
    }))
    .collect()
}

/// Name shown for the courier currently assigned to `delivery`.
pub fn courier_label(delivery: &Delivery, personnel: &[Courier]) -> String {
    let Some(courier_id) = delivery.assigned_courier_id() else {
        return UNASSIGNED_LABEL.to_string();
    };

    delivery
        .courier()
        .filter(|courier| courier.id == courier_id && !courier.name.is_empty())
        .or_else(|| personnel.iter().find(|courier| courier.id == courier_id))
        .map(|courier| courier.name.clone())
        .unwrap_or_else(|| format!("Courier #{courier_id}"))
}

/// Parses the value posted by the courier selector.
///
/// `null` and `""` mean unassigned; numbers and numeric strings select
/// that courier.
pub fn parse_selection(value: &Value) -> Result<Option<u64>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        Value::String(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("invalid courier id: {raw}"))),
        Value::Number(number) => number
            .as_u64()
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("invalid courier id: {number}"))),
        other => Err(AppError::BadRequest(format!("invalid courier id: {other}"))),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryRow {
    pub id: u64,
    pub tracking_code: String,
    pub customer: String,
    pub destination: String,
    pub status: String,
    pub chip: ChipColor,
    pub courier_id: Option<u64>,
    pub courier: String,
    pub order_link: String,
    pub assignment: AssignmentState,
}

impl DeliveryRow {
    pub fn build(delivery: &Delivery, personnel: &[Courier], assignment: AssignmentState) -> Self {
        Self {
            id: delivery.id,
            tracking_code: delivery.tracking_label(),
            customer: delivery.shipping_name.clone(),
            destination: delivery.destination(),
            status: delivery.order_status.to_string(),
            chip: delivery.order_status.chip_color(),
            courier_id: delivery.assigned_courier_id(),
            courier: courier_label(delivery, personnel),
            // Keyed by the delivery id, not the order id.
            order_link: format!("/orders/{}", delivery.id),
            assignment,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryTableView {
    pub search: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub rows: Vec<DeliveryRow>,
    pub courier_options: Vec<CourierOption>,
}

impl DeliveryTableView {
    pub fn build<F>(
        search: Option<String>,
        deliveries: &Loaded<Vec<Delivery>>,
        personnel: &Loaded<Vec<Courier>>,
        assignment_of: F,
    ) -> Self
    where
        F: Fn(u64) -> AssignmentState,
    {
        Self {
            search,
            loading: deliveries.loading || personnel.loading,
            error: deliveries.error.clone().or_else(|| personnel.error.clone()),
            rows: deliveries
                .data
                .iter()
                .map(|delivery| {
                    DeliveryRow::build(delivery, &personnel.data, assignment_of(delivery.id))
                })
                .collect(),
            courier_options: courier_options(&personnel.data),
        }
    }

    pub fn row(&self, delivery_id: u64) -> Option<&DeliveryRow> {
        self.rows.iter().find(|row| row.id == delivery_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DeliveryTableView, UNASSIGNED_LABEL, courier_label, parse_selection};
    use crate::models::assignment::AssignmentState;
    use crate::models::courier::Courier;
    use crate::models::delivery::{ChipColor, Delivery, DeliveryStatus};
    use crate::resources::Loaded;

    fn delivery() -> Delivery {
        let mut delivery = Delivery::new(7, "TRK-7");
        delivery.shipping_name = "Lucia Ortega".to_string();
        delivery.shipping_city = "Sevilla".to_string();
        delivery.shipping_street = Some("Calle Feria 21".to_string());
        delivery.order_status = DeliveryStatus::new("In Transit");
        delivery
    }

    #[test]
    fn selection_values() {
        assert_eq!(parse_selection(&json!(null)).unwrap(), None);
        assert_eq!(parse_selection(&json!("")).unwrap(), None);
        assert_eq!(parse_selection(&json!(3)).unwrap(), Some(3));
        assert_eq!(parse_selection(&json!("3")).unwrap(), Some(3));
        assert!(parse_selection(&json!("amara")).is_err());
        assert!(parse_selection(&json!(-1)).is_err());
        assert!(parse_selection(&json!([3])).is_err());
    }

    #[test]
    fn rows_render_delivery_fields() {
        let deliveries = Loaded::ready(vec![delivery()]);
        let personnel = Loaded::ready(vec![Courier::new(3, "Amara")]);

        let table =
            DeliveryTableView::build(None, &deliveries, &personnel, |_| AssignmentState::Idle);
        let row = table.row(7).unwrap();

        assert_eq!(row.tracking_code, "TRK-7");
        assert_eq!(row.customer, "Lucia Ortega");
        assert_eq!(row.destination, "Sevilla, Calle Feria 21");
        assert_eq!(row.chip, ChipColor::Info);
        assert_eq!(row.courier, UNASSIGNED_LABEL);
        assert_eq!(row.courier_id, None);
        assert_eq!(row.order_link, "/orders/7");

        assert_eq!(table.courier_options.len(), 2);
        assert_eq!(table.courier_options[0].value, None);
        assert_eq!(table.courier_options[1].label, "Amara");
    }

    #[test]
    fn courier_name_falls_back_to_personnel_then_id() {
        let personnel = vec![Courier::new(3, "Amara")];
        let mut delivery = delivery();

        delivery.delivery_person_id = Some(3);
        assert_eq!(courier_label(&delivery, &personnel), "Amara");

        delivery.delivery_person_id = Some(8);
        assert_eq!(courier_label(&delivery, &personnel), "Courier #8");
    }

    #[test]
    fn delivery_error_wins_over_personnel_error() {
        let table = DeliveryTableView::build(
            None,
            &Loaded::<Vec<Delivery>>::failed("deliveries down"),
            &Loaded::<Vec<Courier>>::failed("personnel down"),
            |_| AssignmentState::Idle,
        );

        assert!(table.rows.is_empty());
        assert_eq!(table.error.as_deref(), Some("deliveries down"));
        assert_eq!(table.courier_options.len(), 1);
    }
}
