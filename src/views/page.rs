use serde::{Deserialize, Serialize};

use crate::models::courier::Courier;
use crate::models::delivery::Delivery;
use crate::resources::Loaded;
use crate::views::map::MapView;
use crate::views::table::DeliveryTableView;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Deliveries,
    Personnel,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageHeader {
    pub active_deliveries: usize,
    pub unassigned_deliveries: usize,
    pub couriers: usize,
    pub couriers_on_delivery: usize,
}

impl PageHeader {
    pub fn build(deliveries: &[Delivery], personnel: &[Courier]) -> Self {
        Self {
            active_deliveries: deliveries.len(),
            unassigned_deliveries: deliveries
                .iter()
                .filter(|delivery| delivery.assigned_courier_id().is_none())
                .count(),
            couriers: personnel.len(),
            couriers_on_delivery: personnel
                .iter()
                .filter(|courier| courier.is_on_delivery())
                .count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersonnelRow {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub vehicle: Option<String>,
    pub avatar: Option<String>,
    pub active_deliveries: u32,
    pub rating: Option<f64>,
    pub status: String,
    pub detail_link: String,
}

impl From<&Courier> for PersonnelRow {
    fn from(courier: &Courier) -> Self {
        Self {
            id: courier.id,
            name: courier.name.clone(),
            email: courier.email.clone(),
            phone: courier.phone.clone(),
            vehicle: courier.vehicle.clone(),
            avatar: courier.avatar.clone(),
            active_deliveries: courier.active_deliveries,
            rating: courier.rating(),
            status: courier.status_label().to_string(),
            detail_link: format!("/personnel/{}", courier.id),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersonnelTableView {
    pub loading: bool,
    pub error: Option<String>,
    pub rows: Vec<PersonnelRow>,
}

impl PersonnelTableView {
    pub fn build(personnel: &Loaded<Vec<Courier>>) -> Self {
        Self {
            loading: personnel.loading,
            error: personnel.error.clone(),
            rows: personnel.data.iter().map(PersonnelRow::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "view", content = "table", rename_all = "lowercase")]
pub enum PageBody {
    Deliveries(DeliveryTableView),
    Personnel(PersonnelTableView),
}

/// The delivery screen: header counters, the map, and one of the two tables.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryPage {
    pub header: PageHeader,
    pub map: MapView,
    pub body: PageBody,
}

#[cfg(test)]
mod tests {
    use super::{PageHeader, PersonnelRow};
    use crate::models::courier::Courier;
    use crate::models::delivery::Delivery;

    #[test]
    fn header_counts_unassigned_and_busy_couriers() {
        let mut assigned = Delivery::new(1, "TRK-1");
        assigned.delivery_person_id = Some(3);
        let deliveries = vec![assigned, Delivery::new(2, "TRK-2"), Delivery::new(3, "TRK-3")];

        let mut busy = Courier::new(3, "Amara");
        busy.status = Some("On Delivery".to_string());
        let personnel = vec![busy, Courier::new(5, "Jonas")];

        let header = PageHeader::build(&deliveries, &personnel);
        assert_eq!(header.active_deliveries, 3);
        assert_eq!(header.unassigned_deliveries, 2);
        assert_eq!(header.couriers, 2);
        assert_eq!(header.couriers_on_delivery, 1);
    }

    #[test]
    fn personnel_row_uses_normalized_rating() {
        let mut courier = Courier::new(5, "Jonas");
        courier.average_rating = Some(4.6);

        let row = PersonnelRow::from(&courier);
        assert_eq!(row.rating, Some(4.6));
        assert_eq!(row.status, "Offline");
        assert_eq!(row.detail_link, "/personnel/5");
    }
}
