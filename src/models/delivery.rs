use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::courier::{Courier, GeoPoint};

/// Labels the edit form offers. The backend accepts any string.
pub const STATUS_MENU: [&str; 6] = [
    "Pending",
    "Picked Up",
    "In Transit",
    "Delivered",
    "Delayed",
    "Cancelled",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChipColor {
    Success,
    Info,
    Primary,
    Warning,
    Error,
    Default,
}

/// Delivery status label. Kept open: transitions are not validated and
/// unknown labels pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryStatus(String);

impl DeliveryStatus {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_menu_option(&self) -> bool {
        STATUS_MENU.contains(&self.0.as_str())
    }

    pub fn chip_color(&self) -> ChipColor {
        match self.0.as_str() {
            "Delivered" => ChipColor::Success,
            "In Transit" => ChipColor::Info,
            "Processing" => ChipColor::Primary,
            "Pending" => ChipColor::Warning,
            "Cancelled" => ChipColor::Error,
            _ => ChipColor::Default,
        }
    }
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::new("Pending")
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: u64,
    #[serde(default)]
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub shipping_name: String,
    #[serde(default)]
    pub shipping_city: String,
    #[serde(default)]
    pub shipping_street: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub order_status: DeliveryStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_person_id: Option<u64>,
    #[serde(default)]
    pub delivery_person: Option<Courier>,
    #[serde(default, rename = "deliveryPerson", skip_serializing)]
    pub delivery_person_camel: Option<Courier>,
    #[serde(default, alias = "lat", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Delivery {
    pub fn new(id: u64, tracking_code: impl Into<String>) -> Self {
        Self {
            id,
            tracking_code: Some(tracking_code.into()),
            shipping_name: String::new(),
            shipping_city: String::new(),
            shipping_street: None,
            shipping_address: None,
            order_status: DeliveryStatus::default(),
            created_at: None,
            delivery_person_id: None,
            delivery_person: None,
            delivery_person_camel: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn formatted_id(&self) -> String {
        format!("#DEL-{}", self.id)
    }

    pub fn tracking_label(&self) -> String {
        self.tracking_code
            .clone()
            .unwrap_or_else(|| self.formatted_id())
    }

    pub fn courier(&self) -> Option<&Courier> {
        self.delivery_person
            .as_ref()
            .or(self.delivery_person_camel.as_ref())
    }

    pub fn assigned_courier_id(&self) -> Option<u64> {
        self.delivery_person_id
            .or_else(|| self.courier().map(|courier| courier.id))
    }

    /// Replaces the current assignment. `None` leaves the delivery unassigned.
    pub fn assign(&mut self, courier: Option<Courier>) {
        self.delivery_person_id = courier.as_ref().map(|courier| courier.id);
        self.delivery_person = courier;
        self.delivery_person_camel = None;
    }

    pub fn street(&self) -> Option<&str> {
        self.shipping_street
            .as_deref()
            .or(self.shipping_address.as_deref())
            .filter(|street| !street.trim().is_empty())
    }

    pub fn destination(&self) -> String {
        match self.street() {
            Some(street) if self.shipping_city.is_empty() => street.to_string(),
            Some(street) => format!("{}, {}", self.shipping_city, street),
            None => self.shipping_city.clone(),
        }
    }

    pub fn coordinates(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|value| value.as_str()).and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
