use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A delivery person as reported by the personnel endpoint.
///
/// Personnel records are created and edited out of band; this service only
/// reads them. Several fields are optional because the backend does not
/// send them consistently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Courier {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default, alias = "photo")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub active_deliveries: u32,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "lat", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Courier {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: String::new(),
            phone: None,
            vehicle: None,
            avatar: None,
            active_deliveries: 0,
            rating: None,
            average_rating: None,
            status: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Rating in `[0, 5]`, preferring `rating` over `average_rating`.
    pub fn rating(&self) -> Option<f64> {
        self.rating
            .or(self.average_rating)
            .map(|rating| rating.clamp(0.0, 5.0))
    }

    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("Offline")
    }

    pub fn is_on_delivery(&self) -> bool {
        self.status_label().eq_ignore_ascii_case("On Delivery")
    }

    pub fn coordinates(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }

    pub fn formatted_id(&self) -> String {
        format!("#COU-{}", self.id)
    }
}
