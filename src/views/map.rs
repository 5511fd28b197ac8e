use serde::{Deserialize, Serialize};

use crate::config::MapConfig;
use crate::geo::{Bounds, MapSize, Viewport, jittered};
use crate::models::courier::{Courier, GeoPoint};
use crate::models::delivery::Delivery;
use crate::resources::Loaded;
use crate::views::table::courier_label;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Courier,
    Destination,
}

impl MarkerKind {
    pub fn icon(self) -> MarkerIcon {
        match self {
            MarkerKind::Courier => MarkerIcon {
                name: "courier",
                shape: IconShape::Circle,
                size_px: [30, 30],
                anchor_px: [15, 15],
            },
            MarkerKind::Destination => MarkerIcon {
                name: "destination",
                shape: IconShape::Pin,
                size_px: [25, 41],
                anchor_px: [12, 41],
            },
        }
    }

    fn seed(self, entity_id: u64) -> u64 {
        let salt = match self {
            MarkerKind::Courier => 0,
            MarkerKind::Destination => 1,
        };
        entity_id.wrapping_mul(2).wrapping_add(salt)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IconShape {
    Circle,
    Pin,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MarkerIcon {
    pub name: &'static str,
    pub shape: IconShape,
    pub size_px: [u32; 2],
    pub anchor_px: [u32; 2],
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Popup {
    Courier {
        name: String,
        phone: Option<String>,
        active_deliveries: u32,
    },
    Destination {
        tracking_code: String,
        recipient: String,
        address: String,
        status: String,
        courier: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub entity_id: u64,
    pub position: GeoPoint,
    /// True when the record had no coordinates and the position is a placeholder.
    pub synthesized: bool,
    pub icon: MarkerIcon,
    pub popup: Popup,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapView {
    pub loading: bool,
    pub error: Option<String>,
    pub markers: Vec<Marker>,
    pub viewport: Viewport,
}

type SelectHandler<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Couriers and delivery destinations plotted on a tile map.
pub struct DeliveryMap {
    settings: MapConfig,
    on_select_personnel: Option<SelectHandler<Courier>>,
    on_select_delivery: Option<SelectHandler<Delivery>>,
}

impl DeliveryMap {
    pub fn new(settings: MapConfig) -> Self {
        Self {
            settings,
            on_select_personnel: None,
            on_select_delivery: None,
        }
    }

    pub fn on_select_personnel(
        mut self,
        handler: impl Fn(&Courier) + Send + Sync + 'static,
    ) -> Self {
        self.on_select_personnel = Some(Box::new(handler));
        self
    }

    pub fn on_select_delivery(
        mut self,
        handler: impl Fn(&Delivery) + Send + Sync + 'static,
    ) -> Self {
        self.on_select_delivery = Some(Box::new(handler));
        self
    }

    fn place(&self, kind: MarkerKind, entity_id: u64, real: Option<GeoPoint>) -> (GeoPoint, bool) {
        match real {
            Some(point) => (point, false),
            None => (
                jittered(
                    self.settings.center,
                    self.settings.jitter_degrees,
                    kind.seed(entity_id),
                ),
                true,
            ),
        }
    }

    pub fn courier_marker(&self, courier: &Courier) -> Marker {
        let (position, synthesized) =
            self.place(MarkerKind::Courier, courier.id, courier.coordinates());
        Marker {
            kind: MarkerKind::Courier,
            entity_id: courier.id,
            position,
            synthesized,
            icon: MarkerKind::Courier.icon(),
            popup: courier_popup(courier),
        }
    }

    pub fn destination_marker(&self, delivery: &Delivery, personnel: &[Courier]) -> Marker {
        let (position, synthesized) =
            self.place(MarkerKind::Destination, delivery.id, delivery.coordinates());
        Marker {
            kind: MarkerKind::Destination,
            entity_id: delivery.id,
            position,
            synthesized,
            icon: MarkerKind::Destination.icon(),
            popup: destination_popup(delivery, personnel),
        }
    }

    pub fn render(
        &self,
        personnel: &Loaded<Vec<Courier>>,
        deliveries: &Loaded<Vec<Delivery>>,
        size: MapSize,
    ) -> MapView {
        let markers: Vec<Marker> = personnel
            .data
            .iter()
            .map(|courier| self.courier_marker(courier))
            .chain(
                deliveries
                    .data
                    .iter()
                    .map(|delivery| self.destination_marker(delivery, &personnel.data)),
            )
            .collect();

        let padding = self.settings.fit_padding_px;
        let viewport = match Bounds::from_points(markers.iter().map(|marker| &marker.position)) {
            Some(bounds) => Viewport::fit(bounds, size, padding),
            None => Viewport::centered(self.settings.center, padding),
        };

        MapView {
            loading: personnel.loading || deliveries.loading,
            error: personnel.error.clone().or_else(|| deliveries.error.clone()),
            markers,
            viewport,
        }
    }

    /// Handles a marker click: runs the matching handler and returns the popup.
    pub fn select(
        &self,
        kind: MarkerKind,
        entity_id: u64,
        personnel: &[Courier],
        deliveries: &[Delivery],
    ) -> Option<Popup> {
        match kind {
            MarkerKind::Courier => {
                let courier = personnel.iter().find(|courier| courier.id == entity_id)?;
                if let Some(handler) = &self.on_select_personnel {
                    handler(courier);
                }
                Some(courier_popup(courier))
            }
            MarkerKind::Destination => {
                let delivery = deliveries.iter().find(|delivery| delivery.id == entity_id)?;
                if let Some(handler) = &self.on_select_delivery {
                    handler(delivery);
                }
                Some(destination_popup(delivery, personnel))
            }
        }
    }
}

fn courier_popup(courier: &Courier) -> Popup {
    Popup::Courier {
        name: courier.name.clone(),
        phone: courier.phone.clone(),
        active_deliveries: courier.active_deliveries,
    }
}

fn destination_popup(delivery: &Delivery, personnel: &[Courier]) -> Popup {
    Popup::Destination {
        tracking_code: delivery.tracking_label(),
        recipient: delivery.shipping_name.clone(),
        address: delivery.destination(),
        status: delivery.order_status.to_string(),
        courier: delivery
            .assigned_courier_id()
            .map(|_| courier_label(delivery, personnel)),
    }
}
