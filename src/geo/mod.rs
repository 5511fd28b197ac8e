use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::courier::GeoPoint;

const TILE_SIZE_PX: f64 = 256.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;
pub const MAX_ZOOM: u8 = 18;
pub const SINGLE_POINT_ZOOM: u8 = 16;
pub const DEFAULT_ZOOM: u8 = 13;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl Bounds {
    /// Smallest box containing every point, `None` for no points.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GeoPoint>,
    {
        points.into_iter().fold(None, |acc, point| {
            Some(match acc {
                None => Bounds {
                    south_west: *point,
                    north_east: *point,
                },
                Some(bounds) => Bounds {
                    south_west: GeoPoint {
                        lat: bounds.south_west.lat.min(point.lat),
                        lng: bounds.south_west.lng.min(point.lng),
                    },
                    north_east: GeoPoint {
                        lat: bounds.north_east.lat.max(point.lat),
                        lng: bounds.north_east.lng.max(point.lng),
                    },
                },
            })
        })
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MapSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for MapSize {
    fn default() -> Self {
        Self {
            width_px: 800,
            height_px: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: u8,
    pub bounds: Option<Bounds>,
    pub padding_px: u32,
}

impl Viewport {
    pub fn centered(center: GeoPoint, padding_px: u32) -> Self {
        Self {
            center,
            zoom: DEFAULT_ZOOM,
            bounds: None,
            padding_px,
        }
    }

    /// Highest zoom at which `bounds` fits inside `size` minus padding on
    /// every side, centred on the bounds.
    pub fn fit(bounds: Bounds, size: MapSize, padding_px: u32) -> Self {
        let (west, north) = project(&GeoPoint {
            lat: bounds.north_east.lat,
            lng: bounds.south_west.lng,
        });
        let (east, south) = project(&GeoPoint {
            lat: bounds.south_west.lat,
            lng: bounds.north_east.lng,
        });

        let span_x = (east - west).abs();
        let span_y = (south - north).abs();
        let usable_w = (f64::from(size.width_px) - 2.0 * f64::from(padding_px)).max(1.0);
        let usable_h = (f64::from(size.height_px) - 2.0 * f64::from(padding_px)).max(1.0);

        let zoom = if span_x < f64::EPSILON && span_y < f64::EPSILON {
            SINGLE_POINT_ZOOM
        } else {
            let zoom_x = axis_zoom(usable_w, span_x);
            let zoom_y = axis_zoom(usable_h, span_y);
            zoom_x.min(zoom_y).floor().clamp(0.0, f64::from(MAX_ZOOM)) as u8
        };

        Self {
            center: unproject((west + east) / 2.0, (north + south) / 2.0),
            zoom,
            bounds: Some(bounds),
            padding_px,
        }
    }
}

fn axis_zoom(usable_px: f64, span: f64) -> f64 {
    if span < f64::EPSILON {
        f64::INFINITY
    } else {
        (usable_px / (TILE_SIZE_PX * span)).log2()
    }
}

/// Web Mercator projection onto the unit square.
pub fn project(point: &GeoPoint) -> (f64, f64) {
    let lat = point.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (point.lng + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0;
    (x, y)
}

pub fn unproject(x: f64, y: f64) -> GeoPoint {
    let lng = x * 360.0 - 180.0;
    let lat = (std::f64::consts::PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    GeoPoint { lat, lng }
}

/// Placeholder position for records without coordinates: a point within
/// `spread_deg` of `reference`, stable for a given seed.
pub fn jittered(reference: GeoPoint, spread_deg: f64, seed: u64) -> GeoPoint {
    let spread = spread_deg.abs();
    let mut rng = StdRng::seed_from_u64(seed);
    GeoPoint {
        lat: reference.lat + rng.gen_range(-spread..=spread),
        lng: reference.lng + rng.gen_range(-spread..=spread),
    }
}
