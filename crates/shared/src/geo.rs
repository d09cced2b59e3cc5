//! Geospatial primitives: haversine distance, grid cells, region inference.
//!
//! The grid is a fixed-resolution quantization of latitude/longitude with a
//! cell side of roughly 0.5 km. Cells are the unit of demand counting and
//! surge caching; their string form (`{lat_idx}x{lng_idx}`) appears in API
//! paths and event payloads.

use geo::{point, HaversineDistance};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grid resolution in degrees. 0.005 deg of latitude is ~0.55 km.
pub const CELL_SIZE_DEG: f64 = 0.005;

/// Kilometres per degree of latitude.
const KM_PER_DEG_LAT: f64 = 110.574;

/// Kilometres per degree of longitude at the equator.
const KM_PER_DEG_LNG: f64 = 111.320;

/// Distance between two coordinates in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let a = point!(x: lng1, y: lat1);
    let b = point!(x: lng2, y: lat2);
    a.haversine_distance(&b) / 1000.0
}

/// A fixed-resolution grid cell identified by quantized latitude/longitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub lat_idx: i32,
    pub lng_idx: i32,
}

impl Cell {
    /// The cell containing the given coordinate.
    pub fn containing(lat: f64, lng: f64) -> Self {
        Self {
            lat_idx: (lat / CELL_SIZE_DEG).floor() as i32,
            lng_idx: (lng / CELL_SIZE_DEG).floor() as i32,
        }
    }

    /// Latitude of the cell centre.
    pub fn center_lat(&self) -> f64 {
        (self.lat_idx as f64 + 0.5) * CELL_SIZE_DEG
    }

    /// Longitude of the cell centre.
    pub fn center_lng(&self) -> f64 {
        (self.lng_idx as f64 + 0.5) * CELL_SIZE_DEG
    }

    /// All cells whose extent may intersect a circle of `radius_km` around
    /// this cell's centre. The result bounds nearest-neighbour scans: a
    /// radius query only examines drivers bucketed in these cells.
    pub fn disk(&self, radius_km: f64) -> Vec<Cell> {
        let lat_span = ((radius_km / KM_PER_DEG_LAT) / CELL_SIZE_DEG).ceil() as i32;
        // Longitude degrees shrink with latitude; clamp cos to keep the span
        // finite near the poles.
        let cos_lat = self.center_lat().to_radians().cos().max(0.01);
        let lng_span = ((radius_km / (KM_PER_DEG_LNG * cos_lat)) / CELL_SIZE_DEG).ceil() as i32;

        let mut cells =
            Vec::with_capacity(((2 * lat_span + 1) * (2 * lng_span + 1)) as usize);
        for dy in -lat_span..=lat_span {
            for dx in -lng_span..=lng_span {
                cells.push(Cell {
                    lat_idx: self.lat_idx + dy,
                    lng_idx: self.lng_idx + dx,
                });
            }
        }
        cells
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.lat_idx, self.lng_idx)
    }
}

impl FromStr for Cell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once('x')
            .ok_or_else(|| format!("Invalid cell id: {}", s))?;
        let lat_idx = lat
            .parse::<i32>()
            .map_err(|_| format!("Invalid cell id: {}", s))?;
        let lng_idx = lng
            .parse::<i32>()
            .map_err(|_| format!("Invalid cell id: {}", s))?;
        Ok(Cell { lat_idx, lng_idx })
    }
}

impl Serialize for Cell {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A named region served by the dispatch platform, bounded by a lat/lng box.
#[derive(Debug, Clone, Copy)]
pub struct RegionBounds {
    pub name: &'static str,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl RegionBounds {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// Fixed table of served regions. A coordinate outside every box falls back
/// to the configured default region.
pub const REGIONS: &[RegionBounds] = &[
    RegionBounds {
        name: "bangalore",
        min_lat: 12.80,
        max_lat: 13.20,
        min_lng: 77.40,
        max_lng: 77.80,
    },
    RegionBounds {
        name: "mumbai",
        min_lat: 18.85,
        max_lat: 19.30,
        min_lng: 72.75,
        max_lng: 73.05,
    },
    RegionBounds {
        name: "delhi",
        min_lat: 28.35,
        max_lat: 28.90,
        min_lng: 76.85,
        max_lng: 77.45,
    },
    RegionBounds {
        name: "hyderabad",
        min_lat: 17.20,
        max_lat: 17.60,
        min_lng: 78.20,
        max_lng: 78.70,
    },
    RegionBounds {
        name: "chennai",
        min_lat: 12.80,
        max_lat: 13.25,
        min_lng: 80.10,
        max_lng: 80.35,
    },
];

/// Infers the region containing a coordinate, if any.
pub fn infer_region(lat: f64, lng: f64) -> Option<&'static str> {
    REGIONS.iter().find(|r| r.contains(lat, lng)).map(|r| r.name)
}

/// Checks that a region name is one of the served regions.
pub fn is_known_region(name: &str) -> bool {
    REGIONS.iter().any(|r| r.name == name)
}
