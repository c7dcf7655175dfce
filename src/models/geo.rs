use crate::error::GridError;
use serde::{Deserialize, Serialize};

/// Inclusive latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Metro Vancouver, the area the collector covers by default.
    pub const METRO_VANCOUVER: BoundingBox = BoundingBox {
        lat_min: 49.0,
        lat_max: 49.5,
        lon_min: -123.3,
        lon_max: -122.5,
    };

    /// Build a box, rejecting empty, inverted or non-finite bounds.
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self, GridError> {
        let finite = [lat_min, lat_max, lon_min, lon_max].iter().all(|v| v.is_finite());
        if !finite || lat_min >= lat_max || lon_min >= lon_max {
            return Err(GridError::InvalidBox {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            });
        }
        Ok(Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// Area in square degrees.
    pub fn area(&self) -> f64 {
        self.lat_span() * self.lon_span()
    }

    /// Point containment with inclusive edges, matching `BETWEEN`.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }

    /// True when the two boxes share interior area. Touching edges do not count.
    pub fn overlaps_interior(&self, other: &BoundingBox) -> bool {
        self.lat_min < other.lat_max
            && other.lat_min < self.lat_max
            && self.lon_min < other.lon_max
            && other.lon_min < self.lon_max
    }
}

/// Ordered row-major tiling of a parent box into `divisions × divisions` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCoverage {
    parent: BoundingBox,
    divisions: usize,
    cells: Vec<BoundingBox>,
}

impl GridCoverage {
    pub(crate) fn new(parent: BoundingBox, divisions: usize, cells: Vec<BoundingBox>) -> Self {
        debug_assert_eq!(cells.len(), divisions * divisions);
        Self {
            parent,
            divisions,
            cells,
        }
    }

    pub fn parent(&self) -> &BoundingBox {
        &self.parent
    }

    pub fn divisions(&self) -> usize {
        self.divisions
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at latitude row `i`, longitude column `j`.
    pub fn cell(&self, i: usize, j: usize) -> Option<&BoundingBox> {
        if i >= self.divisions || j >= self.divisions {
            return None;
        }
        self.cells.get(i * self.divisions + j)
    }

    pub fn cells(&self) -> &[BoundingBox] {
        &self.cells
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoundingBox> {
        self.cells.iter()
    }
}

impl<'a> IntoIterator for &'a GridCoverage {
    type Item = &'a BoundingBox;
    type IntoIter = std::slice::Iter<'a, BoundingBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
