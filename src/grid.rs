//! Splits the metro box into equal cells so no single query hits the row cap.

use crate::error::GridError;
use crate::models::{BoundingBox, GridCoverage};

/// Tile `area` into `divisions × divisions` equal cells, row-major by latitude.
///
/// Cell (i, j) spans `lat_min + i·Δlat ..= lat_min + (i+1)·Δlat` and the same
/// along longitude. Neighbouring cells share their edge exactly.
pub fn partition(area: &BoundingBox, divisions: usize) -> Result<GridCoverage, GridError> {
    if divisions == 0 {
        return Err(GridError::ZeroDivisions);
    }
    let area = BoundingBox::new(area.lat_min, area.lat_max, area.lon_min, area.lon_max)?;

    let n = divisions as f64;
    let lat_step = area.lat_span() / n;
    let lon_step = area.lon_span() / n;

    let mut cells = Vec::with_capacity(divisions * divisions);
    for i in 0..divisions {
        for j in 0..divisions {
            cells.push(BoundingBox {
                lat_min: area.lat_min + i as f64 * lat_step,
                lat_max: area.lat_min + (i + 1) as f64 * lat_step,
                lon_min: area.lon_min + j as f64 * lon_step,
                lon_max: area.lon_min + (j + 1) as f64 * lon_step,
            });
        }
    }

    Ok(GridCoverage::new(area, divisions, cells))
}
