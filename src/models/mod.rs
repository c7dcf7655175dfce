mod category;
mod geo;
mod listing;

pub use category::{Category, DateWindow};
pub use geo::{BoundingBox, GridCoverage};
pub use listing::{ListingId, ListingRecord, ResultSet, COLUMNS};
