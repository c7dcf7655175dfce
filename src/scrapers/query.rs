use crate::models::{BoundingBox, Category, DateWindow};
use crate::scrapers::types::QuerySpec;

/// Rows the backend returns per query, whatever the true match count.
pub const ROW_CAP: usize = 500;

/// Property classes the scout collects: residential, condo/apartment and the
/// remaining configured classes.
pub const PROPERTY_CLASS_FILTER: &str = "((propertyClassCode = 0) OR (propertyClassCode = 1 AND type IN('Apartment/Condo','Apartment','Condo Apartment')) OR (propertyClassCode = 1 AND type NOT IN('Apartment/Condo','Apartment','Condo Apartment')) OR (propertyClassCode = 3) OR (propertyClassCode = 4) OR (propertyClassCode = 2))";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Build the query for one cell.
///
/// Active listings are ordered by latest listing or price-change date and never
/// carry a date clause; the window is ignored for them. Sold and expired
/// listings are restricted to `window` by entry date and ordered by it. When a
/// cell overflows [`ROW_CAP`], the ordering decides which rows survive.
pub fn build(cell: &BoundingBox, category: Category, window: Option<DateWindow>) -> QuerySpec {
    let window = match category {
        Category::ActiveForSale => None,
        Category::Sold | Category::Expired => window,
    };

    let mut sql = format!(
        "SELECT * FROM *** WHERE (latitude BETWEEN {} AND {}) AND (longitude BETWEEN {} AND {}) AND {}",
        coord(cell.lat_min),
        coord(cell.lat_max),
        coord(cell.lon_min),
        coord(cell.lon_max),
        PROPERTY_CLASS_FILTER,
    );

    if let Some(w) = &window {
        sql.push_str(&format!(
            " AND (entryDate BETWEEN '{}' AND '{}')",
            w.start.format(DATE_FORMAT),
            w.end.format(DATE_FORMAT)
        ));
    }

    let order = match category {
        Category::ActiveForSale => "GREATEST(listingDate, listingPricePrevDate)",
        Category::Sold | Category::Expired => "entryDate",
    };
    sql.push_str(&format!(" ORDER BY {} DESC LIMIT {}", order, ROW_CAP));

    QuerySpec {
        cell: *cell,
        category,
        window,
        sql,
    }
}

/// Shortest round-trip rendering that always keeps a decimal point (`49.0`).
fn coord(v: f64) -> String {
    format!("{:?}", v)
}
