use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Column contract of the backend's row arrays, in order.
pub const COLUMNS: [&str; 17] = [
    "MLS_Number",
    "Latitude",
    "Longitude",
    "Date",
    "Unknown1",
    "Address",
    "Neighborhood",
    "Price",
    "Description",
    "Property_Type",
    "Stories",
    "Unknown2",
    "Bedrooms",
    "Bathrooms",
    "Unknown3",
    "Unknown4",
    "Unknown5",
];

/// Listing identifier taken from field 0.
///
/// Text and numeric identifiers are distinct keys: `"262915"` and `262915`
/// never collapse into one listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListingId {
    Text(String),
    Number(String),
}

impl ListingId {
    pub fn as_str(&self) -> &str {
        match self {
            ListingId::Text(s) | ListingId::Number(s) => s,
        }
    }
}

impl From<&str> for ListingId {
    fn from(s: &str) -> Self {
        ListingId::Text(s.to_string())
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row as returned by the backend.
///
/// Only the first field (the MLS number) is interpreted; everything else is
/// carried through positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingRecord(Vec<Value>);

impl ListingRecord {
    pub fn new(fields: Vec<Value>) -> Self {
        Self(fields)
    }

    /// Listing identifier, or `None` when the first field is missing, null,
    /// an empty string or zero. Whitespace-only strings are kept verbatim.
    pub fn id(&self) -> Option<ListingId> {
        match self.0.first()? {
            Value::String(s) if !s.is_empty() => Some(ListingId::Text(s.clone())),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(ListingId::Number(n.to_string())),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[Value] {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// Field values rendered as CSV cells. Nulls become empty cells.
    pub fn to_csv_fields(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// Deduplicated listings for one category, keyed by identifier.
///
/// Keeps the first record seen for each identifier; later duplicates are
/// ignored. Records without an identifier are never stored.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    records: Vec<ListingRecord>,
    index: HashMap<ListingId, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning `false` if it was dropped as a duplicate
    /// or for lacking an identifier.
    pub fn insert(&mut self, record: ListingRecord) -> bool {
        let Some(id) = record.id() else {
            return false;
        };
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, id: impl Into<ListingId>) -> Option<&ListingRecord> {
        self.index.get(&id.into()).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: impl Into<ListingId>) -> bool {
        self.index.contains_key(&id.into())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    pub fn rows(&self) -> impl Iterator<Item = &ListingRecord> {
        self.records.iter()
    }
}
