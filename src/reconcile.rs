//! Merges per-cell rows into one deduplicated result set.

use crate::models::{ListingRecord, ResultSet};
use tracing::debug;

/// Accumulates cell results in visitation order; the first record seen for an
/// identifier wins.
#[derive(Debug, Default)]
pub struct Reconciler {
    results: ResultSet,
    raw_rows: usize,
    duplicates: usize,
    anonymous: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one cell's rows.
    pub fn absorb<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = ListingRecord>,
    {
        for record in rows {
            self.raw_rows += 1;
            if record.id().is_none() {
                self.anonymous += 1;
                continue;
            }
            if !self.results.insert(record) {
                self.duplicates += 1;
            }
        }
    }

    /// Rows absorbed so far, before deduplication.
    pub fn raw_rows(&self) -> usize {
        self.raw_rows
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Rows dropped for lacking an identifier.
    pub fn anonymous(&self) -> usize {
        self.anonymous
    }

    pub fn finish(self) -> ResultSet {
        debug!(
            "Reconciled {} rows into {} listings ({} duplicates, {} without id)",
            self.raw_rows,
            self.results.len(),
            self.duplicates,
            self.anonymous
        );
        self.results
    }
}

/// Concatenate cell results in order and keep the first record per identifier.
pub fn reconcile<C>(cell_results: C) -> ResultSet
where
    C: IntoIterator<Item = Vec<ListingRecord>>,
{
    let mut reconciler = Reconciler::new();
    for rows in cell_results {
        reconciler.absorb(rows);
    }
    reconciler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::collections::{HashMap, HashSet};

    fn rec(id: Value, price: i64) -> ListingRecord {
        ListingRecord::new(vec![id, json!(49.1), json!(-123.1), json!(price)])
    }

    #[test]
    fn first_cell_wins_on_shared_identifier() {
        let cells = vec![
            vec![rec(json!("R123"), 900_000), rec(json!("R1"), 1)],
            vec![rec(json!("R123"), 950_000), rec(json!("R2"), 2)],
        ];
        let set = reconcile(cells);
        assert_eq!(set.len(), 3);
        assert_eq!(set.get("R123").unwrap().fields()[3], json!(900_000));
    }

    #[test]
    fn drops_records_without_identifier() {
        let mut r = Reconciler::new();
        r.absorb(vec![rec(json!(""), 1), rec(Value::Null, 2), ListingRecord::new(vec![])]);
        r.absorb(vec![rec(json!("R7"), 3), rec(json!("R7"), 4)]);
        assert_eq!(r.raw_rows(), 5);
        assert_eq!(r.anonymous(), 3);
        assert_eq!(r.duplicates(), 1);
        let set = r.finish();
        assert_eq!(set.len(), 1);
        assert!(set.contains("R7"));
    }

    #[test]
    fn empty_input_is_empty_set() {
        assert!(reconcile(Vec::<Vec<ListingRecord>>::new()).is_empty());
    }

    proptest! {
        /// Every distinct identifier appears once, holding its first-seen value.
        #[test]
        fn unique_and_first_seen(
            cells in prop::collection::vec(
                prop::collection::vec((prop::option::of(0u8..20), any::<i64>()), 0..15),
                0..10,
            )
        ) {
            let mut expected: HashMap<String, i64> = HashMap::new();
            let mut input = Vec::new();
            for cell in &cells {
                let mut rows = Vec::new();
                for (id, price) in cell {
                    let id_value = match id {
                        Some(n) => json!(format!("R{}", n)),
                        None => json!(""),
                    };
                    if let Some(n) = id {
                        expected.entry(format!("R{}", n)).or_insert(*price);
                    }
                    rows.push(rec(id_value, *price));
                }
                input.push(rows);
            }

            let set = reconcile(input);
            prop_assert_eq!(set.len(), expected.len());

            let mut seen = HashSet::new();
            for row in set.rows() {
                let id = row.id().unwrap();
                prop_assert!(seen.insert(id.clone()));
                prop_assert_eq!(&row.fields()[3], &json!(expected[id.as_str()]));
            }
        }
    }
}
