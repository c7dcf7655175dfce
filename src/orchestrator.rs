//! Per-category run: partition the area, fetch every cell, reconcile.
//!
//! Cell failures stop here. A failed cell contributes zero rows and is
//! counted in the summary; the category always reaches [`Phase::Done`].

use crate::error::GridError;
use crate::grid;
use crate::models::{BoundingBox, Category, ResultSet};
use crate::reconcile::Reconciler;
use crate::scrapers::query;
use crate::scrapers::traits::{CellFetcher, TokenDeriver};
use crate::scrapers::types::QuerySpec;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::pin::pin;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where a category run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Partitioning,
    Fetching { cell: usize, of: usize },
    Reconciling,
    Done,
}

/// What one cell contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellOutcome {
    Rows(usize),
    Empty,
    Failed(String),
}

/// Result of one cell query, in visitation order.
#[derive(Debug, Clone)]
pub struct CellReport {
    pub index: usize,
    pub cell: BoundingBox,
    pub outcome: CellOutcome,
}

/// Per-category counts surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: Category,
    pub cells: usize,
    pub succeeded: usize,
    pub empty: usize,
    pub failed: usize,
    pub raw_rows: usize,
    pub listings: usize,
}

impl CategorySummary {
    /// Every cell answered, and every answer was empty. Either the area truly
    /// has nothing, or the token derivation has drifted.
    pub fn all_cells_empty(&self) -> bool {
        self.cells > 0 && self.empty == self.cells
    }
}

impl fmt::Display for CategorySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} listings (deduped from {} rows; cells: {} with rows, {} empty, {} failed)",
            self.category, self.listings, self.raw_rows, self.succeeded, self.empty, self.failed
        )
    }
}

/// Everything a finished category hands to the output boundary.
#[derive(Debug)]
pub struct CategoryRun {
    pub results: ResultSet,
    pub summary: CategorySummary,
    pub cells: Vec<CellReport>,
    /// Phases in the order they were entered. Each `Fetching` entry is pushed
    /// when that cell's result is taken in, before the next cell's.
    pub phases: Vec<Phase>,
}

/// Drives partitioner, query builder, token deriver, fetcher and reconciler for
/// one category at a time.
pub struct CategoryOrchestrator<'a> {
    fetcher: &'a dyn CellFetcher,
    deriver: &'a dyn TokenDeriver,
    area: BoundingBox,
    divisions: usize,
    concurrency: usize,
    today: NaiveDate,
    progress: Option<watch::Sender<Phase>>,
}

impl<'a> CategoryOrchestrator<'a> {
    pub fn new(
        fetcher: &'a dyn CellFetcher,
        deriver: &'a dyn TokenDeriver,
        area: BoundingBox,
        divisions: usize,
        today: NaiveDate,
    ) -> Self {
        Self {
            fetcher,
            deriver,
            area,
            divisions,
            concurrency: 1,
            today,
            progress: None,
        }
    }

    /// Publish each phase to `progress` as it is entered.
    pub fn with_progress(mut self, progress: watch::Sender<Phase>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn enter(&self, phases: &mut Vec<Phase>, phase: Phase) {
        debug!("Phase: {:?}", phase);
        if let Some(tx) = &self.progress {
            tx.send_replace(phase);
        }
        phases.push(phase);
    }

    /// Cell fetches in flight at once. Results are still reconciled in cell
    /// order, so the first-seen record per identifier does not depend on
    /// completion order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self, category: Category) -> Result<CategoryRun, GridError> {
        let mut phases = Vec::new();
        self.enter(&mut phases, Phase::Init);
        let window = category.date_window(self.today);

        self.enter(&mut phases, Phase::Partitioning);
        let coverage = grid::partition(&self.area, self.divisions)?;
        let total = coverage.len();

        let specs: Vec<(usize, QuerySpec, String)> = coverage
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let spec = query::build(cell, category, window);
                let token = self.deriver.derive(&spec.sql);
                (idx, spec, token)
            })
            .collect();

        let fetcher = self.fetcher;
        let mut fetched = pin!(stream::iter(specs)
            .map(|(idx, spec, token)| async move {
                info!("  Fetching grid box {}/{}...", idx + 1, total);
                let result = fetcher.fetch(&spec, &token).await;
                (idx, spec, result)
            })
            .buffered(self.concurrency));

        // Cells arrive in visitation order as each fetch completes.
        let mut reconciler = Reconciler::new();
        let mut cells = Vec::with_capacity(total);
        while let Some((idx, spec, result)) = fetched.next().await {
            self.enter(&mut phases, Phase::Fetching { cell: idx + 1, of: total });
            let outcome = match result {
                Ok(rows) if rows.is_empty() => {
                    debug!("  Grid box {}/{} returned no rows", idx + 1, total);
                    CellOutcome::Empty
                }
                Ok(rows) => {
                    info!("  Received {} rows", rows.len());
                    let n = rows.len();
                    reconciler.absorb(rows);
                    CellOutcome::Rows(n)
                }
                Err(e) => {
                    warn!("  Grid box {}/{} failed: {}", idx + 1, total, e);
                    CellOutcome::Failed(e.to_string())
                }
            };
            cells.push(CellReport {
                index: idx,
                cell: spec.cell,
                outcome,
            });
        }

        self.enter(&mut phases, Phase::Reconciling);
        let raw_rows = reconciler.raw_rows();
        let results = reconciler.finish();

        let count = |pred: fn(&CellOutcome) -> bool| cells.iter().filter(|c| pred(&c.outcome)).count();
        let summary = CategorySummary {
            category,
            cells: total,
            succeeded: count(|o| matches!(o, CellOutcome::Rows(_))),
            empty: count(|o| matches!(o, CellOutcome::Empty)),
            failed: count(|o| matches!(o, CellOutcome::Failed(_))),
            raw_rows,
            listings: results.len(),
        };

        info!("Total {} listings captured: {} (deduped from {})", category, results.len(), raw_rows);
        if summary.failed == total && total > 0 {
            warn!("Every grid box failed for {}; the result set is empty", category);
        } else if summary.all_cells_empty() {
            warn!(
                "All {} grid boxes returned zero rows for {}; if unexpected, check the token derivation",
                total, category
            );
        }

        self.enter(&mut phases, Phase::Done);
        Ok(CategoryRun {
            results,
            summary,
            cells,
            phases,
        })
    }
}
