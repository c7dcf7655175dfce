use crate::models::{BoundingBox, Category, DateWindow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One fully-specified backend query for a single grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Cell the query selects from
    pub cell: BoundingBox,
    /// Listing category, also the `sold` form field
    pub category: Category,
    /// Entry-date window; always `None` for active listings
    pub window: Option<DateWindow>,
    /// Exact query text sent as the `sql` form field
    pub sql: String,
}

impl QuerySpec {
    /// Value of the `sold` form field.
    pub fn category_flag(&self) -> &'static str {
        self.category.flag()
    }
}

/// Delay schedule between attempts of one cell fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Backoff {
    /// Retry immediately
    None,
    /// Same delay before every retry
    Fixed(Duration),
    /// `base * 2^(retry-1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// How hard to try a failing cell before counting it as empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_cell_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_cell_retries: 0,
            backoff: Backoff::None,
        }
    }

    pub fn exponential(max_cell_retries: u32, base: Duration) -> Self {
        Self {
            max_cell_retries,
            backoff: Backoff::Exponential {
                base,
                max: Duration::from_secs(10),
            },
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_cell_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(2, Duration::from_millis(500))
    }
}
