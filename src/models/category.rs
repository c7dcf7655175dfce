use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Listing lifecycle state collected by the scout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Category {
    /// Currently for sale. No date filter.
    #[value(name = "active")]
    ActiveForSale,
    /// Sold within the last 365 days.
    #[value(name = "sold")]
    Sold,
    /// Expired within the last 30 days.
    #[value(name = "expired")]
    Expired,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::ActiveForSale, Category::Sold, Category::Expired];

    /// Value of the backend's `sold` form field.
    pub fn flag(&self) -> &'static str {
        match self {
            Category::ActiveForSale => "active",
            Category::Sold => "sold",
            Category::Expired => "expired",
        }
    }

    /// How far back the entry-date window reaches, if the category has one.
    pub fn lookback_days(&self) -> Option<i64> {
        match self {
            Category::ActiveForSale => None,
            Category::Sold => Some(365),
            Category::Expired => Some(30),
        }
    }

    /// Date window ending on `today`, or `None` for the current-state category.
    pub fn date_window(&self, today: NaiveDate) -> Option<DateWindow> {
        self.lookback_days().map(|days| DateWindow {
            start: today - Duration::days(days),
            end: today,
        })
    }

    /// File the category's result set is written to.
    pub fn file_name(&self) -> &'static str {
        match self {
            Category::ActiveForSale => "for_sale_today.csv",
            Category::Sold => "solds_last_12_months.csv",
            Category::Expired => "expired_last_30_days.csv",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::ActiveForSale => "For Sale (Today)",
            Category::Sold => "Solds (Last 12 Months)",
            Category::Expired => "Expired (Last 30 Days)",
        };
        f.write_str(label)
    }
}

/// Inclusive entry-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}
