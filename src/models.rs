//! Row and summary types shared across the POS core.

use serde::{Deserialize, Serialize};

/// A menu catalog entry. Deleted by id, never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub category: Option<String>,
}

/// One priced instance of a menu item on an open order.
///
/// `item_name` and `price` are copied from the menu row at add time, so
/// later menu edits never change what an open order already holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLineItem {
    pub id: i64,
    pub order_name: String,
    pub item_name: String,
    pub price: f64,
}

/// Append-only revenue record, one per settled line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: i64,
    pub item: String,
    pub amount: f64,
    pub date: String,
}

/// Append-only cost record entered through the expense form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: i64,
    pub reason: String,
    pub cost: f64,
    pub date: String,
}

/// Aggregates for one reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub revenue: f64,
    pub expense: f64,
    pub profit: f64,
}

impl PeriodStats {
    pub fn new(revenue: f64, expense: f64) -> Self {
        Self {
            revenue,
            expense,
            profit: revenue - expense,
        }
    }
}

/// The three fixed reporting views, recomputed from the ledgers per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsOverview {
    pub today: PeriodStats,
    pub this_month: PeriodStats,
    pub all_time: PeriodStats,
}

/// Row counts removed by a confirmed ledger reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub sales_deleted: usize,
    pub expenses_deleted: usize,
}
