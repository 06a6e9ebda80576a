//! Expense recording for the cafe POS core.
//!
//! Costs entered through the expense form land in the append-only
//! `expenses` ledger, stamped like sales so the same date-prefix windows
//! apply. Rows are never edited; only a confirmed reset removes them.

use rusqlite::params;
use tracing::info;

use crate::db::{self, DbState};
use crate::error::{PosError, PosResult};
use crate::models::ExpenseRecord;

/// Record an expense with the current timestamp and return the stored row.
pub fn record_expense(db: &DbState, reason: &str, cost: f64) -> PosResult<ExpenseRecord> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(PosError::validation("Expense reason is required"));
    }
    if cost < 0.0 {
        return Err(PosError::validation("Cost must not be negative"));
    }

    let conn = db.lock()?;
    let now = db::now_stamp();

    conn.execute(
        "INSERT INTO expenses (reason, cost, date) VALUES (?1, ?2, ?3)",
        params![reason, cost, now],
    )
    .map_err(|e| PosError::storage("insert expense", e))?;
    let id = conn.last_insert_rowid();

    info!(expense_id = id, reason = %reason, cost = %cost, "Expense recorded");

    Ok(ExpenseRecord {
        id,
        reason: reason.to_string(),
        cost,
        date: now,
    })
}

/// Expenses whose date starts with `period_prefix`, newest first. The empty
/// prefix lists everything.
pub fn list_expenses(db: &DbState, period_prefix: &str) -> PosResult<Vec<ExpenseRecord>> {
    let conn = db.lock()?;
    let mut stmt = conn
        .prepare(
            "SELECT id, reason, cost, date FROM expenses
             WHERE date LIKE ?1 || '%' ORDER BY date DESC, id DESC",
        )
        .map_err(|e| PosError::storage("prepare expense list", e))?;

    let mut rows = stmt
        .query(params![period_prefix])
        .map_err(|e| PosError::storage("query expense list", e))?;

    let mut expenses = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| PosError::storage("expense rows", e))?
    {
        expenses.push(map_expense_row(row).map_err(|e| PosError::storage("read expense row", e))?);
    }
    Ok(expenses)
}

fn map_expense_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExpenseRecord> {
    Ok(ExpenseRecord {
        id: row.get(0)?,
        reason: row.get(1)?,
        cost: row.get(2)?,
        date: row.get(3)?,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
