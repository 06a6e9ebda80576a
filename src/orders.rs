//! Order ledger for the cafe POS core.
//!
//! An open order is nothing but the set of `active_orders` rows sharing an
//! `order_name`; it materializes with its first line item and vanishes when
//! settled or cancelled. Settlement copies the line items into the `sales`
//! ledger and clears them in one transaction, so a crash mid-way can never
//! leave revenue recorded with the order still open (or the reverse).

use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::db::{self, DbState};
use crate::error::{PosError, PosResult};
use crate::models::ActiveLineItem;

// ---------------------------------------------------------------------------
// Opening and listing
// ---------------------------------------------------------------------------

/// Declare a new order name.
///
/// Nothing is persisted: an order only materializes once a line item is
/// added under its name. Returns the trimmed name for the caller to keep
/// as its current selection.
pub fn open_order(name: &str) -> PosResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PosError::validation("Order name is required"));
    }

    info!(order_name = %name, "Order opened");
    Ok(name.to_string())
}

/// Names of all orders that currently hold at least one line item.
pub fn list_open_orders(db: &DbState) -> PosResult<Vec<String>> {
    let conn = db.lock()?;
    let mut stmt = conn
        .prepare("SELECT DISTINCT order_name FROM active_orders ORDER BY order_name")
        .map_err(|e| PosError::storage("prepare open orders", e))?;

    let mut rows = stmt
        .query([])
        .map_err(|e| PosError::storage("query open orders", e))?;

    let mut names = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| PosError::storage("open order rows", e))?
    {
        names.push(
            row.get(0)
                .map_err(|e| PosError::storage("read order name", e))?,
        );
    }
    Ok(names)
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

/// Add one line item to an order, copying the menu item's current name and
/// price. Adding the same menu item again creates another row; repetition
/// is the quantity mechanism.
pub fn add_item(db: &DbState, order_name: &str, menu_item_id: i64) -> PosResult<ActiveLineItem> {
    let order_name = order_name.trim();
    if order_name.is_empty() {
        return Err(PosError::validation("Order name is required"));
    }

    let conn = db.lock()?;

    let (item_name, price): (String, f64) = conn
        .query_row(
            "SELECT name, price FROM menu WHERE id = ?1",
            params![menu_item_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| PosError::storage("lookup menu item", e))?
        .ok_or_else(|| PosError::not_found("menu item", menu_item_id))?;

    conn.execute(
        "INSERT INTO active_orders (order_name, item_name, price) VALUES (?1, ?2, ?3)",
        params![order_name, item_name, price],
    )
    .map_err(|e| PosError::storage("insert line item", e))?;
    let id = conn.last_insert_rowid();

    info!(order_name = %order_name, item = %item_name, price = %price, "Line item added");

    Ok(ActiveLineItem {
        id,
        order_name: order_name.to_string(),
        item_name,
        price,
    })
}

/// All line items of an order, in the sequence they were added. This is
/// both the display list and the authoritative input to settlement.
pub fn list_items(db: &DbState, order_name: &str) -> PosResult<Vec<ActiveLineItem>> {
    let conn = db.lock()?;
    let mut stmt = conn
        .prepare(
            "SELECT id, order_name, item_name, price FROM active_orders
             WHERE order_name = ?1 ORDER BY id",
        )
        .map_err(|e| PosError::storage("prepare line items", e))?;

    let mut rows = stmt
        .query(params![order_name.trim()])
        .map_err(|e| PosError::storage("query line items", e))?;

    let mut items = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| PosError::storage("line item rows", e))?
    {
        items.push(map_line_item(row).map_err(|e| PosError::storage("read line item", e))?);
    }
    Ok(items)
}

/// Sum of an order's line item prices. Zero for an unknown name.
pub fn order_total(db: &DbState, order_name: &str) -> PosResult<f64> {
    let conn = db.lock()?;
    conn.query_row(
        "SELECT COALESCE(SUM(price), 0) FROM active_orders WHERE order_name = ?1",
        params![order_name.trim()],
        |row| row.get(0),
    )
    .map_err(|e| PosError::storage("sum order total", e))
}

fn map_line_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActiveLineItem> {
    Ok(ActiveLineItem {
        id: row.get(0)?,
        order_name: row.get(1)?,
        item_name: row.get(2)?,
        price: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Settle an order: copy every line item into the `sales` ledger stamped
/// with the current time, then clear the order. All-or-nothing in a single
/// transaction. Returns the number of line items settled; settling a name
/// with no items is a no-op success returning 0.
pub fn settle_order(db: &DbState, order_name: &str) -> PosResult<usize> {
    let order_name = order_name.trim();
    let conn = db.lock()?;

    let now = db::now_stamp();

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| PosError::storage("begin transaction", e))?;

    let result = (|| -> PosResult<(usize, f64)> {
        let total: f64 = conn
            .query_row(
                "SELECT COALESCE(SUM(price), 0) FROM active_orders WHERE order_name = ?1",
                params![order_name],
                |row| row.get(0),
            )
            .map_err(|e| PosError::storage("sum order total", e))?;

        let settled = conn
            .execute(
                "INSERT INTO sales (item, amount, date)
                 SELECT item_name, price, ?1 FROM active_orders WHERE order_name = ?2",
                params![now, order_name],
            )
            .map_err(|e| PosError::storage("insert sales", e))?;

        conn.execute(
            "DELETE FROM active_orders WHERE order_name = ?1",
            params![order_name],
        )
        .map_err(|e| PosError::storage("clear settled order", e))?;

        Ok((settled, total))
    })();

    let (settled, total) = match result {
        Ok(counts) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| PosError::storage("commit", e))?;
            counts
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    };

    info!(order_name = %order_name, items = settled, total = %total, "Order settled");
    Ok(settled)
}

/// Cancel an order: drop its line items without touching the ledgers.
/// Irreversible. Returns the number of line items removed; cancelling a
/// name with no items is a no-op success returning 0.
pub fn cancel_order(db: &DbState, order_name: &str) -> PosResult<usize> {
    let order_name = order_name.trim();
    let conn = db.lock()?;

    let removed = conn
        .execute(
            "DELETE FROM active_orders WHERE order_name = ?1",
            params![order_name],
        )
        .map_err(|e| PosError::storage("cancel order", e))?;

    info!(order_name = %order_name, items = removed, "Order cancelled");
    Ok(removed)
}

// ===========================================================================
// Tests
// ===========================================================================
