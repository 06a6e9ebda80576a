//! Menu catalog for the cafe POS core.
//!
//! CRUD over the `menu` table: items are added and deleted through the
//! settings screen, never updated in place. Orders copy an item's name and
//! price at add time, so deleting a menu row never touches open orders or
//! the sales ledger.

use rusqlite::params;
use tracing::info;

use crate::db::DbState;
use crate::error::{PosError, PosResult};
use crate::models::MenuItem;

// ---------------------------------------------------------------------------
// Catalog writes
// ---------------------------------------------------------------------------

/// Add a menu item and return the stored row.
///
/// The category is optional; a blank label collapses to none.
pub fn add_menu_item(
    db: &DbState,
    name: &str,
    price: f64,
    category: Option<&str>,
) -> PosResult<MenuItem> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PosError::validation("Item name is required"));
    }
    if price < 0.0 {
        return Err(PosError::validation("Price must not be negative"));
    }
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToString::to_string);

    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO menu (name, price, category) VALUES (?1, ?2, ?3)",
        params![name, price, category],
    )
    .map_err(|e| PosError::storage("insert menu item", e))?;
    let id = conn.last_insert_rowid();

    info!(menu_item_id = id, name = %name, price = %price, "Menu item added");

    Ok(MenuItem {
        id,
        name: name.to_string(),
        price,
        category,
    })
}

/// Delete a menu item by id. Returns `true` when a row was removed.
///
/// Deleting an id that no longer exists is a no-op success: the settings
/// screen may be clicked twice before it refreshes. Active line items and
/// sales keep their denormalized copies either way.
pub fn delete_menu_item(db: &DbState, id: i64) -> PosResult<bool> {
    let conn = db.lock()?;
    let removed = conn
        .execute("DELETE FROM menu WHERE id = ?1", params![id])
        .map_err(|e| PosError::storage("delete menu item", e))?;

    if removed > 0 {
        info!(menu_item_id = id, "Menu item deleted");
    }
    Ok(removed > 0)
}

// ---------------------------------------------------------------------------
// Catalog reads
// ---------------------------------------------------------------------------

/// List menu items ordered by name, optionally restricted to one category.
pub fn list_menu_items(db: &DbState, category_filter: Option<&str>) -> PosResult<Vec<MenuItem>> {
    let conn = db.lock()?;

    let mut stmt;
    let mut rows = match category_filter {
        Some(category) => {
            stmt = conn
                .prepare(
                    "SELECT id, name, price, category FROM menu
                     WHERE category = ?1 ORDER BY name",
                )
                .map_err(|e| PosError::storage("prepare menu list", e))?;
            stmt.query(params![category])
                .map_err(|e| PosError::storage("query menu list", e))?
        }
        None => {
            stmt = conn
                .prepare("SELECT id, name, price, category FROM menu ORDER BY name")
                .map_err(|e| PosError::storage("prepare menu list", e))?;
            stmt.query([])
                .map_err(|e| PosError::storage("query menu list", e))?
        }
    };

    let mut items = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| PosError::storage("menu rows", e))?
    {
        items.push(map_menu_row(row).map_err(|e| PosError::storage("read menu row", e))?);
    }
    Ok(items)
}

/// Distinct categories currently in use, for the filter dropdown.
pub fn list_categories(db: &DbState) -> PosResult<Vec<String>> {
    let conn = db.lock()?;
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT category FROM menu
             WHERE category IS NOT NULL ORDER BY category",
        )
        .map_err(|e| PosError::storage("prepare category list", e))?;

    let mut rows = stmt
        .query([])
        .map_err(|e| PosError::storage("query category list", e))?;

    let mut categories = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| PosError::storage("category rows", e))?
    {
        categories.push(
            row.get(0)
                .map_err(|e| PosError::storage("read category", e))?,
        );
    }
    Ok(categories)
}

fn map_menu_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MenuItem> {
    Ok(MenuItem {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        category: row.get(3)?,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
