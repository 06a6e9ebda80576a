//! Local SQLite database layer for the cafe POS core.
//!
//! Uses rusqlite with WAL mode. Owns schema migrations, the stored
//! timestamp layout, and the shared connection state handed to every
//! operation module.

use crate::error::{PosError, PosResult};
use chrono::Local;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

/// Shared state holding the database connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

impl DbState {
    /// Lock the connection, converting a poisoned mutex into an error.
    pub fn lock(&self) -> PosResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PosError::Poisoned)
    }
}

/// Stored timestamp layout for the sales and expenses ledgers. Lexical
/// prefixes of this form select day (`YYYY-MM-DD`) and month (`YYYY-MM`)
/// reporting windows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in the stored timestamp layout.
pub fn now_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Initialize the database at `{data_dir}/cafe.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure, moves
/// the file aside and retries once with a fresh database.
pub fn init(data_dir: &Path) -> PosResult<DbState> {
    fs::create_dir_all(data_dir).map_err(|e| PosError::io("create data dir", e))?;

    let db_path = data_dir.join("cafe.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), moving file aside and retrying once",
                first_err
            );
            if db_path.exists() {
                let stamp = Local::now().format("%Y%m%d%H%M%S");
                let quarantine = data_dir.join(format!("cafe.db.corrupt.{stamp}"));
                let _ = fs::rename(&db_path, &quarantine);
                // WAL/SHM sidecars are useless without the main file
                let _ = fs::remove_file(db_path.with_extension("db-wal"));
                let _ = fs::remove_file(db_path.with_extension("db-shm"));
            }
            open_and_configure(&db_path)?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> PosResult<Connection> {
    let conn = Connection::open(path).map_err(|e| PosError::storage("sqlite open", e))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| PosError::storage("pragma setup", e))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> PosResult<()> {
    ensure_version_table(conn)?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn ensure_version_table(conn: &Connection) -> PosResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| PosError::storage("create schema_version", e))
}

/// Migration v1: the four core tables.
///
/// `active_orders` rows are line items of not-yet-settled orders, keyed by
/// the free-text `order_name`. `sales` and `expenses` are append-only
/// ledgers stamped with [`TIMESTAMP_FORMAT`] strings.
fn migrate_v1(conn: &Connection) -> PosResult<()> {
    conn.execute_batch(
        "
        -- menu catalog
        CREATE TABLE IF NOT EXISTS menu (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            price REAL NOT NULL CHECK (price >= 0)
        );

        -- line items of open (unsettled) orders
        CREATE TABLE IF NOT EXISTS active_orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_name TEXT NOT NULL,
            item_name TEXT NOT NULL,
            price REAL NOT NULL CHECK (price >= 0)
        );

        -- revenue ledger (append-only)
        CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount >= 0),
            date TEXT NOT NULL
        );

        -- cost ledger (append-only)
        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reason TEXT NOT NULL,
            cost REAL NOT NULL CHECK (cost >= 0),
            date TEXT NOT NULL
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_active_orders_order_name ON active_orders(order_name);
        CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(date);
        CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        PosError::storage("migration v1", e)
    })?;

    info!("Applied migration v1 (core tables)");
    Ok(())
}

/// Migration v2: menu categories for the settings-screen filter.
fn migrate_v2(conn: &Connection) -> PosResult<()> {
    if !column_exists(conn, "menu", "category")? {
        conn.execute_batch("ALTER TABLE menu ADD COLUMN category TEXT;")
            .map_err(|e| PosError::storage("migration v2 add category", e))?;
    }

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_menu_category ON menu(category);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )
    .map_err(|e| {
        error!("Migration v2 failed: {e}");
        PosError::storage("migration v2", e)
    })?;

    info!("Applied migration v2 (menu categories)");
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> PosResult<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| PosError::storage("table_info prepare", e))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| PosError::storage("table_info query", e))?;
    while let Some(row) = rows
        .next()
        .map_err(|e| PosError::storage("table_info next", e))?
    {
        let name: String = row
            .get(1)
            .map_err(|e| PosError::storage("table_info name", e))?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run all migrations on the given connection (test helper, not public API).
#[cfg(test)]
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("run_migrations should succeed in test");
}

// ===========================================================================
// Tests
// ===========================================================================
