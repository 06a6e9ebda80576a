//! Reporting engine for the cafe POS core.
//!
//! Aggregates are never cached: every call recomputes conditional sums over
//! the `sales` and `expenses` ledgers, selecting rows by a date-prefix match
//! against the stored timestamp strings. The destructive ledger reset is a
//! two-call protocol: arming issues a short-lived token that the confirming
//! call must echo before anything is deleted.

use chrono::Local;
use rusqlite::params;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DbState;
use crate::error::{PosError, PosResult};
use crate::models::{PeriodStats, ResetSummary, SaleRecord, StatsOverview};

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Revenue, expense, and profit for one reporting window.
///
/// `period_prefix` selects ledger rows whose date starts with it: a full
/// `YYYY-MM-DD` day, a `YYYY-MM` month, or the empty string for all-time.
pub fn get_stats(db: &DbState, period_prefix: &str) -> PosResult<PeriodStats> {
    let conn = db.lock()?;

    let revenue: f64 = conn
        .query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM sales WHERE date LIKE ?1 || '%'",
            params![period_prefix],
            |row| row.get(0),
        )
        .map_err(|e| PosError::storage("sum sales", e))?;

    let expense: f64 = conn
        .query_row(
            "SELECT COALESCE(SUM(cost), 0) FROM expenses WHERE date LIKE ?1 || '%'",
            params![period_prefix],
            |row| row.get(0),
        )
        .map_err(|e| PosError::storage("sum expenses", e))?;

    Ok(PeriodStats::new(revenue, expense))
}

/// The three fixed dashboard views, with prefixes derived from the current
/// local date.
pub fn stats_overview(db: &DbState) -> PosResult<StatsOverview> {
    let now = Local::now();
    let today = now.format("%Y-%m-%d").to_string();
    let this_month = now.format("%Y-%m").to_string();

    Ok(StatsOverview {
        today: get_stats(db, &today)?,
        this_month: get_stats(db, &this_month)?,
        all_time: get_stats(db, "")?,
    })
}

/// Sales whose date starts with `period_prefix`, newest first. The review
/// table behind the dashboard numbers.
pub fn list_sales(db: &DbState, period_prefix: &str) -> PosResult<Vec<SaleRecord>> {
    let conn = db.lock()?;
    let mut stmt = conn
        .prepare(
            "SELECT id, item, amount, date FROM sales
             WHERE date LIKE ?1 || '%' ORDER BY date DESC, id DESC",
        )
        .map_err(|e| PosError::storage("prepare sales list", e))?;

    let mut rows = stmt
        .query(params![period_prefix])
        .map_err(|e| PosError::storage("query sales list", e))?;

    let mut sales = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| PosError::storage("sales rows", e))?
    {
        sales.push(map_sale_row(row).map_err(|e| PosError::storage("read sale row", e))?);
    }
    Ok(sales)
}

fn map_sale_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SaleRecord> {
    Ok(SaleRecord {
        id: row.get(0)?,
        item: row.get(1)?,
        amount: row.get(2)?,
        date: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Ledger reset (arm / confirm)
// ---------------------------------------------------------------------------

/// How long an armed reset stays confirmable.
const RESET_ARM_WINDOW: Duration = Duration::from_secs(60);

/// Runtime-only state for the two-step ledger reset. The embedding
/// application owns one of these next to [`DbState`]; nothing here is
/// persisted, so a restart always disarms.
pub struct ResetState {
    pending: Mutex<Option<ResetArm>>,
    window: Duration,
}

impl Default for ResetState {
    fn default() -> Self {
        Self {
            pending: Mutex::new(None),
            window: RESET_ARM_WINDOW,
        }
    }
}

impl ResetState {
    /// Test hook: a state whose arming window expires on demand.
    #[cfg(test)]
    fn with_window(window: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            window,
        }
    }
}

struct ResetArm {
    token: String,
    armed_at: Instant,
}

/// Arm the ledger reset and return the confirmation token the follow-up
/// call must present. Re-arming replaces any earlier token.
pub fn arm_reset(state: &ResetState) -> PosResult<String> {
    let token = Uuid::new_v4().to_string();

    let mut pending = state.pending.lock().map_err(|_| PosError::Poisoned)?;
    *pending = Some(ResetArm {
        token: token.clone(),
        armed_at: Instant::now(),
    });

    warn!(
        "Ledger reset armed; confirm within {}s or re-arm",
        state.window.as_secs()
    );
    Ok(token)
}

/// Execute the armed reset: delete every sales and expense row in one
/// transaction. The token must match the armed one and arrive inside the
/// arming window; any attempt, right or wrong, consumes the armed state.
/// Menu rows and open orders are never touched.
pub fn confirm_reset(db: &DbState, state: &ResetState, token: &str) -> PosResult<ResetSummary> {
    let arm = state
        .pending
        .lock()
        .map_err(|_| PosError::Poisoned)?
        .take()
        .ok_or_else(|| PosError::validation("Reset is not armed"))?;

    if arm.armed_at.elapsed() > state.window {
        return Err(PosError::validation("Reset confirmation window expired"));
    }
    if arm.token != token {
        return Err(PosError::validation("Reset token does not match"));
    }

    let conn = db.lock()?;

    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| PosError::storage("begin transaction", e))?;

    let result = (|| -> PosResult<ResetSummary> {
        let sales_deleted = conn
            .execute("DELETE FROM sales", [])
            .map_err(|e| PosError::storage("delete sales", e))?;
        let expenses_deleted = conn
            .execute("DELETE FROM expenses", [])
            .map_err(|e| PosError::storage("delete expenses", e))?;
        Ok(ResetSummary {
            sales_deleted,
            expenses_deleted,
        })
    })();

    let summary = match result {
        Ok(summary) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| PosError::storage("commit", e))?;
            summary
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    };

    info!(
        sales_deleted = summary.sales_deleted,
        expenses_deleted = summary.expenses_deleted,
        "Ledgers reset"
    );
    Ok(summary)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expenses;
    use crate::menu;
    use crate::orders;
    use rusqlite::Connection;
    use std::path::PathBuf;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .expect("pragma setup");
        crate::db::run_migrations_for_test(&conn);
        DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        }
    }

    fn insert_sale_at(db: &DbState, item: &str, amount: f64, date: &str) {
        let conn = db.lock().expect("lock");
        conn.execute(
            "INSERT INTO sales (item, amount, date) VALUES (?1, ?2, ?3)",
            params![item, amount, date],
        )
        .expect("insert backdated sale");
    }

    fn insert_expense_at(db: &DbState, reason: &str, cost: f64, date: &str) {
        let conn = db.lock().expect("lock");
        conn.execute(
            "INSERT INTO expenses (reason, cost, date) VALUES (?1, ?2, ?3)",
            params![reason, cost, date],
        )
        .expect("insert backdated expense");
    }

    #[test]
    fn test_stats_on_empty_ledgers() {
        let db = test_db();
        let stats = get_stats(&db, "").expect("stats");
        assert_eq!(stats.revenue, 0.0);
        assert_eq!(stats.expense, 0.0);
        assert_eq!(stats.profit, 0.0);
    }

    #[test]
    fn test_stats_prefix_windows() {
        let db = test_db();
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-17 09:15:00");
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-17 14:40:00");
        insert_sale_at(&db, "Americano", 35000.0, "2024-05-20 11:00:00");
        insert_sale_at(&db, "Croissant", 25000.0, "2024-06-02 08:30:00");
        insert_expense_at(&db, "Milk", 20000.0, "2024-05-17 08:00:00");
        insert_expense_at(&db, "Rent", 500000.0, "2024-06-01 08:00:00");

        let day = get_stats(&db, "2024-05-17").expect("day");
        assert_eq!(day.revenue, 90000.0);
        assert_eq!(day.expense, 20000.0);
        assert_eq!(day.profit, 70000.0);

        let month = get_stats(&db, "2024-05").expect("month");
        assert_eq!(month.revenue, 125000.0);
        assert_eq!(month.expense, 20000.0);

        let all = get_stats(&db, "").expect("all");
        assert_eq!(all.revenue, 150000.0);
        assert_eq!(all.expense, 520000.0);
        assert_eq!(all.profit, 150000.0 - 520000.0);

        // Day never exceeds month, month never exceeds all-time
        assert!(day.revenue <= month.revenue);
        assert!(month.revenue <= all.revenue);

        assert_eq!(get_stats(&db, "2023").expect("no match").revenue, 0.0);
    }

    #[test]
    fn test_list_sales_honors_prefix_newest_first() {
        let db = test_db();
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-17 09:15:00");
        insert_sale_at(&db, "Americano", 35000.0, "2024-05-17 14:40:00");
        insert_sale_at(&db, "Croissant", 25000.0, "2024-06-02 08:30:00");

        let day = list_sales(&db, "2024-05-17").expect("day");
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].item, "Americano");
        assert_eq!(day[1].item, "Latte");

        assert_eq!(list_sales(&db, "").expect("all").len(), 3);
        assert!(list_sales(&db, "2025").expect("none").is_empty());
    }

    #[test]
    fn test_overview_uses_current_date_prefixes() {
        let db = test_db();
        // Ancient history: visible to all-time only
        insert_sale_at(&db, "Latte", 10000.0, "2020-01-15 10:00:00");
        insert_expense_at(&db, "Beans", 4000.0, "2020-01-15 09:00:00");
        // A sale stamped now: visible to every view
        insert_sale_at(&db, "Americano", 35000.0, &crate::db::now_stamp());

        let overview = stats_overview(&db).expect("overview");
        assert_eq!(overview.today.revenue, 35000.0);
        assert_eq!(overview.this_month.revenue, 35000.0);
        assert_eq!(overview.all_time.revenue, 45000.0);
        assert_eq!(overview.all_time.expense, 4000.0);

        assert!(overview.today.revenue <= overview.this_month.revenue);
        assert!(overview.this_month.revenue <= overview.all_time.revenue);
    }

    #[test]
    fn test_settled_order_and_expense_land_in_today() {
        let db = test_db();
        let latte = menu::add_menu_item(&db, "Latte", 45000.0, Some("Coffee")).expect("menu");

        let name = orders::open_order("Table 3").expect("open");
        orders::add_item(&db, &name, latte.id).expect("add");
        orders::add_item(&db, &name, latte.id).expect("add");
        orders::settle_order(&db, &name).expect("settle");
        expenses::record_expense(&db, "Milk", 20000.0).expect("expense");

        let overview = stats_overview(&db).expect("overview");
        assert_eq!(overview.today.revenue, 90000.0);
        assert_eq!(overview.today.expense, 20000.0);
        assert_eq!(overview.today.profit, 70000.0);
        assert_eq!(overview.all_time, overview.today);
    }

    #[test]
    fn test_reset_requires_arming() {
        let db = test_db();
        let state = ResetState::default();

        let err = confirm_reset(&db, &state, "whatever").unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
    }

    #[test]
    fn test_armed_reset_clears_ledgers_only() {
        let db = test_db();
        let state = ResetState::default();

        let latte = menu::add_menu_item(&db, "Latte", 45000.0, None).expect("menu");
        orders::add_item(&db, "Table 1", latte.id).expect("open order stays");
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-17 09:15:00");
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-18 09:15:00");
        insert_expense_at(&db, "Milk", 20000.0, "2024-05-17 08:00:00");

        let token = arm_reset(&state).expect("arm");
        let summary = confirm_reset(&db, &state, &token).expect("confirm");
        assert_eq!(summary.sales_deleted, 2);
        assert_eq!(summary.expenses_deleted, 1);

        let stats = get_stats(&db, "").expect("stats");
        assert_eq!(stats.revenue, 0.0);
        assert_eq!(stats.expense, 0.0);

        // Catalog and open orders survive
        assert_eq!(menu::list_menu_items(&db, None).expect("menu").len(), 1);
        assert_eq!(orders::list_open_orders(&db).expect("open"), vec!["Table 1"]);
    }

    #[test]
    fn test_wrong_token_deletes_nothing_and_disarms() {
        let db = test_db();
        let state = ResetState::default();
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-17 09:15:00");

        let token = arm_reset(&state).expect("arm");
        let err = confirm_reset(&db, &state, "not-the-token").unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
        assert_eq!(get_stats(&db, "").expect("stats").revenue, 45000.0);

        // The failed attempt consumed the arm; the real token is dead too
        let err = confirm_reset(&db, &state, &token).unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
        assert_eq!(get_stats(&db, "").expect("stats").revenue, 45000.0);
    }

    #[test]
    fn test_expired_arm_is_rejected() {
        let db = test_db();
        let state = ResetState::with_window(Duration::ZERO);
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-17 09:15:00");

        let token = arm_reset(&state).expect("arm");
        std::thread::sleep(Duration::from_millis(5));

        let err = confirm_reset(&db, &state, &token).unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
        assert_eq!(get_stats(&db, "").expect("stats").revenue, 45000.0);

        // The expired attempt disarmed; re-arming works as usual
        let token = arm_reset(&state).expect("re-arm");
        assert!(!token.is_empty());
    }

    #[test]
    fn test_rearming_replaces_the_token() {
        let db = test_db();
        let state = ResetState::default();
        insert_sale_at(&db, "Latte", 45000.0, "2024-05-17 09:15:00");

        let first = arm_reset(&state).expect("first arm");
        let second = arm_reset(&state).expect("second arm");
        assert_ne!(first, second);

        // The stale token no longer confirms
        let err = confirm_reset(&db, &state, &first).unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
        assert_eq!(get_stats(&db, "").expect("stats").revenue, 45000.0);
    }
}
