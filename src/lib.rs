//! Cafe POS core.
//!
//! Backend library for a single-operator cafe point of sale: a menu
//! catalog, named open orders that accumulate priced line items, atomic
//! settlement into an append-only sales ledger, manual expense entry, and
//! day/month/all-time profit reporting over a local SQLite database.
//!
//! The embedding application calls [`logging::init`] and [`db::init`] once
//! at startup, then drives the operation modules with the shared
//! [`DbState`]. All operations are synchronous and return typed results;
//! the presentation layer re-reads state after every mutation.

pub mod db;
pub mod error;
pub mod expenses;
pub mod logging;
pub mod menu;
pub mod models;
pub mod orders;
pub mod reporting;

pub use db::DbState;
pub use error::{PosError, PosResult};
pub use models::{
    ActiveLineItem, ExpenseRecord, MenuItem, PeriodStats, ResetSummary, SaleRecord, StatsOverview,
};
pub use reporting::ResetState;

// ===========================================================================
// Tests
// ===========================================================================
