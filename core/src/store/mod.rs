//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The pipeline calls Backend::load and Backend::query. It never executes SQL.

mod customer;
mod kpi;
mod order;

use crate::{
    backend::{Backend, BackendKind, Table},
    error::EtlResult,
    kpi::{Kpi, KpiQuery, KpiRows},
    types::Timestamp,
};
use chrono::SecondsFormat;
use rusqlite::{Connection, OptionalExtension};

pub struct SqliteStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SqliteStore {
    pub fn open(path: &str) -> EtlResult<Self> {
        if path == ":memory:" {
            return Self::in_memory();
        }
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        log::info!("Opened SQLite database {path}");
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EtlResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Rows currently in `table`, or None if the table does not exist.
    pub fn row_count(&self, table: &str) -> EtlResult<Option<i64>> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }
        // Table name was just checked against sqlite_master.
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        Ok(Some(count))
    }
}

impl Backend for SqliteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn load(&mut self, table: Table<'_>) -> EtlResult<()> {
        match table {
            Table::Customers(rows) => self.replace_customers(rows)?,
            Table::Orders(rows) => self.replace_orders(rows)?,
        }
        log::info!("Loaded {} rows into table {}", table.len(), table.name());
        Ok(())
    }

    fn query(&self, query: &KpiQuery) -> EtlResult<KpiRows> {
        let rows = match query.kpi {
            Kpi::RepeatCustomers => KpiRows::RepeatCustomers(self.repeat_customers()?),
            Kpi::MonthlyTrend => KpiRows::MonthlyTrend(self.monthly_trend()?),
            Kpi::RegionalRevenue => KpiRows::RegionalRevenue(self.regional_revenue()?),
            Kpi::TopSpenders => KpiRows::TopSpenders(self.top_spenders(&query.params)?),
        };
        Ok(rows)
    }
}

/// Stored text form of a timestamp. Fixed width for years 0000 to 9999,
/// which `parse_timestamp` enforces, so text order is time order there.
pub(crate) fn timestamp_text(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
