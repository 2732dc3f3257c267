//! Backend trait, the one seam between the pipeline and storage.
//!
//! RULE: The pipeline never touches a connection or a table directly.
//! It loads tables and asks for KPI rows; each backend decides how.

use crate::{
    error::EtlResult,
    kpi::{KpiQuery, KpiRows},
    record::{CustomerRecord, OrderRecord},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    InMemory,
    Sqlite,
}

/// Rows to load, tagged with the table they replace.
#[derive(Debug, Clone, Copy)]
pub enum Table<'a> {
    Customers(&'a [CustomerRecord]),
    Orders(&'a [OrderRecord]),
}

impl Table<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Customers(_) => "customers",
            Table::Orders(_) => "orders",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Table::Customers(rows) => rows.len(),
            Table::Orders(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Backend {
    fn kind(&self) -> BackendKind;

    /// Replace the named table with `table`'s rows. Never appends.
    fn load(&mut self, table: Table<'_>) -> EtlResult<()>;

    /// Run one read-only aggregation over the loaded tables.
    fn query(&self, query: &KpiQuery) -> EtlResult<KpiRows>;
}

/// Open the backend named by `config`.
pub fn open(config: &crate::config::BackendConfig) -> EtlResult<Box<dyn Backend>> {
    use crate::config::BackendConfig;
    match config {
        BackendConfig::InMemory => Ok(Box::new(crate::memory::InMemoryBackend::new())),
        BackendConfig::Sqlite { path } => Ok(Box::new(crate::store::SqliteStore::open(path)?)),
        BackendConfig::Mysql { host, database, .. } => {
            log::error!("MySQL backend requested ({host}/{database}) but no client is linked");
            Err(crate::error::EtlError::UnsupportedBackend {
                kind: config.kind_name().to_string(),
            })
        }
    }
}
