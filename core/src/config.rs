//! Run configuration.
//!
//! Everything a run touches (input paths, output directory, backend, KPI
//! window) is carried here and handed to the pipeline at construction.

use crate::{
    error::{EtlError, EtlResult},
    kpi::KpiParams,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CUSTOMERS_PATH: &str = "data/task_DE_new_customers.csv";
pub const DEFAULT_ORDERS_PATH: &str = "data/task_DE_new_orders.xml";
pub const DEFAULT_OUT_DIR: &str = "outputs";
pub const DEFAULT_DB_NAME: &str = "akasa_air.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// No database: aggregate directly over the loaded records.
    InMemory,
    /// Embedded single-file SQLite. `:memory:` keeps it in process.
    Sqlite { path: String },
    /// Client/server MySQL. Parsed so a configured deployment gets a clear
    /// error, but no client is linked.
    Mysql {
        user: String,
        password: String,
        host: String,
        port: String,
        database: String,
    },
}

impl BackendConfig {
    /// Resolve `DB_TYPE`, `DB_USER`, `DB_PASS`, `DB_HOST`, `DB_PORT` and
    /// `DB_NAME` through `lookup`. The runner layers command-line overrides
    /// over the process environment this way.
    pub fn from_lookup<F>(lookup: F) -> EtlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();
        let kind = lookup("DB_TYPE").unwrap_or_else(|| "sqlite".into());
        let database = lookup("DB_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_NAME.into());

        match kind.trim().to_lowercase().as_str() {
            "sqlite" | "" => Ok(BackendConfig::Sqlite { path: database }),
            "memory" | "inmemory" | "in_memory" => Ok(BackendConfig::InMemory),
            "mysql" => Ok(BackendConfig::Mysql {
                user: get("DB_USER"),
                password: get("DB_PASS"),
                host: get("DB_HOST"),
                port: get("DB_PORT"),
                database,
            }),
            other => Err(EtlError::Config(format!("unknown DB_TYPE '{other}'"))),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            BackendConfig::InMemory => "memory",
            BackendConfig::Sqlite { .. } => "sqlite",
            BackendConfig::Mysql { .. } => "mysql",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    pub customers_path: String,
    pub orders_path: String,
    pub out_dir: String,
    pub backend: BackendConfig,
    pub params: KpiParams,
}

impl EtlConfig {
    /// In-memory backend, default paths, window anchored at `params.as_of`.
    pub fn default_test(params: KpiParams) -> Self {
        Self {
            customers_path: DEFAULT_CUSTOMERS_PATH.into(),
            orders_path: DEFAULT_ORDERS_PATH.into(),
            out_dir: DEFAULT_OUT_DIR.into(),
            backend: BackendConfig::InMemory,
            params,
        }
    }
}
