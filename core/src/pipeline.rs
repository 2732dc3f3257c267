//! The pipeline: one linear pass per run.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Read customers        (fatal on a missing or broken file)
//!   2. Deduplicate customers
//!   3. Read orders           (bad records skipped, invalid ones dropped)
//!   4. Load both tables into the backend (replace, never append)
//!   5. For each KPI in Kpi::ALL order: query, then write its CSV
//!
//! RULES:
//!   - A query failure aborts the run.
//!   - A write failure is recorded for that KPI only; the rest still run.
//!   - Nothing loops back and nothing is retried.

use crate::{
    backend::{self, Backend, BackendKind, Table},
    config::EtlConfig,
    dedup::dedup_customers,
    error::EtlResult,
    kpi::{Kpi, KpiQuery},
    record::{read_customers_file, read_orders_file, CustomerRecord, OrderParse},
    sink::{CsvSink, FileNaming},
    types::Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KpiOutcome {
    Written { kpi: Kpi, rows: usize, path: String },
    Failed { kpi: Kpi, rows: usize, error: String },
}

impl KpiOutcome {
    pub fn kpi(&self) -> Kpi {
        match self {
            KpiOutcome::Written { kpi, .. } | KpiOutcome::Failed { kpi, .. } => *kpi,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, KpiOutcome::Written { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub backend: BackendKind,
    pub as_of: Timestamp,
    pub customers_read: usize,
    pub customers_kept: usize,
    pub orders_valid: usize,
    pub orders_skipped: usize,
    pub orders_dropped: usize,
    pub outcomes: Vec<KpiOutcome>,
}

impl RunSummary {
    pub fn all_written(&self) -> bool {
        self.outcomes.iter().all(KpiOutcome::is_written)
    }

    pub fn failures(&self) -> impl Iterator<Item = &KpiOutcome> {
        self.outcomes.iter().filter(|o| !o.is_written())
    }
}

pub struct Pipeline {
    config: EtlConfig,
    backend: Box<dyn Backend>,
}

impl Pipeline {
    pub fn new(config: EtlConfig, backend: Box<dyn Backend>) -> Self {
        Self { config, backend }
    }

    /// Open the configured backend and wire the pipeline.
    pub fn build(config: EtlConfig) -> EtlResult<Self> {
        let backend = backend::open(&config.backend)?;
        Ok(Self::new(config, backend))
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Full run from the configured input files.
    pub fn run(&mut self) -> EtlResult<RunSummary> {
        log::info!("Starting ETL run on {:?} backend", self.backend.kind());
        let customers = read_customers_file(&self.config.customers_path)?;
        let orders = read_orders_file(&self.config.orders_path)?;
        self.run_records(customers, orders)
    }

    /// Steps 2 to 5 over records that are already parsed.
    pub fn run_records(
        &mut self,
        customers: Vec<CustomerRecord>,
        orders: OrderParse,
    ) -> EtlResult<RunSummary> {
        let customers_read = customers.len();
        let customers = dedup_customers(customers);

        self.backend.load(Table::Customers(&customers))?;
        self.backend.load(Table::Orders(&orders.orders))?;

        let params = self.config.params;
        let sink = CsvSink::new(
            &self.config.out_dir,
            FileNaming::for_backend(self.backend.kind()),
            params.window_days,
        );

        let mut outcomes = Vec::with_capacity(Kpi::ALL.len());
        for kpi in Kpi::ALL {
            let rows = self.backend.query(&KpiQuery { kpi, params })?;
            let outcome = match sink.write(&rows) {
                Ok(path) => KpiOutcome::Written {
                    kpi,
                    rows: rows.len(),
                    path: path.display().to_string(),
                },
                Err(e) => {
                    log::error!("Failed to export {}: {e}", kpi.name());
                    KpiOutcome::Failed {
                        kpi,
                        rows: rows.len(),
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            backend: self.backend.kind(),
            as_of: params.as_of,
            customers_read,
            customers_kept: customers.len(),
            orders_valid: orders.orders.len(),
            orders_skipped: orders.skipped,
            orders_dropped: orders.dropped,
            outcomes,
        };
        if summary.all_written() {
            log::info!("All KPIs computed and exported");
        } else {
            log::warn!(
                "{} of {} KPI exports failed",
                summary.failures().count(),
                summary.outcomes.len()
            );
        }
        Ok(summary)
    }
}
