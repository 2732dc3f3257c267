//! Result sink: one CSV file per KPI.
//!
//! RULE: The sink never transforms rows. Header line first, then one line
//! per row in the KPI's column order.

use crate::{
    backend::BackendKind,
    error::{EtlError, EtlResult},
    kpi::{Kpi, KpiRows},
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Output file naming. Database-backed runs and in-memory runs write to
/// distinct names so both can share one output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileNaming {
    Database,
    InMemory,
}

impl FileNaming {
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::InMemory => FileNaming::InMemory,
            BackendKind::Sqlite => FileNaming::Database,
        }
    }

    pub fn file_name(&self, kpi: Kpi, window_days: i64) -> String {
        match (self, kpi) {
            (FileNaming::Database, Kpi::RepeatCustomers) => "repeat_customers.csv".into(),
            (FileNaming::Database, Kpi::MonthlyTrend) => "monthly_order_trends.csv".into(),
            (FileNaming::Database, Kpi::RegionalRevenue) => "regional_revenue.csv".into(),
            (FileNaming::Database, Kpi::TopSpenders) => {
                format!("top_spenders_{window_days}days.csv")
            }
            (FileNaming::InMemory, Kpi::RepeatCustomers) => "inmemory_repeat_customers.csv".into(),
            (FileNaming::InMemory, Kpi::MonthlyTrend) => "inmemory_monthly_trends.csv".into(),
            (FileNaming::InMemory, Kpi::RegionalRevenue) => "inmemory_regional_revenue.csv".into(),
            (FileNaming::InMemory, Kpi::TopSpenders) => {
                format!("inmemory_top_spenders_{window_days}days.csv")
            }
        }
    }
}

pub struct CsvSink {
    out_dir: PathBuf,
    naming: FileNaming,
    window_days: i64,
}

impl CsvSink {
    pub fn new(out_dir: impl Into<PathBuf>, naming: FileNaming, window_days: i64) -> Self {
        Self {
            out_dir: out_dir.into(),
            naming,
            window_days,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn path_for(&self, kpi: Kpi) -> PathBuf {
        self.out_dir.join(self.naming.file_name(kpi, self.window_days))
    }

    /// Write one KPI table, replacing any previous file. Returns the path.
    pub fn write(&self, rows: &KpiRows) -> EtlResult<PathBuf> {
        fs::create_dir_all(&self.out_dir)
            .map_err(|e| EtlError::io(self.out_dir.display().to_string(), e))?;

        let path = self.path_for(rows.kpi());
        let display = path.display().to_string();
        let file = File::create(&path).map_err(|e| EtlError::io(display.clone(), e))?;
        let mut out = BufWriter::new(file);
        write_rows(rows, &mut out)?;
        out.flush().map_err(|e| EtlError::io(display, e))?;

        log::info!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

/// Serialize a KPI table as CSV into `out`.
pub fn write_rows<W: Write>(rows: &KpiRows, out: W) -> EtlResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(rows.kpi().columns())?;
    match rows {
        KpiRows::RepeatCustomers(r) => serialize_all(&mut writer, r)?,
        KpiRows::MonthlyTrend(r) => serialize_all(&mut writer, r)?,
        KpiRows::RegionalRevenue(r) => serialize_all(&mut writer, r)?,
        KpiRows::TopSpenders(r) => serialize_all(&mut writer, r)?,
    }
    writer
        .flush()
        .map_err(|e| EtlError::io(rows.kpi().name(), e))?;
    Ok(())
}

fn serialize_all<W: Write, T: Serialize>(
    writer: &mut csv::Writer<W>,
    rows: &[T],
) -> EtlResult<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}
