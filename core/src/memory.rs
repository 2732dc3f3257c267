//! Backend with no database behind it. Tables are plain vectors and KPIs are
//! computed by the functions in `kpi`.

use crate::{
    backend::{Backend, BackendKind, Table},
    error::EtlResult,
    kpi::{self, KpiQuery, KpiRows},
    record::{CustomerRecord, OrderRecord},
};

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    customers: Vec<CustomerRecord>,
    orders: Vec<OrderRecord>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customers(&self) -> &[CustomerRecord] {
        &self.customers
    }

    pub fn orders(&self) -> &[OrderRecord] {
        &self.orders
    }
}

impl Backend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    fn load(&mut self, table: Table<'_>) -> EtlResult<()> {
        match table {
            Table::Customers(rows) => self.customers = rows.to_vec(),
            Table::Orders(rows) => self.orders = rows.to_vec(),
        }
        log::debug!("Loaded {} rows into in-memory table {}", table.len(), table.name());
        Ok(())
    }

    fn query(&self, query: &KpiQuery) -> EtlResult<KpiRows> {
        Ok(kpi::compute(query, &self.customers, &self.orders))
    }
}
