use super::SqliteStore;
use crate::{error::EtlResult, record::CustomerRecord};
use rusqlite::{params, TransactionBehavior};

impl SqliteStore {
    // ── Customer ──────────────────────────────────────────────────

    /// Drop, recreate and fill the customers table in one IMMEDIATE
    /// transaction, which holds the write lock against any other run.
    pub(super) fn replace_customers(&mut self, rows: &[CustomerRecord]) -> EtlResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(include_str!("../../schema/customers.sql"))?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO customers (mobile_number, customer_name, region)
                 VALUES (?1, ?2, ?3)",
            )?;
            for c in rows {
                stmt.execute(params![&c.mobile_number, &c.customer_name, &c.region])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn customers(&self) -> EtlResult<Vec<CustomerRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT mobile_number, customer_name, region FROM customers ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CustomerRecord {
                mobile_number: row.get(0)?,
                customer_name: row.get(1)?,
                region: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
