use super::{timestamp_text, SqliteStore};
use crate::{error::EtlResult, record::OrderRecord};
use rusqlite::{params, TransactionBehavior};

impl SqliteStore {
    // ── Order ─────────────────────────────────────────────────────

    pub(super) fn replace_orders(&mut self, rows: &[OrderRecord]) -> EtlResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(include_str!("../../schema/orders.sql"))?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO orders (
                    order_id, mobile_number, order_date_time, sku_id, sku_count, total_amount
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for o in rows {
                stmt.execute(params![
                    &o.order_id,
                    &o.mobile_number,
                    timestamp_text(&o.order_date_time),
                    &o.sku_id,
                    o.sku_count,
                    o.total_amount,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn order_ids(&self) -> EtlResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT order_id FROM orders ORDER BY rowid")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
