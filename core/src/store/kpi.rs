//! KPI queries. Each mirrors the matching function in `crate::kpi`,
//! including sort order, tie-breaks and the DEFAULT_REGION bucket.

use super::{timestamp_text, SqliteStore};
use crate::{
    error::EtlResult,
    kpi::{KpiParams, MonthlyOrders, RegionRevenue, RepeatCustomer, TopSpender},
    types::DEFAULT_REGION,
};
use rusqlite::params;

impl SqliteStore {
    pub(super) fn repeat_customers(&self) -> EtlResult<Vec<RepeatCustomer>> {
        let mut stmt = self.conn.prepare(
            "SELECT mobile_number, COUNT(order_id) AS order_count
             FROM orders
             GROUP BY mobile_number
             HAVING COUNT(order_id) > 1
             ORDER BY mobile_number",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RepeatCustomer {
                mobile_number: row.get(0)?,
                order_count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub(super) fn monthly_trend(&self) -> EtlResult<Vec<MonthlyOrders>> {
        let mut stmt = self.conn.prepare(
            "SELECT substr(order_date_time, 1, 7) AS month, COUNT(order_id) AS total_orders
             FROM orders
             GROUP BY month
             ORDER BY month",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MonthlyOrders {
                month: row.get(0)?,
                total_orders: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub(super) fn regional_revenue(&self) -> EtlResult<Vec<RegionRevenue>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(c.region, ?1) AS region, SUM(o.total_amount) AS total_revenue
             FROM orders o
             LEFT JOIN customers c ON o.mobile_number = c.mobile_number
             GROUP BY COALESCE(c.region, ?1)
             ORDER BY total_revenue DESC, region ASC",
        )?;
        let rows = stmt.query_map(params![DEFAULT_REGION], |row| {
            Ok(RegionRevenue {
                region: row.get(0)?,
                total_revenue: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Orders without a customer have no group key and are excluded,
    /// hence the inner join.
    pub(super) fn top_spenders(&self, params: &KpiParams) -> EtlResult<Vec<TopSpender>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.customer_name, o.mobile_number, SUM(o.total_amount) AS total_spent
             FROM orders o
             JOIN customers c ON o.mobile_number = c.mobile_number
             WHERE o.order_date_time >= ?1
             GROUP BY c.customer_name, o.mobile_number
             ORDER BY total_spent DESC, o.mobile_number ASC, c.customer_name ASC
             LIMIT ?2",
        )?;
        let cutoff = timestamp_text(&params.cutoff());
        let rows = stmt.query_map(params![cutoff, params.top_n as i64], |row| {
            Ok(TopSpender {
                customer_name: row.get(0)?,
                mobile_number: row.get(1)?,
                total_spent: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
