//! KPI definitions and their in-memory aggregation.
//!
//! Four independent aggregations over the normalized tables:
//!   1. Repeat customers: mobile numbers with more than one order
//!   2. Monthly trend: order count per UTC year-month
//!   3. Regional revenue: total_amount per customer region
//!   4. Top spenders: highest spend inside the trailing window
//!
//! RULES:
//!   - Every function here is pure. No clock reads: the window anchors on
//!     KpiParams::as_of.
//!   - Orders with no matching customer land in the DEFAULT_REGION bucket
//!     for regional revenue and are left out of top spenders.
//!   - Sums are compensated and taken in input order so results match
//!     SQLite's SUM() bit for bit.
//!   - Ranking ties break on the group key, ascending.

use crate::{
    record::{CustomerRecord, OrderRecord},
    types::{MobileNumber, Timestamp, DEFAULT_REGION},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    RepeatCustomers,
    MonthlyTrend,
    RegionalRevenue,
    TopSpenders,
}

impl Kpi {
    /// Fixed export order.
    pub const ALL: [Kpi; 4] = [
        Kpi::RepeatCustomers,
        Kpi::MonthlyTrend,
        Kpi::RegionalRevenue,
        Kpi::TopSpenders,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Kpi::RepeatCustomers => "repeat_customers",
            Kpi::MonthlyTrend => "monthly_trend",
            Kpi::RegionalRevenue => "regional_revenue",
            Kpi::TopSpenders => "top_spenders",
        }
    }

    /// CSV header, in column order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Kpi::RepeatCustomers => &["mobile_number", "order_count"],
            Kpi::MonthlyTrend => &["month", "total_orders"],
            Kpi::RegionalRevenue => &["region", "total_revenue"],
            Kpi::TopSpenders => &["customer_name", "mobile_number", "total_spent"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiParams {
    /// Upper anchor of the top-spenders window.
    pub as_of: Timestamp,
    pub window_days: i64,
    pub top_n: usize,
}

impl KpiParams {
    pub fn new(as_of: Timestamp) -> Self {
        Self {
            as_of,
            window_days: DEFAULT_WINDOW_DAYS,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Orders at or after this instant count toward top spenders. A window
    /// reaching past the representable range includes every order.
    pub fn cutoff(&self) -> Timestamp {
        Duration::try_days(self.window_days)
            .and_then(|window| self.as_of.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// One aggregation request against a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiQuery {
    pub kpi: Kpi,
    pub params: KpiParams,
}

// ── Result rows ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatCustomer {
    pub mobile_number: MobileNumber,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyOrders {
    /// `YYYY-MM`, UTC.
    pub month: String,
    pub total_orders: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRevenue {
    pub region: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSpender {
    pub customer_name: Option<String>,
    pub mobile_number: MobileNumber,
    pub total_spent: f64,
}

/// A computed KPI table.
#[derive(Debug, Clone, PartialEq)]
pub enum KpiRows {
    RepeatCustomers(Vec<RepeatCustomer>),
    MonthlyTrend(Vec<MonthlyOrders>),
    RegionalRevenue(Vec<RegionRevenue>),
    TopSpenders(Vec<TopSpender>),
}

impl KpiRows {
    pub fn kpi(&self) -> Kpi {
        match self {
            KpiRows::RepeatCustomers(_) => Kpi::RepeatCustomers,
            KpiRows::MonthlyTrend(_) => Kpi::MonthlyTrend,
            KpiRows::RegionalRevenue(_) => Kpi::RegionalRevenue,
            KpiRows::TopSpenders(_) => Kpi::TopSpenders,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            KpiRows::RepeatCustomers(r) => r.len(),
            KpiRows::MonthlyTrend(r) => r.len(),
            KpiRows::RegionalRevenue(r) => r.len(),
            KpiRows::TopSpenders(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Aggregations ─────────────────────────────────────────────────────────────

pub fn compute(query: &KpiQuery, customers: &[CustomerRecord], orders: &[OrderRecord]) -> KpiRows {
    match query.kpi {
        Kpi::RepeatCustomers => KpiRows::RepeatCustomers(repeat_customers(orders)),
        Kpi::MonthlyTrend => KpiRows::MonthlyTrend(monthly_trend(orders)),
        Kpi::RegionalRevenue => KpiRows::RegionalRevenue(regional_revenue(customers, orders)),
        Kpi::TopSpenders => {
            KpiRows::TopSpenders(top_spenders(customers, orders, &query.params))
        }
    }
}

/// All four KPIs in export order.
pub fn compute_all(
    customers: &[CustomerRecord],
    orders: &[OrderRecord],
    params: &KpiParams,
) -> Vec<KpiRows> {
    Kpi::ALL
        .iter()
        .map(|&kpi| compute(&KpiQuery { kpi, params: *params }, customers, orders))
        .collect()
}

pub fn repeat_customers(orders: &[OrderRecord]) -> Vec<RepeatCustomer> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for o in orders {
        *counts.entry(o.mobile_number.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(mobile, order_count)| RepeatCustomer {
            mobile_number: mobile.to_string(),
            order_count,
        })
        .collect()
}

pub fn monthly_trend(orders: &[OrderRecord]) -> Vec<MonthlyOrders> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for o in orders {
        *counts.entry(month_key(&o.order_date_time)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(month, total_orders)| MonthlyOrders {
            month,
            total_orders,
        })
        .collect()
}

pub fn regional_revenue(customers: &[CustomerRecord], orders: &[OrderRecord]) -> Vec<RegionRevenue> {
    let index = customer_index(customers);
    let mut groups: GroupedSums<&str> = GroupedSums::default();
    for o in orders {
        let region = index
            .get(o.mobile_number.as_str())
            .and_then(|c| c.region.as_deref())
            .unwrap_or(DEFAULT_REGION);
        groups.add(region, o.total_amount);
    }

    let mut rows: Vec<RegionRevenue> = groups
        .into_totals()
        .map(|(region, total_revenue)| RegionRevenue {
            region: region.to_string(),
            total_revenue,
        })
        .collect();
    rows.sort_by(|a, b| {
        descending(a.total_revenue, b.total_revenue).then_with(|| a.region.cmp(&b.region))
    });
    rows
}

pub fn top_spenders(
    customers: &[CustomerRecord],
    orders: &[OrderRecord],
    params: &KpiParams,
) -> Vec<TopSpender> {
    let index = customer_index(customers);
    let cutoff = params.cutoff();
    let mut groups: GroupedSums<(Option<&str>, &str)> = GroupedSums::default();
    for o in orders.iter().filter(|o| o.order_date_time >= cutoff) {
        let Some(customer) = index.get(o.mobile_number.as_str()) else {
            continue;
        };
        groups.add(
            (customer.customer_name.as_deref(), o.mobile_number.as_str()),
            o.total_amount,
        );
    }

    let mut rows: Vec<TopSpender> = groups
        .into_totals()
        .map(|((name, mobile), total_spent)| TopSpender {
            customer_name: name.map(str::to_string),
            mobile_number: mobile.to_string(),
            total_spent,
        })
        .collect();
    rows.sort_by(|a, b| {
        descending(a.total_spent, b.total_spent)
            .then_with(|| a.mobile_number.cmp(&b.mobile_number))
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    rows.truncate(params.top_n);
    rows
}

/// `YYYY-MM` of a UTC instant.
pub fn month_key(ts: &Timestamp) -> String {
    ts.format("%Y-%m").to_string()
}

fn customer_index(customers: &[CustomerRecord]) -> HashMap<&str, &CustomerRecord> {
    let mut index = HashMap::with_capacity(customers.len());
    for c in customers {
        index.entry(c.mobile_number.as_str()).or_insert(c);
    }
    index
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Per-key sums in first-seen key order.
struct GroupedSums<K> {
    order: Vec<K>,
    sums: HashMap<K, NeumaierSum>,
}

impl<K> Default for GroupedSums<K> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            sums: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + std::hash::Hash> GroupedSums<K> {
    fn add(&mut self, key: K, value: f64) {
        let order = &mut self.order;
        self.sums
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                NeumaierSum::default()
            })
            .add(value);
    }

    fn into_totals(mut self) -> impl Iterator<Item = (K, f64)> {
        let order = std::mem::take(&mut self.order);
        order.into_iter().map(move |k| {
            let total = self.sums.get(&k).map(NeumaierSum::total).unwrap_or(0.0);
            (k, total)
        })
    }
}

/// Kahan–Babuška–Neumaier compensated sum, the same algorithm SQLite
/// (3.43+) uses for SUM() over REAL values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeumaierSum {
    sum: f64,
    err: f64,
}

impl NeumaierSum {
    pub fn add(&mut self, value: f64) {
        let s = self.sum;
        let t = s + value;
        if s.abs() > value.abs() {
            self.err += (s - t) + value;
        } else {
            self.err += (value - t) + s;
        }
        self.sum = t;
    }

    pub fn total(&self) -> f64 {
        if self.err.is_finite() {
            self.sum + self.err
        } else {
            self.sum
        }
    }
}
