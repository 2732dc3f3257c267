//! KPI engine tests over the pure in-memory aggregations.
//!
//! Covers: the reference scenario, the repeat-customer invariant, revenue
//! conservation, the top-spenders bound and window, and UTC month buckets.

use order_kpi_core::{
    dedup::dedup_customers,
    kpi::{
        compute_all, monthly_trend, regional_revenue, repeat_customers, top_spenders, Kpi,
        KpiParams, KpiRows, MonthlyOrders, RegionRevenue, RepeatCustomer,
    },
    record::{parse_timestamp, read_orders, CustomerRecord, OrderRecord},
    types::Timestamp,
};

fn ts(text: &str) -> Timestamp {
    parse_timestamp(text).unwrap_or_else(|| panic!("bad test timestamp {text}"))
}

fn customer(mobile: &str, name: &str, region: &str) -> CustomerRecord {
    CustomerRecord {
        mobile_number: mobile.into(),
        customer_name: Some(name.into()),
        region: Some(region.into()),
    }
}

fn order(id: &str, mobile: &str, when: &str, amount: f64) -> OrderRecord {
    OrderRecord {
        order_id: id.into(),
        mobile_number: mobile.into(),
        order_date_time: ts(when),
        sku_id: Some("SKU1".into()),
        sku_count: 1,
        total_amount: amount,
    }
}

fn params() -> KpiParams {
    KpiParams::new(ts("2024-06-30T00:00:00Z"))
}

/// The worked example: duplicate Alice rows, two Alice orders and one order
/// from a number with no customer.
#[test]
fn reference_scenario() {
    let customers = dedup_customers(vec![
        customer("9990001111", "Alice", "North"),
        customer("9990001111", "AliceDup", "South"),
    ]);
    let orders = vec![
        order("O1", "9990001111", "2024-06-20T10:00:00Z", 100.0),
        order("O2", "9990001111", "2024-06-21T10:00:00Z", 50.0),
        order("O3", "9999999999", "2024-06-20T10:00:00Z", 30.0),
    ];

    assert_eq!(
        repeat_customers(&orders),
        vec![RepeatCustomer {
            mobile_number: "9990001111".into(),
            order_count: 2
        }]
    );

    assert_eq!(
        regional_revenue(&customers, &orders),
        vec![
            RegionRevenue {
                region: "North".into(),
                total_revenue: 150.0
            },
            RegionRevenue {
                region: "Unknown".into(),
                total_revenue: 30.0
            },
        ]
    );

    let top = top_spenders(&customers, &orders, &params());
    assert_eq!(top.len(), 1, "unmatched orders have no spender row");
    assert_eq!(top[0].customer_name.as_deref(), Some("Alice"));
    assert_eq!(top[0].total_spent, 150.0);
}

#[test]
fn repeat_customers_need_at_least_two_orders() {
    let orders = vec![
        order("O1", "A", "2024-01-01", 1.0),
        order("O2", "B", "2024-01-02", 1.0),
        order("O3", "A", "2024-01-03", 1.0),
        order("O4", "C", "2024-01-04", 1.0),
        order("O5", "C", "2024-01-05", 1.0),
        order("O6", "C", "2024-01-06", 1.0),
    ];
    let repeat = repeat_customers(&orders);

    let mobiles: Vec<_> = repeat.iter().map(|r| r.mobile_number.as_str()).collect();
    assert_eq!(mobiles, ["A", "C"]);
    assert_eq!(repeat[1].order_count, 3);
    assert!(repeat.iter().all(|r| r.order_count >= 2));
}

#[test]
fn invalid_orders_never_reach_any_kpi() {
    let xml = "<orders>
        <order><order_id>GOOD</order_id><mobile_number>111</mobile_number>
               <order_date_time>2024-06-20</order_date_time><total_amount>10</total_amount></order>
        <order><mobile_number>111</mobile_number>
               <order_date_time>2024-06-20</order_date_time><total_amount>500</total_amount></order>
        <order><order_id>NOMOBILE</order_id>
               <order_date_time>2024-06-20</order_date_time><total_amount>500</total_amount></order>
        <order><order_id>BADCOUNT</order_id><mobile_number>111</mobile_number>
               <order_date_time>2024-06-20</order_date_time><sku_count>abc</sku_count>
               <total_amount>500</total_amount></order>
    </orders>";
    let parse = read_orders(xml.as_bytes(), "inline").unwrap();
    let customers = vec![customer("111", "Alice", "North")];

    let results = compute_all(&customers, &parse.orders, &params());
    for rows in &results {
        match rows {
            KpiRows::RepeatCustomers(r) => assert!(r.is_empty(), "only one valid order"),
            KpiRows::MonthlyTrend(r) => assert_eq!(r[0].total_orders, 1),
            KpiRows::RegionalRevenue(r) => assert_eq!(r[0].total_revenue, 10.0),
            KpiRows::TopSpenders(r) => assert_eq!(r[0].total_spent, 10.0),
        }
    }
}

#[test]
fn revenue_is_conserved_when_every_order_matches() {
    let customers = vec![
        customer("1", "A", "North"),
        customer("2", "B", "South"),
        customer("3", "C", "North"),
    ];
    let amounts = [19.99, 0.1, 250.0, 0.2, 1234.56, 7.07];
    let orders: Vec<_> = amounts
        .iter()
        .enumerate()
        .map(|(i, &a)| order(&format!("O{i}"), &format!("{}", i % 3 + 1), "2024-05-01", a))
        .collect();

    let by_region: f64 = regional_revenue(&customers, &orders)
        .iter()
        .map(|r| r.total_revenue)
        .sum();
    let total: f64 = amounts.iter().sum();
    assert!(
        (by_region - total).abs() < 1e-9,
        "regions sum to {by_region}, orders sum to {total}"
    );
}

#[test]
fn regional_revenue_sorts_descending() {
    let customers = vec![
        customer("1", "A", "North"),
        customer("2", "B", "South"),
        customer("3", "C", "East"),
    ];
    let orders = vec![
        order("O1", "1", "2024-05-01", 10.0),
        order("O2", "2", "2024-05-01", 300.0),
        order("O3", "3", "2024-05-01", 20.0),
        order("O4", "1", "2024-05-02", 5.0),
    ];
    let regions: Vec<_> = regional_revenue(&customers, &orders)
        .into_iter()
        .map(|r| r.region)
        .collect();
    assert_eq!(regions, ["South", "East", "North"]);
}

#[test]
fn top_spenders_are_bounded_and_sorted() {
    let customers: Vec<_> = (0..15)
        .map(|i| customer(&format!("m{i:02}"), &format!("C{i}"), "North"))
        .collect();
    let orders: Vec<_> = (0..15)
        .map(|i| {
            order(
                &format!("O{i}"),
                &format!("m{i:02}"),
                "2024-06-25T08:00:00Z",
                (i * 7 % 15) as f64 * 10.0,
            )
        })
        .collect();

    let top = top_spenders(&customers, &orders, &params());
    assert_eq!(top.len(), 10);
    assert!(
        top.windows(2).all(|w| w[0].total_spent >= w[1].total_spent),
        "not sorted descending: {top:?}"
    );
    assert_eq!(top[0].total_spent, 140.0);
}

#[test]
fn top_spenders_honour_the_window_and_top_n() {
    let customers = vec![customer("1", "A", "North"), customer("2", "B", "South")];
    let orders = vec![
        order("OLD", "1", "2024-05-30T23:59:59Z", 1000.0),
        order("EDGE", "1", "2024-05-31T00:00:00Z", 5.0),
        order("NEW", "2", "2024-06-29T12:00:00Z", 40.0),
    ];

    let top = top_spenders(&customers, &orders, &params());
    let spent: Vec<_> = top.iter().map(|t| (t.mobile_number.as_str(), t.total_spent)).collect();
    assert_eq!(spent, [("2", 40.0), ("1", 5.0)], "cutoff is inclusive, older orders excluded");

    let narrow = KpiParams {
        top_n: 1,
        ..params()
    };
    assert_eq!(top_spenders(&customers, &orders, &narrow).len(), 1);

    let wide = KpiParams {
        window_days: 60,
        ..params()
    };
    assert_eq!(top_spenders(&customers, &orders, &wide)[0].total_spent, 1005.0);
}

#[test]
fn months_bucket_in_utc() {
    let orders = vec![
        // 23:30 on 31 Jan at -02:00 is 01:30 on 1 Feb UTC.
        order("O1", "1", "2024-01-31T23:30:00-02:00", 1.0),
        order("O2", "1", "2024-01-15T00:00:00Z", 1.0),
        order("O3", "2", "2023-12-31T23:59:59Z", 1.0),
        order("O4", "2", "2024-02-10T00:00:00Z", 1.0),
    ];
    assert_eq!(
        monthly_trend(&orders),
        vec![
            MonthlyOrders {
                month: "2023-12".into(),
                total_orders: 1
            },
            MonthlyOrders {
                month: "2024-01".into(),
                total_orders: 1
            },
            MonthlyOrders {
                month: "2024-02".into(),
                total_orders: 2
            },
        ]
    );
}

#[test]
fn compute_all_follows_export_order() {
    let kinds: Vec<Kpi> = compute_all(&[], &[], &params())
        .iter()
        .map(KpiRows::kpi)
        .collect();
    assert_eq!(kinds, Kpi::ALL);
}
