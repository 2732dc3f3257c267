//! Record normalizer tests.
//!
//! Covers: header normalization, fatal source errors, per-record skips,
//! the validity filter, and field defaults.

use order_kpi_core::{
    error::EtlError,
    record::{normalize_order, read_customers, read_orders, read_orders_file, FieldError, RawOrder},
};

fn order_xml(body: &str) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<orders>\n{body}\n</orders>")
}

fn order(id: &str, mobile: &str, when: &str, count: &str, amount: &str) -> String {
    format!(
        "<order>
           <order_id>{id}</order_id>
           <mobile_number>{mobile}</mobile_number>
           <order_date_time>{when}</order_date_time>
           <sku_id>SKU1</sku_id>
           <sku_count>{count}</sku_count>
           <total_amount>{amount}</total_amount>
         </order>"
    )
}

#[test]
fn customer_headers_are_trimmed_and_lowercased() {
    let csv = " Mobile_Number , Customer_Name ,REGION,extra\n\
               9990001111, Alice ,North,x\n\
               9990002222,Bob,,y\n";
    let customers = read_customers(csv.as_bytes(), "customers.csv").unwrap();

    assert_eq!(customers.len(), 2);
    assert_eq!(customers[0].mobile_number, "9990001111");
    assert_eq!(customers[0].customer_name.as_deref(), Some("Alice"));
    assert_eq!(customers[0].region.as_deref(), Some("North"));
    assert_eq!(customers[1].region, None, "blank region stays missing until dedup");
}

#[test]
fn customer_file_without_mobile_column_is_fatal() {
    let csv = "phone,customer_name,region\n9990001111,Alice,North\n";
    let err = read_customers(csv.as_bytes(), "customers.csv").unwrap_err();
    assert!(
        matches!(err, EtlError::MissingColumn { column: "mobile_number", .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn customers_without_a_mobile_number_are_dropped() {
    let csv = "mobile_number,customer_name,region\n,Ghost,East\n9990001111,Alice,North\n";
    let customers = read_customers(csv.as_bytes(), "customers.csv").unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].customer_name.as_deref(), Some("Alice"));
}

#[test]
fn ragged_customer_csv_is_fatal() {
    let csv = "mobile_number,customer_name,region\n9990001111,Alice,North,extra,fields\n";
    let err = read_customers(csv.as_bytes(), "customers.csv").unwrap_err();
    assert!(matches!(err, EtlError::Csv(_)), "unexpected error: {err}");
}

#[test]
fn non_numeric_sku_count_skips_the_whole_order() {
    let xml = order_xml(&[
        order("O1", "9990001111", "2024-06-20T10:00:00", "1", "100.0"),
        order("O2", "9990001111", "2024-06-21T10:00:00", "abc", "50.0"),
    ]
    .join("\n"));
    let parse = read_orders(xml.as_bytes(), "orders.xml").unwrap();

    assert_eq!(parse.orders.len(), 1);
    assert_eq!(parse.orders[0].order_id, "O1");
    assert_eq!(parse.skipped, 1);
    assert_eq!(parse.dropped, 0);
}

#[test]
fn non_numeric_amount_skips_the_order() {
    let xml = order_xml(&order("O1", "9990001111", "2024-06-20", "1", "12,50"));
    let parse = read_orders(xml.as_bytes(), "orders.xml").unwrap();
    assert!(parse.orders.is_empty());
    assert_eq!(parse.skipped, 1);
}

#[test]
fn orders_missing_keys_or_dates_are_dropped() {
    let xml = order_xml(&[
        order("", "9990001111", "2024-06-20T10:00:00", "1", "10"),
        order("O2", "   ", "2024-06-20T10:00:00", "1", "10"),
        order("O3", "9990001111", "not a date", "1", "10"),
        order("O4", "9990001111", "2024-06-20T10:00:00", "1", "10"),
    ]
    .join("\n"));
    let parse = read_orders(xml.as_bytes(), "orders.xml").unwrap();

    let ids: Vec<_> = parse.orders.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(ids, ["O4"]);
    assert_eq!(parse.dropped, 3);
    assert_eq!(parse.skipped, 0);
}

#[test]
fn missing_numbers_default_to_zero() {
    let xml = order_xml(
        "<order>
           <order_id>O1</order_id>
           <mobile_number>9990001111</mobile_number>
           <order_date_time>2024-06-20T10:00:00Z</order_date_time>
           <sku_count/>
         </order>",
    );
    let parse = read_orders(xml.as_bytes(), "orders.xml").unwrap();

    assert_eq!(parse.orders.len(), 1);
    let o = &parse.orders[0];
    assert_eq!(o.sku_count, 0);
    assert_eq!(o.total_amount, 0.0);
    assert_eq!(o.sku_id, None);
}

#[test]
fn first_occurrence_of_a_field_wins_and_unknown_fields_are_ignored() {
    let xml = order_xml(
        "<order>
           <order_id>O1</order_id>
           <order_id>O1-dup</order_id>
           <channel>web</channel>
           <mobile_number> 9990001111 </mobile_number>
           <order_date_time>2024-06-20 10:00:00</order_date_time>
           <total_amount>42.5</total_amount>
         </order>",
    );
    let parse = read_orders(xml.as_bytes(), "orders.xml").unwrap();

    assert_eq!(parse.orders.len(), 1);
    assert_eq!(parse.orders[0].order_id, "O1");
    assert_eq!(parse.orders[0].mobile_number, "9990001111");
    assert_eq!(parse.orders[0].total_amount, 42.5);
}

#[test]
fn unreadable_field_text_spoils_only_its_order() {
    let xml = order_xml(&[
        order("O&bogus;1", "9990001111", "2024-06-20", "1", "10"),
        order("O2", "9990001111", "2024-06-20", "1", "10"),
    ]
    .join("\n"));
    let parse = read_orders(xml.as_bytes(), "orders.xml").unwrap();

    assert_eq!(parse.orders.len(), 1);
    assert_eq!(parse.orders[0].order_id, "O2");
    assert_eq!(parse.skipped, 1);
}

#[test]
fn mismatched_markup_is_fatal() {
    let xml = "<orders><order><order_id>O1</order_id></orders>";
    let err = read_orders(xml.as_bytes(), "orders.xml").unwrap_err();
    assert!(matches!(err, EtlError::Xml(_)), "unexpected error: {err}");
}

#[test]
fn order_source_without_a_document_is_fatal() {
    for (label, xml) in [
        ("empty", ""),
        ("whitespace", "  \n\t\n"),
        ("plain text", "this is not xml at all"),
    ] {
        let err = read_orders(xml.as_bytes(), "orders.xml").unwrap_err();
        assert!(
            matches!(err, EtlError::MalformedSource { .. }),
            "{label}: unexpected error: {err}"
        );
    }
}

#[test]
fn truncated_order_document_is_fatal() {
    let xml = format!(
        "<orders>{}<order><order_id>O2",
        order("O1", "9990001111", "2024-06-01T10:00:00", "1", "10.0")
    );
    let err = read_orders(xml.as_bytes(), "orders.xml").unwrap_err();
    assert!(
        matches!(err, EtlError::MalformedSource { .. } | EtlError::Xml(_)),
        "unexpected error: {err}"
    );
}

#[test]
fn second_root_element_is_fatal() {
    let xml = "<orders></orders><orders></orders>";
    let err = read_orders(xml.as_bytes(), "orders.xml").unwrap_err();
    assert!(matches!(err, EtlError::MalformedSource { .. }), "unexpected error: {err}");
}

#[test]
fn empty_root_is_a_valid_empty_source() {
    for xml in ["<orders/>", "<?xml version=\"1.0\"?>\n<orders>\n</orders>\n"] {
        let parse = read_orders(xml.as_bytes(), "orders.xml").unwrap();
        assert!(parse.orders.is_empty(), "{xml}");
        assert_eq!((parse.skipped, parse.dropped), (0, 0), "{xml}");
    }
}

#[test]
fn missing_order_file_is_fatal_and_names_the_path() {
    let err = read_orders_file("/nonexistent/orders.xml").unwrap_err();
    match err {
        EtlError::Io { path, .. } => assert_eq!(path, "/nonexistent/orders.xml"),
        other => panic!("expected Io error, got {other}"),
    }
}

#[test]
fn conversion_failure_is_reported_before_the_validity_filter() {
    // No order_id and a bad count: the count failure wins, so the record is
    // counted as skipped rather than silently dropped.
    let raw = RawOrder {
        mobile_number: Some("9990001111".into()),
        order_date_time: Some("2024-06-20".into()),
        sku_count: Some("abc".into()),
        ..RawOrder::default()
    };
    assert_eq!(
        normalize_order(raw),
        Err(FieldError::InvalidInteger {
            field: "sku_count",
            value: "abc".into()
        })
    );
}

#[test]
fn non_finite_amounts_are_rejected() {
    let raw = RawOrder {
        order_id: Some("O1".into()),
        mobile_number: Some("9990001111".into()),
        order_date_time: Some("2024-06-20".into()),
        total_amount: Some("NaN".into()),
        ..RawOrder::default()
    };
    assert!(matches!(normalize_order(raw), Err(FieldError::InvalidDecimal { .. })));
}
