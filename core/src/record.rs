//! Record normalizer. Raw customer CSV rows and order XML elements in,
//! canonical typed records out.
//!
//! RULES:
//!   - A conversion failure on one order skips that order. It never aborts the parse.
//!   - An order that converts cleanly but lacks order_id, mobile_number or a
//!     parseable order_date_time is dropped by the validity filter.
//!   - A source file that cannot be opened or is structurally broken is fatal.

use crate::{
    error::{EtlError, EtlResult},
    types::{MobileNumber, Timestamp},
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use quick_xml::{events::Event, Reader};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub mobile_number: MobileNumber,
    pub customer_name: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub mobile_number: MobileNumber,
    pub order_date_time: Timestamp,
    pub sku_id: Option<String>,
    pub sku_count: i64,
    pub total_amount: f64,
}

/// Text of one `<order>` element's child fields, exactly as found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOrder {
    pub order_id: Option<String>,
    pub mobile_number: Option<String>,
    pub order_date_time: Option<String>,
    pub sku_id: Option<String>,
    pub sku_count: Option<String>,
    pub total_amount: Option<String>,
}

/// Why a single order could not be converted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("field '{field}' is not an integer: '{value}'")]
    InvalidInteger { field: &'static str, value: String },

    #[error("field '{field}' is not a finite number: '{value}'")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("field '{field}' could not be read: {reason}")]
    Unreadable { field: String, reason: String },
}

/// Result of reading the order source.
#[derive(Debug, Clone, Default)]
pub struct OrderParse {
    pub orders: Vec<OrderRecord>,
    /// Orders skipped on a conversion failure.
    pub skipped: usize,
    /// Orders removed by the validity filter.
    pub dropped: usize,
}

// ── Customers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CustomerRow {
    mobile_number: Option<String>,
    customer_name: Option<String>,
    region: Option<String>,
}

/// Read customers from CSV. Header names are trimmed and lowercased before
/// columns are matched, and extra columns are ignored.
pub fn read_customers<R: Read>(reader: R, source_name: &str) -> EtlResult<Vec<CustomerRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: csv::StringRecord = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    if !headers.iter().any(|h| h == "mobile_number") {
        return Err(EtlError::MissingColumn {
            column: "mobile_number",
            source_name: source_name.to_string(),
        });
    }
    csv_reader.set_headers(headers);

    let mut customers = Vec::new();
    let mut unkeyed = 0usize;
    for result in csv_reader.deserialize::<CustomerRow>() {
        let row = result?;
        match clean(row.mobile_number) {
            Some(mobile_number) => customers.push(CustomerRecord {
                mobile_number,
                customer_name: clean(row.customer_name),
                region: clean(row.region),
            }),
            None => unkeyed += 1,
        }
    }

    if unkeyed > 0 {
        log::warn!("Dropped {unkeyed} customer rows without a mobile_number from {source_name}");
    }
    log::info!("Read {} customers from {source_name}", customers.len());
    Ok(customers)
}

pub fn read_customers_file(path: &str) -> EtlResult<Vec<CustomerRecord>> {
    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    read_customers(file, path)
}

// ── Orders ───────────────────────────────────────────────────────────────────

/// Read orders from XML. Every direct child `<order>` of the root element is
/// one record; its child elements are looked up by name, first occurrence
/// wins and unknown children are ignored.
pub fn read_orders<R: BufRead>(input: R, source_name: &str) -> EtlResult<OrderParse> {
    let mut parse = OrderParse::default();
    for raw in scan_orders(input, source_name)? {
        let outcome = match raw {
            Ok(raw) => normalize_order(raw),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(Some(order)) => parse.orders.push(order),
            Ok(None) => parse.dropped += 1,
            Err(e) => {
                log::warn!("Skipping malformed order in {source_name}: {e}");
                parse.skipped += 1;
            }
        }
    }

    if parse.dropped > 0 {
        log::info!(
            "Dropped {} orders missing order_id, mobile_number or a valid order_date_time",
            parse.dropped
        );
    }
    log::info!("Parsed {} valid orders from {source_name}", parse.orders.len());
    Ok(parse)
}

pub fn read_orders_file(path: &str) -> EtlResult<OrderParse> {
    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    read_orders(BufReader::new(file), path)
}

/// Convert one raw order.
///
/// `Err` is a conversion failure (the caller skips the record with a warning).
/// `Ok(None)` means the record converted but failed the validity filter.
/// An unparseable date is not an error: it becomes null and the validity
/// filter removes the record.
pub fn normalize_order(raw: RawOrder) -> Result<Option<OrderRecord>, FieldError> {
    let sku_count = match clean(raw.sku_count) {
        None => 0,
        Some(v) => v.parse::<i64>().map_err(|_| FieldError::InvalidInteger {
            field: "sku_count",
            value: v.clone(),
        })?,
    };
    let total_amount = match clean(raw.total_amount) {
        None => 0.0,
        Some(v) => match v.parse::<f64>() {
            Ok(n) if n.is_finite() => n,
            _ => {
                return Err(FieldError::InvalidDecimal {
                    field: "total_amount",
                    value: v,
                })
            }
        },
    };
    let order_date_time = raw.order_date_time.as_deref().and_then(parse_timestamp);

    let (Some(order_id), Some(mobile_number), Some(order_date_time)) = (
        clean(raw.order_id),
        clean(raw.mobile_number),
        order_date_time,
    ) else {
        return Ok(None);
    };

    Ok(Some(OrderRecord {
        order_id,
        mobile_number,
        order_date_time,
        sku_id: clean(raw.sku_id),
        sku_count,
        total_amount,
    }))
}

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an order timestamp into a UTC instant. Values without an offset
/// are taken to be UTC already. Only four-digit UTC years (0000 to 9999)
/// are accepted; anything else is treated as unparseable.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    parse_any_timestamp(text).filter(|ts| (0..=9999).contains(&ts.year()))
}

fn parse_any_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Trimmed text, or None when blank.
fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Walk the document and collect the fields of each `<order>`.
/// Broken markup is fatal, and so is a document without exactly one closed
/// root element. A field whose text cannot be unescaped only spoils its own
/// order.
fn scan_orders<R: BufRead>(
    input: R,
    source_name: &str,
) -> EtlResult<Vec<Result<RawOrder, FieldError>>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut current: Option<OrderScan> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) | Event::Empty(_) if depth == 0 && saw_root => {
                return Err(EtlError::malformed(source_name, "more than one root element"));
            }
            Event::Empty(_) if depth == 0 => saw_root = true,
            Event::Text(t) if depth == 0 && t.iter().any(|b| !b.is_ascii_whitespace()) => {
                return Err(EtlError::malformed(source_name, "text outside the root element"));
            }
            Event::Start(e) => {
                saw_root = true;
                depth += 1;
                if depth == 2 && e.name().as_ref() == b"order" {
                    current = Some(OrderScan::default());
                } else if depth == 3 {
                    if let Some(scan) = current.as_mut() {
                        scan.open(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    }
                }
            }
            Event::Empty(e) => {
                if depth == 1 && e.name().as_ref() == b"order" {
                    out.push(Ok(RawOrder::default()));
                } else if depth == 2 {
                    if let Some(scan) = current.as_mut() {
                        scan.open(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                        scan.close();
                    }
                }
            }
            Event::Text(t) if depth == 3 => {
                if let Some(scan) = current.as_mut() {
                    match t.unescape() {
                        Ok(text) => scan.push_text(&text),
                        Err(e) => scan.fail(e.to_string()),
                    }
                }
            }
            Event::CData(c) if depth == 3 => {
                if let Some(scan) = current.as_mut() {
                    scan.push_text(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if depth == 3 {
                    if let Some(scan) = current.as_mut() {
                        scan.close();
                    }
                } else if depth == 2 {
                    if let Some(scan) = current.take() {
                        out.push(scan.finish());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof if !saw_root => {
                return Err(EtlError::malformed(source_name, "no root element"));
            }
            Event::Eof if depth > 0 => {
                return Err(EtlError::malformed(
                    source_name,
                    format!("document ends inside {depth} unclosed element(s)"),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[derive(Default)]
struct OrderScan {
    raw: RawOrder,
    field: Option<(String, String)>,
    error: Option<FieldError>,
}

impl OrderScan {
    fn open(&mut self, name: String) {
        self.field = Some((name, String::new()));
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, value)) = self.field.as_mut() {
            value.push_str(text);
        }
    }

    fn fail(&mut self, reason: String) {
        if self.error.is_none() {
            let field = self
                .field
                .as_ref()
                .map(|(name, _)| name.clone())
                .unwrap_or_default();
            self.error = Some(FieldError::Unreadable { field, reason });
        }
    }

    fn close(&mut self) {
        let Some((name, value)) = self.field.take() else {
            return;
        };
        let slot = match name.as_str() {
            "order_id" => &mut self.raw.order_id,
            "mobile_number" => &mut self.raw.mobile_number,
            "order_date_time" => &mut self.raw.order_date_time,
            "sku_id" => &mut self.raw.sku_id,
            "sku_count" => &mut self.raw.sku_count,
            "total_amount" => &mut self.raw.total_amount,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn finish(self) -> Result<RawOrder, FieldError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.raw),
        }
    }
}
