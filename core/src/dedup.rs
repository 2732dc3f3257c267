//! Customer deduplication.
//!
//! The first row seen for a mobile_number wins; later rows with the same key
//! are discarded. Missing regions become DEFAULT_REGION.

use crate::{record::CustomerRecord, types::DEFAULT_REGION};
use std::collections::HashSet;

pub fn dedup_customers(customers: Vec<CustomerRecord>) -> Vec<CustomerRecord> {
    let before = customers.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<CustomerRecord> = customers
        .into_iter()
        .filter(|c| seen.insert(c.mobile_number.clone()))
        .map(|mut c| {
            if c.region.is_none() {
                c.region = Some(DEFAULT_REGION.to_string());
            }
            c
        })
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        log::info!("Removed {removed} duplicate customer rows by mobile_number");
    }
    kept
}
