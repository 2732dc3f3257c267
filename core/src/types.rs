//! Shared primitive types used across the pipeline.

use chrono::{DateTime, Utc};

/// Customer identity key. Orders reference customers by this value.
pub type MobileNumber = String;

/// Every instant in the pipeline is UTC.
pub type Timestamp = DateTime<Utc>;

/// Region assigned to customers without one, and to orders with no customer.
pub const DEFAULT_REGION: &str = "Unknown";
