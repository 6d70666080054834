//! Upstream reporting API boundary.
//!
//! Request descriptors, the raw row shape, the HTTP client, and the
//! property-details cache. Everything above this module works with typed
//! aggregates; everything below it speaks the upstream wire format.

pub mod client;
pub mod properties;
pub mod query;
pub mod rows;

pub use client::{HttpReportingClient, ReportError, ReportResult, ReportingClient};
pub use properties::{PropertyCache, PropertyDetails};
pub use query::{DateRange, OrderBy, PropertyId, ReportQuery, SortOrder};
pub use rows::ReportRow;
