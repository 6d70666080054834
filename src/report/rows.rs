//! Raw upstream result rows and the parsing rules applied to them.
//!
//! The upstream API returns every value as a string regardless of logical
//! type. Positions in a row align with the query's dimension and metric
//! lists; only the aggregation layer interprets positions.

/// One upstream result row: positional dimension values and positional
/// metric values, both opaque strings.
#[derive(Debug, Clone, Default)]
pub struct ReportRow {
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

impl ReportRow {
    /// Dimension value at `idx`, or `default` when absent or blank.
    pub fn dimension_or<'a>(&'a self, idx: usize, default: &'a str) -> &'a str {
        match self.dimensions.get(idx) {
            Some(v) if !v.is_empty() => v,
            _ => default,
        }
    }

    /// Integer metric at `idx`. Absent or malformed values become 0.
    pub fn int_metric(&self, idx: usize) -> i64 {
        self.metrics
            .get(idx)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Floating-point metric at `idx`. Absent or malformed values become 0.
    /// NaN and infinities from the wire are also treated as malformed.
    pub fn float_metric(&self, idx: usize) -> f64 {
        self.metrics
            .get(idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}
