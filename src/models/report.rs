//! Structured check report.
//!
//! Only the parts of the report the service acts on are interpreted: the
//! vulnerability count (drives the dual-bucket write) and the start/end
//! timestamps (rewritten as display strings for the query layer). Everything
//! else, the vulnerability list included, is carried through as sent.

use chrono::{DateTime, FixedOffset, Utc};
use serde::de::Error as _;
use serde_json::{Map, Value};

/// Rendering of an unset timestamp.
const ZERO_TIME: &str = "0001-01-01 00:00:00 +0000 UTC";

#[derive(Debug, Clone)]
pub struct Report {
    pub start_time: Option<DateTime<FixedOffset>>,
    pub end_time: Option<DateTime<FixedOffset>>,

    /// Remaining report fields as sent, `vulnerabilities` included.
    pub fields: Map<String, Value>,

    vulnerability_count: usize,
}

impl Report {
    /// Parse a report object. `start_time` and `end_time` must be RFC 3339
    /// strings when set, `vulnerabilities` a list of objects when set.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let mut fields: Map<String, Value> = serde_json::from_str(raw)?;
        let start_time = take_timestamp(&mut fields, "start_time")?;
        let end_time = take_timestamp(&mut fields, "end_time")?;
        let vulnerability_count = count_vulnerabilities(fields.get("vulnerabilities"))?;

        Ok(Self {
            start_time,
            end_time,
            fields,
            vulnerability_count,
        })
    }

    pub fn vulnerability_count(&self) -> usize {
        self.vulnerability_count
    }

    /// Serialize the report with `start_time` and `end_time` rendered as
    /// strings, so that the columnar consumers see string-typed columns.
    pub fn to_normalized_json(&self) -> Result<String, serde_json::Error> {
        let mut out = self.fields.clone();
        out.insert(
            "start_time".into(),
            Value::String(display_timestamp(self.start_time)),
        );
        out.insert(
            "end_time".into(),
            Value::String(display_timestamp(self.end_time)),
        );
        serde_json::to_string(&Value::Object(out))
    }
}

fn take_timestamp(
    fields: &mut Map<String, Value>,
    name: &str,
) -> Result<Option<DateTime<FixedOffset>>, serde_json::Error> {
    match fields.remove(name) {
        Some(value) => serde_json::from_value(value),
        None => Ok(None),
    }
}

/// Absent and `null` both count as no findings.
fn count_vulnerabilities(value: Option<&Value>) -> Result<usize, serde_json::Error> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Array(items)) if items.iter().all(Value::is_object) => Ok(items.len()),
        Some(Value::Array(_)) => Err(serde_json::Error::custom(
            "vulnerabilities must be a list of objects",
        )),
        Some(other) => Err(serde_json::Error::custom(format!(
            "vulnerabilities must be a list, got {}",
            other
        ))),
    }
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS[.fraction] +0000 UTC`.
///
/// The fraction carries no trailing zeros and is omitted when zero.
pub fn display_timestamp(ts: Option<DateTime<FixedOffset>>) -> String {
    let Some(ts) = ts else {
        return ZERO_TIME.to_string();
    };
    let ts = ts.with_timezone(&Utc);

    let mut out = ts.format("%Y-%m-%d %H:%M:%S").to_string();
    let nanos = ts.timestamp_subsec_nanos();
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out.push_str(" +0000 UTC");
    out
}
