//! CSV and JSON encoders.
//!
//! CSV follows the common spreadsheet dialect: comma separators, `\n`
//! between rows, quotes doubled inside a field, and a field wrapped in quotes
//! whenever it contains a comma, quote or line break.

use serde_json::Value;

use crate::{Record, Result};

// ─── Field text ───────────────────────────────────────────────────────────────

/// The text a single value contributes to a CSV cell, before quoting.
pub(crate) fn field_text(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    // Nested structures are embedded as compact JSON.
    Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}

/// Double embedded quotes and wrap the field if it needs quoting.
fn escape_field(text: &str) -> String {
  let escaped = text.replace('"', "\"\"");
  if text.contains([',', '"', '\n', '\r']) {
    format!("\"{escaped}\"")
  } else {
    escaped
  }
}

// ─── Encoders ─────────────────────────────────────────────────────────────────

/// Encode `records` as CSV.
///
/// The header row is the key list of the first record, in insertion order.
/// Later records are read by those keys; a missing key yields an empty cell
/// and keys absent from the first record are ignored. No records, no output.
pub fn to_csv(records: &[Record]) -> String {
  let Some(first) = records.first() else {
    return String::new();
  };
  let headers: Vec<&String> = first.keys().collect();

  let mut lines = Vec::with_capacity(records.len() + 1);
  lines.push(
    headers
      .iter()
      .map(|h| escape_field(h))
      .collect::<Vec<_>>()
      .join(","),
  );

  for record in records {
    let row = headers
      .iter()
      .map(|h| {
        record
          .get(h.as_str())
          .map(|v| escape_field(&field_text(v)))
          .unwrap_or_default()
      })
      .collect::<Vec<_>>()
      .join(",");
    lines.push(row);
  }

  lines.join("\n")
}

/// Encode `records` as a pretty-printed JSON array.
pub fn to_json(records: &[Record]) -> Result<Vec<u8>> {
  Ok(serde_json::to_vec_pretty(records)?)
}
